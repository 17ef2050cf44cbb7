//! Remote keyed record store and its catalog adapter.

use std::{cmp::Ordering, sync::Arc, time::Duration};

use log::{debug, warn};
use serde_json::Value;

use super::{MediaItem, MediaKind};
use crate::{config::RemoteConfig, error::CatalogError};

const UNTITLED: &str = "Untitled";

/// Keyed read access to named record collections.
pub trait RemoteRecordStore: Send + Sync {
    /// Returns the raw collection payload, or `None` when the collection is absent.
    fn read_collection(&self, name: &str) -> Result<Option<Value>, String>;
}

/// Record store served over HTTP as `{base_url}/{collection}.json`.
pub struct HttpRecordStore {
    http_client: ureq::Agent,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpRecordStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.read_timeout_secs))
            .build();
        Self {
            http_client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            auth_token: Some(config.auth_token.trim().to_string())
                .filter(|token| !token.is_empty()),
        }
    }

    fn collection_url(&self, name: &str) -> String {
        let mut url = format!("{}/{}.json", self.base_url, urlencoding::encode(name));
        if let Some(token) = &self.auth_token {
            url.push_str("?auth=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }
}

impl RemoteRecordStore for HttpRecordStore {
    fn read_collection(&self, name: &str) -> Result<Option<Value>, String> {
        if self.base_url.is_empty() {
            debug!("No remote base URL configured, skipping collection {}", name);
            return Ok(None);
        }

        let response = self
            .http_client
            .get(&self.collection_url(name))
            .call()
            .map_err(|err| format!("Remote request failed ({name}): {err}"))?;
        let payload: Value = response
            .into_json()
            .map_err(|err| format!("Remote response parse failed ({name}): {err}"))?;
        Ok(match payload {
            Value::Null => None,
            other => Some(other),
        })
    }
}

/// Maps remote collection records to catalog items.
pub struct RemoteCatalogAdapter {
    store: Arc<dyn RemoteRecordStore>,
    audio_collection: String,
    video_collection: String,
}

impl RemoteCatalogAdapter {
    pub fn new(
        store: Arc<dyn RemoteRecordStore>,
        audio_collection: impl Into<String>,
        video_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            audio_collection: audio_collection.into(),
            video_collection: video_collection.into(),
        }
    }

    pub fn list(&self, kind: MediaKind) -> Result<Vec<MediaItem>, CatalogError> {
        let collection = match kind {
            MediaKind::Audio => &self.audio_collection,
            MediaKind::Video => &self.video_collection,
        };
        let payload = self
            .store
            .read_collection(collection)
            .map_err(CatalogError::SourceUnavailable)?;
        match payload {
            Some(payload) => parse_records(&payload),
            None => Ok(Vec::new()),
        }
    }
}

/// Parses a collection payload in ascending key order.
///
/// Objects are keyed by record id. Arrays use the slot index as the id, the
/// shape a keyed store returns for integer-like keys.
pub fn parse_records(payload: &Value) -> Result<Vec<MediaItem>, CatalogError> {
    let entries: Vec<(String, &Value)> = match payload {
        Value::Object(records) => {
            let mut entries: Vec<(String, &Value)> = records
                .iter()
                .map(|(key, record)| (key.clone(), record))
                .collect();
            entries.sort_by(|left, right| compare_record_keys(&left.0, &right.0));
            entries
        }
        Value::Array(records) => records
            .iter()
            .enumerate()
            .map(|(index, record)| (index.to_string(), record))
            .collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(CatalogError::SourceUnavailable(format!(
                "unexpected collection payload: {}",
                json_type_name(other)
            )));
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|(key, record)| parse_record(key, record))
        .collect())
}

/// Integer-like keys first in numeric order, then the rest in string order.
fn compare_record_keys(left: &str, right: &str) -> Ordering {
    match (integer_key(left), integer_key(right)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

fn integer_key(key: &str) -> Option<u64> {
    if !key.bytes().all(|byte| byte.is_ascii_digit()) || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<u64>().ok()
}

fn parse_record(id: String, record: &Value) -> Option<MediaItem> {
    let fields = match record {
        Value::Object(fields) => fields,
        Value::Null => return None,
        other => {
            warn!(
                "Skipping remote record with {} payload. id={}",
                json_type_name(other),
                id
            );
            return None;
        }
    };

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();
    let uri = fields
        .get("uri")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let duration_secs = fields
        .get("duration")
        .and_then(Value::as_f64)
        .filter(|secs| secs.is_finite() && *secs > 0.0);

    Some(MediaItem {
        id,
        title,
        uri,
        duration_secs,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
