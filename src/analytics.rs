//! Fire-and-forget analytics for item selection.

use std::{
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use crate::{catalog::MediaKind, config::AnalyticsConfig};

/// Receives selection events. Implementations must not block the caller and
/// must swallow their own failures.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: &str, attributes: &[(&str, String)]);
}

/// Event name and attributes recorded when an item starts playing.
pub fn selection_event(kind: MediaKind, title: &str, length_secs: f64) -> (&'static str, Vec<(&'static str, String)>) {
    let length = format!("{length_secs}");
    match kind {
        MediaKind::Audio => (
            "playsong_title",
            vec![("songname", title.to_string()), ("songlength", length)],
        ),
        MediaKind::Video => (
            "playvideo_title",
            vec![("videoname", title.to_string()), ("videolength", length)],
        ),
    }
}

/// Writes events to the log only.
pub struct LogAnalyticsSink;

impl AnalyticsSink for LogAnalyticsSink {
    fn record(&self, event: &str, attributes: &[(&str, String)]) {
        let rendered: Vec<String> = attributes
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        info!("analytics event={} {}", event, rendered.join(" "));
    }
}

struct AnalyticsEvent {
    name: String,
    attributes: Map<String, Value>,
}

/// Posts events as JSON from a background thread.
pub struct HttpAnalyticsSink {
    events: Sender<AnalyticsEvent>,
}

impl HttpAnalyticsSink {
    pub fn spawn(config: &AnalyticsConfig) -> Self {
        let (events, event_receiver) = mpsc::channel::<AnalyticsEvent>();
        let endpoint = config.endpoint.trim().to_string();
        let app_key = config.app_key.clone();
        let session_id = uuid::Uuid::new_v4().to_string();

        let spawn_result = thread::Builder::new()
            .name("analytics".to_string())
            .spawn(move || {
                let http_client = ureq::AgentBuilder::new()
                    .timeout_connect(Duration::from_secs(5))
                    .timeout_read(Duration::from_secs(10))
                    .build();
                while let Ok(event) = event_receiver.recv() {
                    let body = json!({
                        "app_key": app_key,
                        "session_id": session_id,
                        "event": event.name,
                        "attributes": Value::Object(event.attributes),
                    });
                    match http_client.post(&endpoint).send_json(body) {
                        Ok(_) => debug!("Analytics event delivered"),
                        Err(err) => debug!("Analytics delivery failed: {}", err),
                    }
                }
            });
        if let Err(err) = spawn_result {
            warn!("Failed to spawn analytics thread: {}", err);
        }
        Self { events }
    }
}

impl AnalyticsSink for HttpAnalyticsSink {
    fn record(&self, event: &str, attributes: &[(&str, String)]) {
        let attributes = attributes
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
            .collect();
        let _ = self.events.send(AnalyticsEvent {
            name: event.to_string(),
            attributes,
        });
    }
}

/// Picks the HTTP sink when analytics are enabled with an endpoint.
pub fn sink_from_config(config: &AnalyticsConfig) -> Box<dyn AnalyticsSink> {
    if config.enabled && !config.endpoint.trim().is_empty() {
        info!("Analytics enabled, posting to {}", config.endpoint.trim());
        Box::new(HttpAnalyticsSink::spawn(config))
    } else {
        Box::new(LogAnalyticsSink)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every recorded event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AnalyticsSink for RecordingSink {
        fn record(&self, event: &str, attributes: &[(&str, String)]) {
            self.events.lock().unwrap().push((
                event.to_string(),
                attributes
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect(),
            ));
        }
    }

    #[test]
    fn test_selection_event_names_follow_media_kind() {
        let (name, attributes) = selection_event(MediaKind::Audio, "Song", 200.0);
        assert_eq!(name, "playsong_title");
        assert_eq!(
            attributes,
            vec![("songname", "Song".to_string()), ("songlength", "200".to_string())]
        );

        let (name, attributes) = selection_event(MediaKind::Video, "Clip", 12.5);
        assert_eq!(name, "playvideo_title");
        assert_eq!(attributes[1], ("videolength", "12.5".to_string()));
    }

    #[test]
    fn test_http_sink_never_blocks_or_fails_without_a_reachable_endpoint() {
        let config = AnalyticsConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9/events".to_string(),
            app_key: "key".to_string(),
        };
        let sink = HttpAnalyticsSink::spawn(&config);
        sink.record("playsong_title", &[("songname", "Song".to_string())]);
    }

    #[test]
    fn test_disabled_config_uses_log_sink() {
        let sink = sink_from_config(&AnalyticsConfig::default());
        sink.record("playvideo_title", &[]);
    }
}
