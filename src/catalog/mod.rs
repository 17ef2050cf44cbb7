//! Media catalogs: item model, source merging and load generations.
//!
//! A catalog is rebuilt wholesale on every load from the remote and local
//! adapter outputs. Remote items always precede local ones.

pub mod local_source;
pub mod remote_source;

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::CatalogError;

pub use local_source::{FolderMediaStore, LocalCatalogAdapter};
pub use remote_source::{HttpRecordStore, RemoteCatalogAdapter, RemoteRecordStore};

/// Prefix applied to every id produced by the local adapter.
pub const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// One playable entry. Immutable once produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub uri: String,
    pub duration_secs: Option<f64>,
}

/// Ordered, id-unique sequence of items for one media kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    kind: MediaKind,
    items: Vec<MediaItem>,
}

impl Catalog {
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }
}

fn dedup_first_occurrence(items: Vec<MediaItem>, source: &str) -> Vec<MediaItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| {
            let first = seen.insert(item.id.clone());
            if !first {
                debug!("Dropping duplicate {} item id={}", source, item.id);
            }
            first
        })
        .collect()
}

/// Concatenates remote then local items, each in its adapter's order.
///
/// Duplicates inside one adapter's output keep their first occurrence. Namespaces
/// are disjoint by construction; a local id that still collides with a remote one
/// is dropped so the catalog id invariant holds.
pub fn merge(kind: MediaKind, remote_items: Vec<MediaItem>, local_items: Vec<MediaItem>) -> Catalog {
    let remote_items = dedup_first_occurrence(remote_items, "remote");
    let local_items = dedup_first_occurrence(local_items, "local");

    let remote_ids: HashSet<String> = remote_items.iter().map(|item| item.id.clone()).collect();
    let mut items = remote_items;
    items.reserve(local_items.len());
    for item in local_items {
        if remote_ids.contains(&item.id) {
            warn!("Local item id collides with remote id, dropping. id={}", item.id);
            continue;
        }
        items.push(item);
    }

    Catalog { kind, items }
}

/// Result of loading both sources for one kind.
#[derive(Debug, Clone)]
pub struct CatalogLoad {
    pub catalog: Catalog,
    pub failures: Vec<CatalogError>,
}

/// Reads both adapters and merges them. A failing source contributes nothing
/// and is reported in `failures`; it never blocks the other source.
pub fn load_catalog(
    kind: MediaKind,
    remote: &RemoteCatalogAdapter,
    local: &LocalCatalogAdapter,
) -> CatalogLoad {
    let mut failures = Vec::new();

    let remote_items = match remote.list(kind) {
        Ok(items) => items,
        Err(err) => {
            warn!("Remote {} catalog unavailable: {}", kind.label(), err);
            failures.push(err);
            Vec::new()
        }
    };
    let local_items = match local.list(kind) {
        Ok(items) => items,
        Err(err) => {
            warn!("Local {} catalog unavailable: {}", kind.label(), err);
            failures.push(err);
            Vec::new()
        }
    };

    debug!(
        "Loaded {} catalog: remote={} local={}",
        kind.label(),
        remote_items.len(),
        local_items.len()
    );
    CatalogLoad {
        catalog: merge(kind, remote_items, local_items),
        failures,
    }
}

/// Per-kind generation counter used to drop catalog loads that finish after a
/// newer load started or after the requesting view went away.
#[derive(Debug, Default)]
pub struct LoadTracker {
    current: HashMap<MediaKind, u64>,
    next_generation: u64,
}

impl LoadTracker {
    pub fn begin(&mut self, kind: MediaKind) -> u64 {
        self.next_generation += 1;
        self.current.insert(kind, self.next_generation);
        self.next_generation
    }

    pub fn invalidate(&mut self, kind: MediaKind) {
        self.current.remove(&kind);
    }

    pub fn is_current(&self, kind: MediaKind, generation: u64) -> bool {
        self.current.get(&kind) == Some(&generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            uri: format!("https://cdn.example.com/{id}.mp3"),
            duration_secs: None,
        }
    }

    fn ids(catalog: &Catalog) -> Vec<&str> {
        catalog.ids().collect()
    }

    #[test]
    fn test_merge_places_remote_items_before_local_items() {
        let catalog = merge(
            MediaKind::Audio,
            vec![item("r2"), item("r1")],
            vec![item("local-b"), item("local-a")],
        );
        assert_eq!(ids(&catalog), vec!["r2", "r1", "local-b", "local-a"]);
    }

    #[test]
    fn test_merge_is_idempotent_for_fixed_inputs() {
        let remote = vec![item("r1"), item("r2")];
        let local = vec![item("local-1")];
        let first = merge(MediaKind::Video, remote.clone(), local.clone());
        let second = merge(MediaKind::Video, remote, local);
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_drops_duplicates_within_one_source_keeping_first() {
        let mut duplicate = item("r1");
        duplicate.title = "second copy".to_string();
        let catalog = merge(
            MediaKind::Audio,
            vec![item("r1"), item("r2"), duplicate],
            vec![item("local-1"), item("local-1")],
        );
        assert_eq!(ids(&catalog), vec!["r1", "r2", "local-1"]);
        assert_eq!(catalog.get("r1").map(|i| i.title.as_str()), Some("R1"));
    }

    #[test]
    fn test_merge_keeps_catalog_ids_unique_across_sources() {
        let catalog = merge(
            MediaKind::Audio,
            vec![item("local-x")],
            vec![item("local-x"), item("local-y")],
        );
        assert_eq!(ids(&catalog), vec!["local-x", "local-y"]);
    }

    #[test]
    fn test_merge_of_empty_sources_is_empty() {
        let catalog = merge(MediaKind::Audio, Vec::new(), Vec::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.kind(), MediaKind::Audio);
    }

    #[test]
    fn test_load_tracker_only_accepts_latest_generation() {
        let mut tracker = LoadTracker::default();
        let first = tracker.begin(MediaKind::Audio);
        let second = tracker.begin(MediaKind::Audio);
        let video = tracker.begin(MediaKind::Video);

        assert!(!tracker.is_current(MediaKind::Audio, first));
        assert!(tracker.is_current(MediaKind::Audio, second));
        assert!(tracker.is_current(MediaKind::Video, video));

        tracker.invalidate(MediaKind::Audio);
        assert!(!tracker.is_current(MediaKind::Audio, second));
        assert!(tracker.is_current(MediaKind::Video, video));
    }
}
