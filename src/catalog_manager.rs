use std::{sync::Arc, thread};

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::{
    catalog::{load_catalog, LoadTracker, LocalCatalogAdapter, MediaKind, RemoteCatalogAdapter},
    protocol::{self, CatalogMessage, LifecycleMessage},
};

// Loads catalogs off the bus thread and drops completions that are no longer wanted
pub struct CatalogManager {
    remote: Arc<RemoteCatalogAdapter>,
    local: Arc<LocalCatalogAdapter>,
    tracker: LoadTracker,
    bus_consumer: Receiver<protocol::Message>,
    bus_producer: Sender<protocol::Message>,
}

impl CatalogManager {
    pub fn new(
        remote: Arc<RemoteCatalogAdapter>,
        local: Arc<LocalCatalogAdapter>,
        bus_consumer: Receiver<protocol::Message>,
        bus_producer: Sender<protocol::Message>,
    ) -> Self {
        Self {
            remote,
            local,
            tracker: LoadTracker::default(),
            bus_consumer,
            bus_producer,
        }
    }

    fn start_load(&mut self, kind: MediaKind) {
        let generation = self.tracker.begin(kind);
        let remote = self.remote.clone();
        let local = self.local.clone();
        let bus_producer = self.bus_producer.clone();
        debug!("Starting {} catalog load generation={}", kind.label(), generation);

        let spawn_result = thread::Builder::new()
            .name(format!("catalog-load-{}", kind.label()))
            .spawn(move || {
                let load = load_catalog(kind, &remote, &local);
                let _ = bus_producer.send(protocol::Message::Catalog(
                    CatalogMessage::LoadFinished {
                        kind,
                        generation,
                        catalog: Arc::new(load.catalog),
                        failures: load.failures,
                    },
                ));
            });
        if let Err(err) = spawn_result {
            error!("Failed to spawn {} catalog load: {}", kind.label(), err);
            self.tracker.invalidate(kind);
        }
    }

    fn handle_catalog_message(&mut self, message: CatalogMessage) {
        match message {
            CatalogMessage::RequestLoad(kind) => self.start_load(kind),
            CatalogMessage::DiscardPending(kind) => {
                debug!("Discarding pending {} catalog loads", kind.label());
                self.tracker.invalidate(kind);
            }
            CatalogMessage::LoadFinished {
                kind,
                generation,
                catalog,
                failures,
            } => {
                if !self.tracker.is_current(kind, generation) {
                    debug!(
                        "Dropping stale {} catalog load generation={}",
                        kind.label(),
                        generation
                    );
                    return;
                }
                self.tracker.invalidate(kind);
                info!(
                    "{} catalog ready: {} items, {} source failures",
                    kind.label(),
                    catalog.len(),
                    failures.len()
                );
                let _ = self.bus_producer.send(protocol::Message::Catalog(
                    CatalogMessage::CatalogReady {
                        kind,
                        catalog,
                        failures,
                    },
                ));
            }
            CatalogMessage::CatalogReady { .. } => {}
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(protocol::Message::Catalog(message)) => self.handle_catalog_message(message),
                Ok(protocol::Message::Lifecycle(LifecycleMessage::Teardown(kind))) => {
                    self.tracker.invalidate(kind);
                }
                Ok(protocol::Message::Lifecycle(LifecycleMessage::Shutdown)) => {
                    debug!("CatalogManager: shutting down");
                    break;
                }
                Ok(_) => trace!("CatalogManager: ignoring unsupported message"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("CatalogManager: bus lagged, skipped {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    error!("CatalogManager: bus closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{
            local_source::tests::{asset, StubMediaStore},
            local_source::PermissionStatus,
            remote_source::tests::StubRecordStore,
            Catalog, RemoteRecordStore,
        },
        error::CatalogError,
        test_support::{assert_no_message, wait_for_message},
    };
    use serde_json::{json, Value};
    use std::{
        sync::{mpsc, Mutex},
        time::Duration,
    };
    use tokio::sync::broadcast::{self, Receiver, Sender};

    struct CatalogManagerHarness {
        bus_sender: Sender<protocol::Message>,
        receiver: Receiver<protocol::Message>,
    }

    impl CatalogManagerHarness {
        fn new(remote: Arc<dyn RemoteRecordStore>, local: StubMediaStore) -> Self {
            let (bus_sender, _) = broadcast::channel(1024);
            let manager_bus_sender = bus_sender.clone();
            let manager_receiver = bus_sender.subscribe();
            let receiver = bus_sender.subscribe();

            let remote = Arc::new(RemoteCatalogAdapter::new(remote, "music", "video"));
            let local = Arc::new(LocalCatalogAdapter::new(Arc::new(local), 1_000, 100));
            thread::spawn(move || {
                let mut manager =
                    CatalogManager::new(remote, local, manager_receiver, manager_bus_sender);
                manager.run();
            });

            Self {
                bus_sender,
                receiver,
            }
        }

        fn send(&self, message: protocol::Message) {
            self.bus_sender
                .send(message)
                .expect("failed to send message to bus");
        }

        fn wait_for_ready(&mut self) -> (Arc<Catalog>, Vec<CatalogError>) {
            let message = wait_for_message(&mut self.receiver, Duration::from_secs(2), |message| {
                matches!(
                    message,
                    protocol::Message::Catalog(CatalogMessage::CatalogReady { .. })
                )
            });
            match message {
                protocol::Message::Catalog(CatalogMessage::CatalogReady {
                    catalog, failures, ..
                }) => (catalog, failures),
                _ => panic!("expected CatalogReady"),
            }
        }
    }

    fn is_ready(message: &protocol::Message) -> bool {
        matches!(
            message,
            protocol::Message::Catalog(CatalogMessage::CatalogReady { .. })
        )
    }

    #[test]
    fn test_load_merges_remote_before_local() {
        let remote = StubRecordStore::with("music", json!({"b": {"title": "B"}, "a": {"title": "A"}}));
        let local = StubMediaStore::granted(vec![asset("9", "nine.mp3")], Vec::new());
        let mut harness = CatalogManagerHarness::new(Arc::new(remote), local);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Audio,
        )));
        let (catalog, failures) = harness.wait_for_ready();
        let ids: Vec<&str> = catalog.ids().collect();
        assert_eq!(ids, vec!["a", "b", "local-9"]);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_permission_denied_still_delivers_remote_items() {
        let remote = StubRecordStore::with("video", json!({"v1": {"title": "Clip"}}));
        let mut local = StubMediaStore::granted(Vec::new(), vec![asset("1", "home.mp4")]);
        local.permission = PermissionStatus::Denied;
        let mut harness = CatalogManagerHarness::new(Arc::new(remote), local);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Video,
        )));
        let (catalog, failures) = harness.wait_for_ready();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["v1"]);
        assert_eq!(failures, vec![CatalogError::PermissionDenied]);
    }

    #[test]
    fn test_remote_failure_still_delivers_local_items() {
        let remote = StubRecordStore::failing("music", "timeout");
        let local = StubMediaStore::granted(vec![asset("1", "one.mp3")], Vec::new());
        let mut harness = CatalogManagerHarness::new(Arc::new(remote), local);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Audio,
        )));
        let (catalog, failures) = harness.wait_for_ready();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["local-1"]);
        assert_eq!(
            failures,
            vec![CatalogError::SourceUnavailable("timeout".to_string())]
        );
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let remote = StubRecordStore::with("music", json!({}));
        let local = StubMediaStore::granted(Vec::new(), Vec::new());
        let mut harness = CatalogManagerHarness::new(Arc::new(remote), local);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Audio,
        )));
        let _ = harness.wait_for_ready();

        harness.send(protocol::Message::Catalog(CatalogMessage::LoadFinished {
            kind: MediaKind::Audio,
            generation: 1,
            catalog: Arc::new(Catalog::empty(MediaKind::Audio)),
            failures: Vec::new(),
        }));
        assert_no_message(&mut harness.receiver, Duration::from_millis(150), is_ready);
    }

    /// Holds every read until the test releases it.
    struct GatedRecordStore {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl RemoteRecordStore for GatedRecordStore {
        fn read_collection(&self, _name: &str) -> Result<Option<Value>, String> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(None)
        }
    }

    #[test]
    fn test_discarded_load_is_not_delivered() {
        let (release, gate) = mpsc::channel();
        let remote = Arc::new(GatedRecordStore {
            gate: Mutex::new(gate),
        });
        let local = StubMediaStore::granted(Vec::new(), Vec::new());
        let mut harness = CatalogManagerHarness::new(remote, local);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Audio,
        )));
        harness.send(protocol::Message::Catalog(CatalogMessage::DiscardPending(
            MediaKind::Audio,
        )));
        release.send(()).expect("release gate");
        assert_no_message(&mut harness.receiver, Duration::from_millis(200), is_ready);

        harness.send(protocol::Message::Catalog(CatalogMessage::RequestLoad(
            MediaKind::Audio,
        )));
        release.send(()).expect("release gate");
        let (catalog, _) = harness.wait_for_ready();
        assert!(catalog.is_empty());
    }
}
