use std::collections::HashMap;

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::{
    catalog::MediaKind,
    error::PlaylistError,
    playlist::PlaylistStore,
    protocol::{self, LifecycleMessage, PlaylistMessage},
};

// Owns the playlist store of each media kind
pub struct PlaylistManager {
    stores: HashMap<MediaKind, PlaylistStore>,
    bus_consumer: Receiver<protocol::Message>,
    bus_producer: Sender<protocol::Message>,
}

impl PlaylistManager {
    pub fn new(
        audio_store: PlaylistStore,
        video_store: PlaylistStore,
        bus_consumer: Receiver<protocol::Message>,
        bus_producer: Sender<protocol::Message>,
    ) -> Self {
        let mut stores = HashMap::new();
        stores.insert(MediaKind::Audio, audio_store);
        stores.insert(MediaKind::Video, video_store);
        Self {
            stores,
            bus_consumer,
            bus_producer,
        }
    }

    fn broadcast_snapshot(&self, kind: MediaKind) {
        let Some(store) = self.stores.get(&kind) else {
            return;
        };
        let _ = self.bus_producer.send(protocol::Message::Playlist(
            PlaylistMessage::PlaylistsChanged {
                kind,
                names: store.list(),
                active: store.active().to_string(),
            },
        ));
        let _ = self.bus_producer.send(protocol::Message::Playlist(
            PlaylistMessage::ScopeChanged {
                kind,
                scope: store.scope(),
            },
        ));
    }

    fn apply(
        &mut self,
        kind: MediaKind,
        command: impl FnOnce(&mut PlaylistStore) -> Result<(), PlaylistError>,
    ) {
        let Some(store) = self.stores.get_mut(&kind) else {
            return;
        };
        match command(store) {
            Ok(()) => self.broadcast_snapshot(kind),
            Err(err) => {
                warn!("{} playlist command rejected: {}", kind.label(), err);
                let _ = self.bus_producer.send(protocol::Message::Playlist(
                    PlaylistMessage::CommandFailed { kind, error: err },
                ));
            }
        }
    }

    fn handle_playlist_message(&mut self, message: PlaylistMessage) {
        match message {
            PlaylistMessage::CreatePlaylist { kind, name } => {
                // A playlist created from the UI becomes the active one right away.
                self.apply(kind, |store| {
                    let created = store.create(&name)?.name.clone();
                    info!("Created {} playlist '{}'", kind.label(), created);
                    store.set_active(&created)
                });
            }
            PlaylistMessage::DeletePlaylist { kind, name } => {
                self.apply(kind, |store| store.delete(&name));
            }
            PlaylistMessage::RenamePlaylist {
                kind,
                name,
                new_name,
            } => {
                self.apply(kind, |store| store.rename(&name, &new_name));
            }
            PlaylistMessage::AddMember {
                kind,
                playlist,
                item_id,
            } => {
                self.apply(kind, |store| store.add_member(&playlist, &item_id));
            }
            PlaylistMessage::RemoveMember {
                kind,
                playlist,
                item_id,
            } => {
                self.apply(kind, |store| store.remove_member(&playlist, &item_id));
            }
            PlaylistMessage::SetActive { kind, name } => {
                self.apply(kind, |store| store.set_active(&name));
            }
            PlaylistMessage::RequestSnapshot(kind) => self.broadcast_snapshot(kind),
            PlaylistMessage::PlaylistsChanged { .. }
            | PlaylistMessage::ScopeChanged { .. }
            | PlaylistMessage::CommandFailed { .. } => {}
        }
    }

    pub fn run(&mut self) {
        for kind in MediaKind::ALL {
            self.broadcast_snapshot(kind);
        }

        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(protocol::Message::Playlist(message)) => self.handle_playlist_message(message),
                Ok(protocol::Message::Lifecycle(LifecycleMessage::Shutdown)) => {
                    debug!("PlaylistManager: shutting down");
                    break;
                }
                Ok(_) => trace!("PlaylistManager: ignoring unsupported message"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("PlaylistManager: bus lagged, skipped {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    error!("PlaylistManager: bus closed");
                    break;
                }
            }
        }
    }
}
