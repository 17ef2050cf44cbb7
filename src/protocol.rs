//! Event-bus protocol shared by all runtime components.
//!
//! This module defines the payloads exchanged between catalog loading, playlist
//! management, the per-kind playback sessions, the media engine and the app
//! lifecycle source.

use std::sync::Arc;

use crate::{
    catalog::{Catalog, MediaKind},
    engine::EngineStatus,
    error::{CatalogError, PlaylistError},
    lifecycle::AppState,
    playback::PlaybackState,
    playlist::PlaylistScope,
};

/// What happens when the current item finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off, // Advance to the next scoped item
    Track, // Replay the current item from the start
}

impl RepeatMode {
    pub fn toggled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Catalog(CatalogMessage),
    Playlist(PlaylistMessage),
    Playback(PlaybackMessage),
    Engine(EngineEvent),
    Lifecycle(LifecycleMessage),
}

/// Catalog loading commands and notifications.
#[derive(Debug, Clone)]
pub enum CatalogMessage {
    RequestLoad(MediaKind),
    /// The requesting view went away; in-flight loads for this kind are dropped.
    DiscardPending(MediaKind),
    /// Worker completion. Only accepted when `generation` is still current.
    LoadFinished {
        kind: MediaKind,
        generation: u64,
        catalog: Arc<Catalog>,
        failures: Vec<CatalogError>,
    },
    CatalogReady {
        kind: MediaKind,
        catalog: Arc<Catalog>,
        failures: Vec<CatalogError>,
    },
}

/// Playlist-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaylistMessage {
    CreatePlaylist {
        kind: MediaKind,
        name: String,
    },
    DeletePlaylist {
        kind: MediaKind,
        name: String,
    },
    RenamePlaylist {
        kind: MediaKind,
        name: String,
        new_name: String,
    },
    AddMember {
        kind: MediaKind,
        playlist: String,
        item_id: String,
    },
    RemoveMember {
        kind: MediaKind,
        playlist: String,
        item_id: String,
    },
    SetActive {
        kind: MediaKind,
        name: String,
    },
    RequestSnapshot(MediaKind),
    PlaylistsChanged {
        kind: MediaKind,
        names: Vec<String>,
        active: String,
    },
    ScopeChanged {
        kind: MediaKind,
        scope: PlaylistScope,
    },
    CommandFailed {
        kind: MediaKind,
        error: PlaylistError,
    },
}

/// Transport commands for one session, and its state notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    Select { kind: MediaKind, item_id: String },
    TogglePlayPause(MediaKind),
    SeekStart(MediaKind),
    SeekCommit { kind: MediaKind, fraction: f64 },
    Next(MediaKind),
    Previous(MediaKind),
    Shuffle(MediaKind),
    ToggleRepeat(MediaKind),
    StateChanged {
        kind: MediaKind,
        state: Box<PlaybackState>,
    },
}

impl PlaybackMessage {
    /// Kind addressed by a transport command. Notifications return `None`.
    pub fn command_kind(&self) -> Option<MediaKind> {
        match self {
            PlaybackMessage::Select { kind, .. }
            | PlaybackMessage::SeekCommit { kind, .. }
            | PlaybackMessage::TogglePlayPause(kind)
            | PlaybackMessage::SeekStart(kind)
            | PlaybackMessage::Next(kind)
            | PlaybackMessage::Previous(kind)
            | PlaybackMessage::Shuffle(kind)
            | PlaybackMessage::ToggleRepeat(kind) => Some(*kind),
            PlaybackMessage::StateChanged { .. } => None,
        }
    }
}

/// Callbacks from the media engine, addressed by session kind and handle.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Status {
        kind: MediaKind,
        status: EngineStatus,
    },
    Failed {
        kind: MediaKind,
        handle_id: u64,
        message: String,
    },
}

/// App foreground/background transitions and per-screen focus changes.
#[derive(Debug, Clone)]
pub enum LifecycleMessage {
    AppStateChanged(AppState),
    FocusLost(MediaKind),
    FocusGained(MediaKind),
    /// The screen for this kind is gone; release its engine handle.
    Teardown(MediaKind),
    Shutdown,
}
