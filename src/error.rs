//! Error taxonomy shared by the catalog, playlist, playback and storage layers.
//!
//! Every error here is caught at the boundary where it occurs and converted into
//! state (an empty catalog slice, an `Error` playback status, a rejected command
//! notification). None of them is allowed to take the process down.

use thiserror::Error;

/// Failures reported by catalog source adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Local media access was refused; the local contribution becomes empty.
    #[error("media library permission denied")]
    PermissionDenied,
    /// A source could not be read or parsed; its contribution becomes empty.
    #[error("media source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Input-validation failures of the playlist store. Rejected synchronously,
/// with no partial mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaylistError {
    #[error("playlist name must not be empty")]
    InvalidName,
    #[error("a playlist named '{0}' already exists")]
    DuplicateName(String),
    #[error("playlist '{0}' is protected")]
    ProtectedPlaylist(String),
    #[error("playlist '{0}' was not found")]
    NotFound(String),
}

/// Playback failures surfaced on the session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback failed: {0}")]
    PlaybackFailed(String),
}

/// Error returned by a media engine or one of its handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<EngineError> for PlaybackError {
    fn from(error: EngineError) -> Self {
        PlaybackError::PlaybackFailed(error.0)
    }
}

/// Durable key-value storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no data directory available on this platform")]
    NoDataDirectory,
}
