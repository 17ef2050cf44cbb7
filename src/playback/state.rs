use std::sync::Arc;

use crate::{
    catalog::{Catalog, MediaItem, MediaKind},
    engine::EngineStatus,
    playlist::PlaylistScope,
    protocol::RepeatMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

/// Catalog plus active playlist: the items next/previous/shuffle may pick from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackScope {
    pub catalog: Arc<Catalog>,
    pub playlist: PlaylistScope,
}

impl PlaybackScope {
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            catalog: Arc::new(Catalog::empty(kind)),
            playlist: PlaylistScope::all(),
        }
    }

    /// Eligible item ids in catalog order.
    pub fn scoped_ids(&self) -> Vec<String> {
        self.playlist.scoped_ids(&self.catalog)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub scope: PlaybackScope,
    pub current_item: Option<MediaItem>,
    pub status: PlaybackStatus,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub repeat_mode: RepeatMode,
    pub is_user_seeking: bool,
    pub last_error: Option<String>,
}

impl PlaybackState {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            scope: PlaybackScope::empty(kind),
            current_item: None,
            status: PlaybackStatus::Idle,
            position_secs: 0.0,
            duration_secs: 0.0,
            repeat_mode: RepeatMode::Off,
            is_user_seeking: false,
            last_error: None,
        }
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current_item.as_ref().map(|item| item.title.as_str())
    }

    /// Playback progress in `0.0..=1.0`, for a seek bar.
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(MediaKind::Audio)
    }
}

/// Follow-up required when the engine reports the current item finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishAction {
    ReplayCurrent,
    AdvanceToNext,
}

/// Folds one engine status into the state.
///
/// Position is left alone while the user drags the seek bar. The finish action
/// is decided from the repeat mode held in `state` at the moment of the call,
/// and there is none while the session is in `Error`.
pub fn apply_engine_status(
    mut state: PlaybackState,
    status: &EngineStatus,
) -> (PlaybackState, Option<FinishAction>) {
    if !status.is_loaded || state.status == PlaybackStatus::Loading {
        return (state, None);
    }

    if let Some(duration_ms) = status.duration_ms.filter(|ms| *ms > 0) {
        state.duration_secs = duration_ms as f64 / 1000.0;
    }
    if !state.is_user_seeking {
        state.position_secs = status.position_ms as f64 / 1000.0;
    }

    if status.did_just_finish {
        if state.status == PlaybackStatus::Error {
            return (state, None);
        }
        state.status = PlaybackStatus::Paused;
        let action = match state.repeat_mode {
            RepeatMode::Track => FinishAction::ReplayCurrent,
            RepeatMode::Off => FinishAction::AdvanceToNext,
        };
        return (state, Some(action));
    }

    if state.status != PlaybackStatus::Error {
        state.status = if status.is_playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        };
    }
    (state, None)
}

/// Formats seconds as `m:ss`.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
