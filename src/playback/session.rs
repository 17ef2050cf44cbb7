//! Transport state machine around a single engine handle.

use std::sync::Arc;

use log::{debug, error, info, warn};

use super::{
    shuffle::ShufflePicker,
    state::{apply_engine_status, FinishAction, PlaybackState, PlaybackStatus},
};
use crate::{
    analytics::{selection_event, AnalyticsSink},
    catalog::{Catalog, MediaItem, MediaKind},
    engine::{ActiveHandle, EngineStatus, MediaEngine},
    error::{EngineError, PlaybackError},
    playlist::PlaylistScope,
};

/// Playback for one media kind. All commands run on the owning thread, so they
/// never interleave; a command that arrives while `Loading` is ignored.
pub struct PlaybackSession {
    kind: MediaKind,
    engine: Box<dyn MediaEngine>,
    handle: Option<ActiveHandle>,
    state: PlaybackState,
    picker: Box<dyn ShufflePicker>,
    analytics: Arc<dyn AnalyticsSink>,
    autoplay: bool,
}

impl PlaybackSession {
    pub fn new(
        kind: MediaKind,
        engine: Box<dyn MediaEngine>,
        picker: Box<dyn ShufflePicker>,
        analytics: Arc<dyn AnalyticsSink>,
        autoplay: bool,
    ) -> Self {
        Self {
            kind,
            engine,
            handle: None,
            state: PlaybackState::new(kind),
            picker,
            analytics,
            autoplay,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    fn is_loading(&self) -> bool {
        if self.state.status == PlaybackStatus::Loading {
            debug!("Ignoring {} transport command while loading", self.kind.label());
            return true;
        }
        false
    }

    pub fn set_catalog(&mut self, catalog: Arc<Catalog>) {
        self.state.scope.catalog = catalog;
    }

    pub fn set_playlist_scope(&mut self, scope: PlaylistScope) {
        self.state.scope.playlist = scope;
    }

    /// Selects an item of the current catalog by id.
    pub fn select(&mut self, item_id: &str) {
        if self.is_loading() {
            return;
        }
        let Some(item) = self.state.scope.catalog.get(item_id).cloned() else {
            warn!(
                "Ignoring selection of unknown {} item id={}",
                self.kind.label(),
                item_id
            );
            return;
        };
        self.load_item(item);
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
    }

    fn load_item(&mut self, item: MediaItem) {
        self.release_handle();

        self.state.status = PlaybackStatus::Loading;
        self.state.position_secs = 0.0;
        self.state.duration_secs = item.duration_secs.unwrap_or(0.0);
        self.state.is_user_seeking = false;
        self.state.last_error = None;
        self.state.current_item = Some(item.clone());

        if item.uri.is_empty() {
            self.fail(PlaybackError::PlaybackFailed(format!(
                "item '{}' has no uri",
                item.id
            )));
            return;
        }

        match self.engine.load(&item.uri, self.autoplay) {
            Ok(handle) => {
                info!(
                    "Loaded {} item id={} handle={}",
                    self.kind.label(),
                    item.id,
                    handle.id()
                );
                self.handle = Some(ActiveHandle::new(handle));
                self.state.status = if self.autoplay {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::Paused
                };
                let (event, attributes) =
                    selection_event(self.kind, &item.title, self.state.duration_secs);
                self.analytics.record(event, &attributes);
            }
            Err(err) => self.fail(err.into()),
        }
    }

    fn fail(&mut self, err: PlaybackError) {
        error!("{} playback error: {}", self.kind.label(), err);
        self.state.status = PlaybackStatus::Error;
        self.state.is_user_seeking = false;
        self.state.last_error = Some(err.to_string());
    }

    fn with_handle(
        &mut self,
        command: impl FnOnce(&mut dyn crate::engine::EngineHandle) -> Result<(), EngineError>,
    ) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        match command(handle.handle_mut()) {
            Ok(()) => true,
            Err(err) => {
                self.fail(err.into());
                false
            }
        }
    }

    fn reload_current(&mut self) {
        if let Some(item) = self.state.current_item.clone() {
            self.load_item(item);
        }
    }

    pub fn toggle_play_pause(&mut self) {
        if self.is_loading() || self.state.current_item.is_none() {
            return;
        }
        match self.state.status {
            PlaybackStatus::Playing => {
                self.pause();
            }
            PlaybackStatus::Paused | PlaybackStatus::Idle => {
                if self.handle.is_some() {
                    self.resume();
                } else {
                    self.reload_current();
                }
            }
            PlaybackStatus::Error => self.reload_current(),
            PlaybackStatus::Loading => {}
        }
    }

    /// Pauses if playing. Returns whether playback was active.
    pub fn pause(&mut self) -> bool {
        if self.state.status != PlaybackStatus::Playing {
            return false;
        }
        if self.with_handle(|handle| handle.pause()) {
            self.state.status = PlaybackStatus::Paused;
        }
        true
    }

    pub fn resume(&mut self) {
        if !matches!(self.state.status, PlaybackStatus::Paused | PlaybackStatus::Idle) {
            return;
        }
        if self.with_handle(|handle| handle.play()) {
            self.state.status = PlaybackStatus::Playing;
        }
    }

    pub fn seek_start(&mut self) {
        if self.state.current_item.is_some() {
            self.state.is_user_seeking = true;
        }
    }

    /// Seeks to `fraction` of the duration. Targets past the end are rejected.
    pub fn seek_commit(&mut self, fraction: f64) {
        if self.is_loading() {
            return;
        }
        let duration = self.state.duration_secs;
        let target = fraction * duration;
        if !fraction.is_finite() || fraction < 0.0 || target > duration {
            debug!(
                "Rejecting {} seek to fraction={} duration={}",
                self.kind.label(),
                fraction,
                duration
            );
        } else if self.with_handle(|handle| handle.seek_to((target * 1000.0) as u64)) {
            self.state.position_secs = target;
        }
        self.state.is_user_seeking = false;
    }

    fn position_in_scope(&self, ids: &[String]) -> Option<usize> {
        let current = self.state.current_item.as_ref()?;
        ids.iter().position(|id| *id == current.id)
    }

    /// Advances in scope order, wrapping at the end. An item outside the
    /// scope restarts from the first scoped item.
    pub fn next(&mut self) {
        if self.is_loading() || self.state.current_item.is_none() {
            return;
        }
        let ids = self.state.scope.scoped_ids();
        if ids.is_empty() {
            return;
        }
        let index = match self.position_in_scope(&ids) {
            Some(index) => (index + 1) % ids.len(),
            None => 0,
        };
        self.select(&ids[index]);
    }

    /// Steps back in scope order. Stays on the first item without wrapping.
    pub fn previous(&mut self) {
        if self.is_loading() || self.state.current_item.is_none() {
            return;
        }
        let ids = self.state.scope.scoped_ids();
        if ids.is_empty() {
            return;
        }
        match self.position_in_scope(&ids) {
            Some(0) => {}
            Some(index) => self.select(&ids[index - 1]),
            None => self.select(&ids[0]),
        }
    }

    /// Selects a uniformly random scoped item, possibly the current one.
    pub fn shuffle(&mut self) {
        if self.is_loading() {
            return;
        }
        let ids = self.state.scope.scoped_ids();
        if ids.is_empty() {
            return;
        }
        let index = self.picker.pick(ids.len());
        match ids.get(index) {
            Some(id) => {
                let id = id.clone();
                self.select(&id);
            }
            None => warn!("Shuffle picker returned out-of-range index {}", index),
        }
    }

    pub fn toggle_repeat(&mut self) {
        self.state.repeat_mode = self.state.repeat_mode.toggled();
    }

    /// Applies a status event from the engine. Events for a handle other than
    /// the open one are stale and ignored.
    pub fn handle_engine_status(&mut self, status: &EngineStatus) {
        let Some(handle_id) = self.handle.as_ref().map(ActiveHandle::id) else {
            return;
        };
        if status.handle_id != handle_id {
            debug!(
                "Ignoring stale engine status for handle {} (current {})",
                status.handle_id, handle_id
            );
            return;
        }

        let state = std::mem::take(&mut self.state);
        let (state, action) = apply_engine_status(state, status);
        self.state = state;

        match action {
            Some(FinishAction::ReplayCurrent) => {
                if self.with_handle(|handle| handle.replay()) {
                    self.state.position_secs = 0.0;
                    self.state.status = PlaybackStatus::Playing;
                }
            }
            Some(FinishAction::AdvanceToNext) => self.next(),
            None => {}
        }
    }

    pub fn handle_engine_failure(&mut self, handle_id: u64, message: &str) {
        if self.handle.as_ref().map(ActiveHandle::id) != Some(handle_id) {
            return;
        }
        self.fail(PlaybackError::PlaybackFailed(message.to_string()));
    }

    /// Stops and releases the engine handle unconditionally. The current item
    /// stays selected so the next toggle reloads it.
    pub fn teardown(&mut self) {
        self.release_handle();
        self.state.status = PlaybackStatus::Idle;
        self.state.position_secs = 0.0;
        self.state.is_user_seeking = false;
    }
}
