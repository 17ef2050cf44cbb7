use std::{num::NonZeroU32, thread, time::Duration};

use governor::{state::NotKeyed, Quota, RateLimiter};
use log::{debug, error, trace, warn};
use tokio::sync::broadcast::{
    error::{RecvError, TryRecvError},
    Receiver, Sender,
};

use crate::{
    catalog::MediaKind,
    lifecycle::LifecycleCoordinator,
    playback::{PlaybackSession, PlaybackState},
    protocol::{self, CatalogMessage, EngineEvent, LifecycleMessage, PlaybackMessage, PlaylistMessage},
};

const PENDING_PROGRESS_POLL: Duration = Duration::from_millis(25);

type ProgressLimiter =
    RateLimiter<NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

// Drives one playback session from the bus
pub struct PlaybackManager {
    session: PlaybackSession,
    lifecycle: LifecycleCoordinator,
    bus_consumer: Receiver<protocol::Message>,
    bus_producer: Sender<protocol::Message>,
    progress_limiter: ProgressLimiter,
    last_published: Option<PlaybackState>,
    progress_pending: bool,
}

/// True when two states differ in nothing but the playback position.
fn is_progress_only(previous: &PlaybackState, next: &PlaybackState) -> bool {
    let mut aligned = previous.clone();
    aligned.position_secs = next.position_secs;
    aligned == *next
}

impl PlaybackManager {
    pub fn new(
        session: PlaybackSession,
        lifecycle: LifecycleCoordinator,
        bus_consumer: Receiver<protocol::Message>,
        bus_producer: Sender<protocol::Message>,
        progress_updates_per_sec: u32,
    ) -> Self {
        let rate = NonZeroU32::new(progress_updates_per_sec).unwrap_or(NonZeroU32::MIN);
        Self {
            session,
            lifecycle,
            bus_consumer,
            bus_producer,
            progress_limiter: RateLimiter::direct(Quota::per_second(rate)),
            last_published: None,
            progress_pending: false,
        }
    }

    fn kind(&self) -> MediaKind {
        self.session.kind()
    }

    fn broadcast_state(&mut self) {
        let state = self.session.state();
        if self.last_published.as_ref() == Some(state) {
            self.progress_pending = false;
            return;
        }
        if let Some(previous) = &self.last_published {
            if is_progress_only(previous, state) && self.progress_limiter.check().is_err() {
                self.progress_pending = true;
                return;
            }
        }
        self.publish_state();
    }

    /// Publishes a held-back position once the limiter allows it.
    fn flush_pending_progress(&mut self) {
        if self.progress_pending && self.progress_limiter.check().is_ok() {
            self.publish_state();
        }
    }

    fn publish_state(&mut self) {
        let state = self.session.state();
        self.progress_pending = false;
        self.last_published = Some(state.clone());
        let _ = self.bus_producer.send(protocol::Message::Playback(
            PlaybackMessage::StateChanged {
                kind: self.kind(),
                state: Box::new(state.clone()),
            },
        ));
    }

    fn handle_playback_message(&mut self, message: PlaybackMessage) {
        if message.command_kind() != Some(self.kind()) {
            return;
        }
        match message {
            PlaybackMessage::Select { item_id, .. } => self.session.select(&item_id),
            PlaybackMessage::TogglePlayPause(_) => self.session.toggle_play_pause(),
            PlaybackMessage::SeekStart(_) => self.session.seek_start(),
            PlaybackMessage::SeekCommit { fraction, .. } => self.session.seek_commit(fraction),
            PlaybackMessage::Next(_) => self.session.next(),
            PlaybackMessage::Previous(_) => self.session.previous(),
            PlaybackMessage::Shuffle(_) => self.session.shuffle(),
            PlaybackMessage::ToggleRepeat(_) => self.session.toggle_repeat(),
            PlaybackMessage::StateChanged { .. } => return,
        }
        self.broadcast_state();
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Status { kind, status } if kind == self.kind() => {
                self.session.handle_engine_status(&status);
            }
            EngineEvent::Failed {
                kind,
                handle_id,
                message,
            } if kind == self.kind() => {
                self.session.handle_engine_failure(handle_id, &message);
            }
            _ => return,
        }
        self.broadcast_state();
    }

    /// Returns false when the manager should stop.
    fn handle_lifecycle_message(&mut self, message: LifecycleMessage) -> bool {
        let kind = self.kind();
        match message {
            LifecycleMessage::AppStateChanged(app_state) => {
                self.lifecycle
                    .on_app_state_change(&mut self.session, app_state);
            }
            LifecycleMessage::FocusLost(target) if target == kind => {
                self.lifecycle.on_focus_lost(&mut self.session);
            }
            LifecycleMessage::FocusGained(target) if target == kind => {
                self.lifecycle.on_focus_gained(&mut self.session);
            }
            LifecycleMessage::Teardown(target) if target == kind => {
                self.lifecycle.teardown(&mut self.session);
            }
            LifecycleMessage::Shutdown => {
                self.lifecycle.teardown(&mut self.session);
                self.broadcast_state();
                return false;
            }
            _ => return true,
        }
        self.broadcast_state();
        true
    }

    /// Returns false when the manager should stop.
    fn handle_message(&mut self, message: protocol::Message) -> bool {
        match message {
            protocol::Message::Playback(message) => self.handle_playback_message(message),
            protocol::Message::Engine(event) => self.handle_engine_event(event),
            protocol::Message::Catalog(CatalogMessage::CatalogReady { kind, catalog, .. })
                if kind == self.kind() =>
            {
                self.session.set_catalog(catalog);
                self.broadcast_state();
            }
            protocol::Message::Playlist(PlaylistMessage::ScopeChanged { kind, scope })
                if kind == self.kind() =>
            {
                self.session.set_playlist_scope(scope);
                self.broadcast_state();
            }
            protocol::Message::Lifecycle(message) => {
                if !self.handle_lifecycle_message(message) {
                    debug!("PlaybackManager({}): shutting down", self.kind().label());
                    return false;
                }
            }
            _ => trace!("PlaybackManager: ignoring unsupported message"),
        }
        true
    }

    /// Polls the bus while a position update is held back, so it goes out
    /// even when no further message arrives.
    fn next_message(&mut self) -> Option<protocol::Message> {
        loop {
            if self.progress_pending {
                match self.bus_consumer.try_recv() {
                    Ok(message) => return Some(message),
                    Err(TryRecvError::Empty) => {
                        self.flush_pending_progress();
                        if self.progress_pending {
                            thread::sleep(PENDING_PROGRESS_POLL);
                        }
                    }
                    Err(TryRecvError::Lagged(skipped)) => self.warn_lagged(skipped),
                    Err(TryRecvError::Closed) => return None,
                }
            } else {
                match self.bus_consumer.blocking_recv() {
                    Ok(message) => return Some(message),
                    Err(RecvError::Lagged(skipped)) => self.warn_lagged(skipped),
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }

    fn warn_lagged(&self, skipped: u64) {
        warn!(
            "PlaybackManager({}): bus lagged, skipped {} messages",
            self.kind().label(),
            skipped
        );
    }

    pub fn run(&mut self) {
        self.broadcast_state();
        loop {
            let Some(message) = self.next_message() else {
                error!("PlaybackManager({}): bus closed", self.kind().label());
                break;
            };
            if !self.handle_message(message) {
                break;
            }
        }
    }
}
