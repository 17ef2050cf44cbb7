//! App foreground/background and screen focus handling for one session.

use std::sync::Arc;

use log::debug;

use crate::{catalog::MediaKind, playback::PlaybackSession, session_config::SessionConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

pub struct LifecycleCoordinator {
    config: Arc<SessionConfig>,
    kind: MediaKind,
    app_state: AppState,
    resume_after_foreground: bool,
}

impl LifecycleCoordinator {
    pub fn new(config: Arc<SessionConfig>, kind: MediaKind) -> Self {
        Self {
            config,
            kind,
            app_state: AppState::Active,
            resume_after_foreground: false,
        }
    }

    /// Pauses on the way out and, per policy, resumes on the way back.
    pub fn on_app_state_change(&mut self, session: &mut PlaybackSession, next: AppState) {
        let previous = self.app_state;
        self.app_state = next;
        if previous == next {
            return;
        }
        debug!(
            "{} lifecycle: {:?} -> {:?}",
            self.kind.label(),
            previous,
            next
        );

        match next {
            AppState::Background | AppState::Inactive => {
                if previous == AppState::Active {
                    self.resume_after_foreground = session.pause();
                }
            }
            AppState::Active => {
                let resume = std::mem::take(&mut self.resume_after_foreground);
                if resume
                    && self.config.policy(self.kind).resume_on_foreground
                    && session.state().current_item.is_some()
                {
                    debug!("Resuming {} playback on foreground", self.kind.label());
                    session.resume();
                }
            }
        }
    }

    /// Screen lost focus: pause unconditionally. Focus regain never resumes.
    pub fn on_focus_lost(&mut self, session: &mut PlaybackSession) {
        if session.pause() {
            debug!("Paused {} playback on focus loss", self.kind.label());
        }
        self.resume_after_foreground = false;
    }

    pub fn on_focus_gained(&mut self, _session: &mut PlaybackSession) {
        debug!("{} screen focused", self.kind.label());
    }

    pub fn teardown(&mut self, session: &mut PlaybackSession) {
        self.resume_after_foreground = false;
        session.teardown();
    }
}
