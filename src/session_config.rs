//! Process-wide session configuration.
//!
//! Built once at startup from [`Config`] and shared by reference with every
//! playback runtime, so no call site mutates audio mode or lifecycle policy
//! after the services are running.

use crate::{
    catalog::MediaKind,
    config::{Config, InterruptionMode},
};

/// Device audio mode handed to the media engine at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMode {
    pub stays_active_in_background: bool,
    pub plays_in_silent_mode: bool,
    pub interruption_mode: InterruptionMode,
}

/// How a session reacts when the app returns to the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Resume playback that was active right before backgrounding.
    pub resume_on_foreground: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub audio_mode: AudioMode,
    audio_policy: LifecyclePolicy,
    video_policy: LifecyclePolicy,
    audio_autoplay: bool,
    video_autoplay: bool,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            audio_mode: AudioMode {
                stays_active_in_background: config.session.stays_active_in_background,
                plays_in_silent_mode: config.session.plays_in_silent_mode,
                interruption_mode: config.session.interruption_mode,
            },
            audio_policy: LifecyclePolicy {
                resume_on_foreground: config.session.audio_resume_on_foreground,
            },
            video_policy: LifecyclePolicy {
                resume_on_foreground: config.session.video_resume_on_foreground,
            },
            audio_autoplay: config.playback.audio_autoplay,
            video_autoplay: config.playback.video_autoplay,
        }
    }

    pub fn policy(&self, kind: MediaKind) -> LifecyclePolicy {
        match kind {
            MediaKind::Audio => self.audio_policy,
            MediaKind::Video => self.video_policy,
        }
    }

    pub fn autoplay(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio_autoplay,
            MediaKind::Video => self.video_autoplay,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
