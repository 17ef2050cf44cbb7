//! Persistent application configuration model and defaults.

use std::path::Path;

use log::{info, warn};

/// Root configuration persisted to `mediadeck.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Local media folders and scan limits.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Remote record store connection.
    pub remote: RemoteConfig,
    #[serde(default)]
    /// Transport preferences.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Audio mode and lifecycle policy.
    pub session: SessionModeConfig,
    #[serde(default)]
    /// Durable storage location and keys.
    pub storage: StorageConfig,
    #[serde(default)]
    /// Selection analytics.
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    /// Simulated engine tuning.
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local media store preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub audio_folders: Vec<String>,
    #[serde(default)]
    pub video_folders: Vec<String>,
    /// Answer to the media-library permission prompt.
    #[serde(default = "default_true")]
    pub grant_media_access: bool,
    #[serde(default = "default_audio_scan_limit")]
    pub audio_scan_limit: usize,
    #[serde(default = "default_video_scan_limit")]
    pub video_scan_limit: usize,
}

/// Remote keyed record store (REST JSON endpoint).
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RemoteConfig {
    /// Empty disables the remote contribution.
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_audio_collection")]
    pub audio_collection: String,
    #[serde(default = "default_video_collection")]
    pub video_collection: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_true")]
    pub audio_autoplay: bool,
    #[serde(default = "default_true")]
    pub video_autoplay: bool,
    /// Upper bound for position-only state broadcasts.
    #[serde(default = "default_progress_updates_per_sec")]
    pub progress_updates_per_sec: u32,
}

/// How a session competes with other audio on the device.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionMode {
    #[default]
    DoNotMix,
    DuckOthers,
    MixWithOthers,
}

/// Audio mode and lifecycle preferences, read once into `SessionConfig`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SessionModeConfig {
    #[serde(default = "default_true")]
    pub stays_active_in_background: bool,
    #[serde(default = "default_true")]
    pub plays_in_silent_mode: bool,
    #[serde(default)]
    pub interruption_mode: InterruptionMode,
    #[serde(default = "default_true")]
    pub audio_resume_on_foreground: bool,
    #[serde(default)]
    pub video_resume_on_foreground: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    /// Empty selects `<data dir>/mediadeck/state.db`.
    #[serde(default)]
    pub database_file: String,
    #[serde(default = "default_audio_playlists_key")]
    pub audio_playlists_key: String,
    #[serde(default = "default_video_playlists_key")]
    pub video_playlists_key: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, Default)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub app_key: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Used when a media duration cannot be probed.
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            audio_folders: Vec::new(),
            video_folders: Vec::new(),
            grant_media_access: true,
            audio_scan_limit: default_audio_scan_limit(),
            video_scan_limit: default_video_scan_limit(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: String::new(),
            audio_collection: default_audio_collection(),
            video_collection: default_video_collection(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            audio_autoplay: true,
            video_autoplay: true,
            progress_updates_per_sec: default_progress_updates_per_sec(),
        }
    }
}

impl Default for SessionModeConfig {
    fn default() -> Self {
        Self {
            stays_active_in_background: true,
            plays_in_silent_mode: true,
            interruption_mode: InterruptionMode::DoNotMix,
            audio_resume_on_foreground: true,
            video_resume_on_foreground: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: String::new(),
            audio_playlists_key: default_audio_playlists_key(),
            video_playlists_key: default_video_playlists_key(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            fallback_duration_secs: default_fallback_duration_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_audio_scan_limit() -> usize {
    1_000
}

fn default_video_scan_limit() -> usize {
    100
}

fn default_audio_collection() -> String {
    "music".to_string()
}

fn default_video_collection() -> String {
    "video".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_progress_updates_per_sec() -> u32 {
    4
}

fn default_audio_playlists_key() -> String {
    "playlists".to_string()
}

fn default_video_playlists_key() -> String {
    "video_playlists".to_string()
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_fallback_duration_secs() -> u64 {
    180
}

fn default_log_level() -> String {
    "debug".to_string()
}

/// Clamps values that would otherwise stall or flood the runtime.
pub fn sanitize_config(config: Config) -> Config {
    let mut config = config;
    config.library.audio_scan_limit = config.library.audio_scan_limit.max(1);
    config.library.video_scan_limit = config.library.video_scan_limit.max(1);
    config.remote.base_url = config.remote.base_url.trim().trim_end_matches('/').to_string();
    config.remote.connect_timeout_secs = config.remote.connect_timeout_secs.clamp(1, 60);
    config.remote.read_timeout_secs = config.remote.read_timeout_secs.clamp(1, 120);
    config.playback.progress_updates_per_sec = config.playback.progress_updates_per_sec.clamp(1, 60);
    config.engine.tick_interval_ms = config.engine.tick_interval_ms.clamp(10, 5_000);
    config.engine.fallback_duration_secs = config.engine.fallback_duration_secs.max(1);
    if config.storage.audio_playlists_key.trim().is_empty() {
        config.storage.audio_playlists_key = default_audio_playlists_key();
    }
    if config.storage.video_playlists_key.trim().is_empty() {
        config.storage.video_playlists_key = default_video_playlists_key();
    }
    config
}

/// Reads the config file, writing defaults first when it does not exist.
/// A malformed file falls back to defaults instead of aborting startup.
pub fn load_or_create(config_file: &Path) -> Config {
    if !config_file.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        match toml::to_string(&Config::default()) {
            Ok(serialized) => {
                if let Err(err) = std::fs::write(config_file, serialized) {
                    warn!(
                        "Failed to write default config. path={} error={}",
                        config_file.display(),
                        err
                    );
                }
            }
            Err(err) => warn!("Failed to serialize default config: {}", err),
        }
    }

    let content = match std::fs::read_to_string(config_file) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config. path={} error={}",
                config_file.display(),
                err
            );
            return Config::default();
        }
    };
    let parsed = toml::from_str::<Config>(&content).unwrap_or_else(|err| {
        warn!("Config is malformed, using defaults: {}", err);
        Config::default()
    });
    sanitize_config(parsed)
}

#[cfg(test)]
mod tests {
    use super::{load_or_create, sanitize_config, Config, InterruptionMode};

    #[test]
    fn test_default_config_has_expected_values() {
        let config = Config::default();

        assert!(config.library.audio_folders.is_empty());
        assert!(config.library.video_folders.is_empty());
        assert!(config.library.grant_media_access);
        assert_eq!(config.library.audio_scan_limit, 1_000);
        assert_eq!(config.library.video_scan_limit, 100);
        assert!(config.remote.base_url.is_empty());
        assert_eq!(config.remote.audio_collection, "music");
        assert_eq!(config.remote.video_collection, "video");
        assert!(config.playback.audio_autoplay);
        assert!(config.playback.video_autoplay);
        assert!(config.session.stays_active_in_background);
        assert!(config.session.plays_in_silent_mode);
        assert_eq!(config.session.interruption_mode, InterruptionMode::DoNotMix);
        assert!(config.session.audio_resume_on_foreground);
        assert!(!config.session.video_resume_on_foreground);
        assert_eq!(config.storage.audio_playlists_key, "playlists");
        assert_eq!(config.storage.video_playlists_key, "video_playlists");
        assert!(!config.analytics.enabled);
        assert_eq!(config.engine.tick_interval_ms, 250);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_fills_missing_sections_with_defaults() {
        let partial_toml = r#"
[library]
audio_folders = ["/music"]

[remote]
base_url = "https://records.example.com/"
"#;

        let parsed: Config = toml::from_str(partial_toml).expect("config should parse");
        assert_eq!(parsed.library.audio_folders, vec!["/music".to_string()]);
        assert_eq!(parsed.library.audio_scan_limit, 1_000);
        assert!(parsed.library.grant_media_access);
        assert_eq!(parsed.remote.audio_collection, "music");
        assert_eq!(parsed.session, Config::default().session);

        let sanitized = sanitize_config(parsed);
        assert_eq!(sanitized.remote.base_url, "https://records.example.com");
    }

    #[test]
    fn test_sanitize_config_clamps_degenerate_values() {
        let mut config = Config::default();
        config.library.audio_scan_limit = 0;
        config.engine.tick_interval_ms = 0;
        config.playback.progress_updates_per_sec = 0;
        config.storage.audio_playlists_key = "  ".to_string();

        let sanitized = sanitize_config(config);
        assert_eq!(sanitized.library.audio_scan_limit, 1);
        assert_eq!(sanitized.engine.tick_interval_ms, 10);
        assert_eq!(sanitized.playback.progress_updates_per_sec, 1);
        assert_eq!(sanitized.storage.audio_playlists_key, "playlists");
    }

    #[test]
    fn test_load_or_create_writes_defaults_and_tolerates_garbage() {
        let dir = std::env::temp_dir().join(format!("mediadeck-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let config_file = dir.join("mediadeck.toml");

        let created = load_or_create(&config_file);
        assert!(config_file.exists());
        assert_eq!(created, sanitize_config(Config::default()));

        std::fs::write(&config_file, "this is = = not toml").expect("write garbage");
        let recovered = load_or_create(&config_file);
        assert_eq!(recovered, sanitize_config(Config::default()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
