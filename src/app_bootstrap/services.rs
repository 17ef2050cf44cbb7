use std::{
    any::Any,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use tokio::sync::broadcast;

use crate::{
    analytics::{self, AnalyticsSink},
    catalog::{
        FolderMediaStore, HttpRecordStore, LocalCatalogAdapter, MediaKind, RemoteCatalogAdapter,
    },
    catalog_manager::CatalogManager,
    config::Config,
    console::{self, ConsoleSnapshot},
    engine::SimulatedEngine,
    lifecycle::LifecycleCoordinator,
    playback::{PlaybackSession, RandomPicker},
    playback_manager::PlaybackManager,
    playlist::PlaylistStore,
    playlist_manager::PlaylistManager,
    protocol::Message,
    session_config::SessionConfig,
};

pub struct BackgroundServicesConfig {
    pub bus_sender: broadcast::Sender<Message>,
    pub config: Config,
    pub session_config: Arc<SessionConfig>,
    pub audio_playlists: PlaylistStore,
    pub video_playlists: PlaylistStore,
    pub console_snapshot: Arc<Mutex<ConsoleSnapshot>>,
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn folders(paths: &[String]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| path.trim())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Subscribes every service to the bus before any of them starts, so the
/// startup snapshots reach all listeners.
pub fn spawn_background_services(config: BackgroundServicesConfig) -> Vec<JoinHandle<()>> {
    let BackgroundServicesConfig {
        bus_sender,
        config,
        session_config,
        audio_playlists,
        video_playlists,
        console_snapshot,
    } = config;
    let mut handles = Vec::new();

    let remote = Arc::new(RemoteCatalogAdapter::new(
        Arc::new(HttpRecordStore::new(&config.remote)),
        config.remote.audio_collection.clone(),
        config.remote.video_collection.clone(),
    ));
    let local_store = FolderMediaStore::new(
        folders(&config.library.audio_folders),
        folders(&config.library.video_folders),
        config.library.grant_media_access,
    );
    let local = Arc::new(LocalCatalogAdapter::new(
        Arc::new(local_store),
        config.library.audio_scan_limit,
        config.library.video_scan_limit,
    ));
    let analytics_sink: Arc<dyn AnalyticsSink> =
        Arc::from(analytics::sink_from_config(&config.analytics));

    let console_bus_receiver = bus_sender.subscribe();
    let catalog_manager_bus_receiver = bus_sender.subscribe();
    let catalog_manager_bus_sender = bus_sender.clone();
    let playlist_manager_bus_receiver = bus_sender.subscribe();
    let playlist_manager_bus_sender = bus_sender.clone();
    let playback_receivers: Vec<(MediaKind, broadcast::Receiver<Message>)> = MediaKind::ALL
        .into_iter()
        .map(|kind| (kind, bus_sender.subscribe()))
        .collect();

    handles.push(thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            console::run_printer(console_bus_receiver, console_snapshot);
        }));
        if let Err(payload) = run_result {
            log::error!(
                "Console printer terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
    }));

    handles.push(thread::spawn(move || {
        let mut catalog_manager = CatalogManager::new(
            remote,
            local,
            catalog_manager_bus_receiver,
            catalog_manager_bus_sender,
        );
        catalog_manager.run();
    }));

    handles.push(thread::spawn(move || {
        let mut playlist_manager = PlaylistManager::new(
            audio_playlists,
            video_playlists,
            playlist_manager_bus_receiver,
            playlist_manager_bus_sender,
        );
        playlist_manager.run();
    }));

    for (kind, playback_bus_receiver) in playback_receivers {
        let playback_bus_sender = bus_sender.clone();
        let engine = SimulatedEngine::new(
            kind,
            bus_sender.clone(),
            &config.engine,
            session_config.audio_mode,
        );
        let session = PlaybackSession::new(
            kind,
            Box::new(engine),
            Box::new(RandomPicker::new()),
            analytics_sink.clone(),
            session_config.autoplay(kind),
        );
        let lifecycle = LifecycleCoordinator::new(session_config.clone(), kind);
        let progress_updates_per_sec = config.playback.progress_updates_per_sec;
        handles.push(thread::spawn(move || {
            let mut playback_manager = PlaybackManager::new(
                session,
                lifecycle,
                playback_bus_receiver,
                playback_bus_sender,
                progress_updates_per_sec,
            );
            playback_manager.run();
        }));
    }

    handles
}
