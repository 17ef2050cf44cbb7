mod analytics;
mod app_bootstrap;
mod catalog;
mod catalog_manager;
mod config;
mod console;
mod engine;
mod error;
mod lifecycle;
mod media_file_discovery;
mod playback;
mod playback_manager;
mod playlist;
mod playlist_manager;
mod protocol;
mod session_config;
mod storage;
#[cfg(test)]
mod test_support;

use std::{
    io::BufRead,
    path::Path,
    sync::{Arc, Mutex},
};

use app_bootstrap::services::{spawn_background_services, BackgroundServicesConfig};
use catalog::MediaKind;
use config::Config;
use console::{ConsoleCommand, ConsoleSnapshot};
use log::{debug, info, warn};
use playlist::PlaylistStore;
use protocol::{CatalogMessage, LifecycleMessage, Message};
use session_config::SessionConfig;
use storage::{KeyValueStore, PersistenceWriter, SqliteKeyValueStore};
use tokio::sync::broadcast;

fn open_storage(config: &Config) -> Result<SqliteKeyValueStore, error::StorageError> {
    let database_file = config.storage.database_file.trim();
    let opened = if database_file.is_empty() {
        SqliteKeyValueStore::open_default()
    } else {
        SqliteKeyValueStore::open(Path::new(database_file))
    };
    match opened {
        Ok(store) => Ok(store),
        Err(err) => {
            warn!("Failed to open state database, playlists will not survive restart: {}", err);
            SqliteKeyValueStore::new_in_memory()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = match dirs::config_dir() {
        Some(config_dir) => config::load_or_create(&config_dir.join("mediadeck.toml")),
        None => {
            warn!("No config directory available, using default config");
            Config::default()
        }
    };
    let level = config
        .logging
        .level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            warn!("Unknown log level '{}', using debug", config.logging.level);
            log::LevelFilter::Debug
        });
    log::set_max_level(level);
    debug!("Loaded config: {:?}", config);

    let session_config = Arc::new(SessionConfig::from_config(&config));

    let storage: Arc<dyn KeyValueStore> = Arc::new(open_storage(&config)?);
    let writer = PersistenceWriter::spawn(storage.clone());
    let audio_playlists = PlaylistStore::restore(
        storage.as_ref(),
        &config.storage.audio_playlists_key,
        Some(writer.clone()),
    );
    let video_playlists = PlaylistStore::restore(
        storage.as_ref(),
        &config.storage.video_playlists_key,
        Some(writer.clone()),
    );

    let (bus_sender, _) = broadcast::channel(1024);
    let console_snapshot = Arc::new(Mutex::new(ConsoleSnapshot::default()));
    let services = spawn_background_services(BackgroundServicesConfig {
        bus_sender: bus_sender.clone(),
        config,
        session_config,
        audio_playlists,
        video_playlists,
        console_snapshot: console_snapshot.clone(),
    });

    for kind in MediaKind::ALL {
        let _ = bus_sender.send(Message::Catalog(CatalogMessage::RequestLoad(kind)));
    }
    info!("mediadeck ready, type 'help' for commands");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match console::parse_command(&line) {
            Ok(ConsoleCommand::Send(messages)) => {
                for message in messages {
                    let _ = bus_sender.send(message);
                }
            }
            Ok(ConsoleCommand::List(kind)) => {
                let snapshot = console_snapshot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                println!("{}", snapshot.render_catalog(kind));
            }
            Ok(ConsoleCommand::Status(kind)) => {
                let snapshot = console_snapshot
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                println!("{}", snapshot.render_status(kind));
            }
            Ok(ConsoleCommand::Help) => println!("{}", console::HELP),
            Ok(ConsoleCommand::Quit) => break,
            Err(message) => println!("{message}"),
        }
    }

    info!("Shutting down");
    let _ = bus_sender.send(Message::Lifecycle(LifecycleMessage::Shutdown));
    for handle in services {
        if handle.join().is_err() {
            warn!("A service thread panicked during shutdown");
        }
    }
    writer.flush();
    Ok(())
}
