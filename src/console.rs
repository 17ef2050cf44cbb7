//! Line-oriented driver: maps typed commands onto bus messages and renders
//! bus notifications as text.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::{error, trace, warn};
use tokio::sync::broadcast::Receiver;

use crate::{
    catalog::{Catalog, MediaKind},
    lifecycle::AppState,
    playback::{format_time, PlaybackState, PlaybackStatus},
    protocol::{
        self, CatalogMessage, LifecycleMessage, Message, PlaybackMessage, PlaylistMessage,
    },
};

pub const HELP: &str = "\
commands:
  <audio|video> play <item id>       select an item
  <audio|video> toggle               play/pause
  <audio|video> next | prev | shuffle | repeat
  <audio|video> seek <0.0-1.0>       seek to a fraction of the duration
  reload <audio|video>               reload the catalog
  list <audio|video>                 print the catalog
  status <audio|video>               print the playback state
  playlist <audio|video> show
  playlist <audio|video> create <name>
  playlist <audio|video> delete <name>
  playlist <audio|video> use <name>
  playlist <audio|video> rename <name> | <new name>
  playlist <audio|video> add <name> | <item id>
  playlist <audio|video> remove <name> | <item id>
  background | inactive | foreground
  blur <audio|video> | focus <audio|video> | close <audio|video>
  quit";

#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    Send(Vec<Message>),
    List(MediaKind),
    Status(MediaKind),
    Help,
    Quit,
}

fn parse_kind(token: Option<&str>) -> Result<MediaKind, String> {
    match token {
        Some("audio") | Some("music") => Ok(MediaKind::Audio),
        Some("video") => Ok(MediaKind::Video),
        Some(other) => Err(format!("unknown media kind '{other}'")),
        None => Err("missing media kind".to_string()),
    }
}

fn split_pair(rest: &str) -> Result<(String, String), String> {
    let (left, right) = rest
        .split_once('|')
        .ok_or_else(|| "expected '<name> | <value>'".to_string())?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return Err("expected '<name> | <value>'".to_string());
    }
    Ok((left.to_string(), right.to_string()))
}

/// Text after the first `count` whitespace-separated tokens.
fn remainder(line: &str, count: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..count {
        rest = rest
            .split_once(char::is_whitespace)
            .map(|(_, tail)| tail.trim_start())
            .unwrap_or("");
    }
    rest.trim_end()
}

fn parse_transport(kind: MediaKind, line: &str, verb: Option<&str>) -> Result<ConsoleCommand, String> {
    let message = match verb {
        Some("play") | Some("select") => {
            let item_id = remainder(line, 2);
            if item_id.is_empty() {
                return Err("missing item id".to_string());
            }
            PlaybackMessage::Select {
                kind,
                item_id: item_id.to_string(),
            }
        }
        Some("toggle") | Some("pause") | Some("resume") => PlaybackMessage::TogglePlayPause(kind),
        Some("next") => PlaybackMessage::Next(kind),
        Some("prev") | Some("previous") => PlaybackMessage::Previous(kind),
        Some("shuffle") => PlaybackMessage::Shuffle(kind),
        Some("repeat") => PlaybackMessage::ToggleRepeat(kind),
        Some("seek") => {
            let fraction: f64 = remainder(line, 2)
                .parse()
                .map_err(|_| "seek expects a number between 0 and 1".to_string())?;
            return Ok(ConsoleCommand::Send(vec![
                Message::Playback(PlaybackMessage::SeekStart(kind)),
                Message::Playback(PlaybackMessage::SeekCommit { kind, fraction }),
            ]));
        }
        Some(other) => return Err(format!("unknown transport command '{other}'")),
        None => return Err("missing transport command".to_string()),
    };
    Ok(ConsoleCommand::Send(vec![Message::Playback(message)]))
}

fn parse_playlist(line: &str) -> Result<ConsoleCommand, String> {
    let mut tokens = line.split_whitespace().skip(1);
    let kind = parse_kind(tokens.next())?;
    let verb = tokens.next();
    let rest = remainder(line, 3);
    let require_name = || {
        if rest.is_empty() {
            Err("missing playlist name".to_string())
        } else {
            Ok(rest.to_string())
        }
    };

    let message = match verb {
        Some("show") => PlaylistMessage::RequestSnapshot(kind),
        Some("create") => PlaylistMessage::CreatePlaylist {
            kind,
            name: rest.to_string(),
        },
        Some("delete") => PlaylistMessage::DeletePlaylist {
            kind,
            name: require_name()?,
        },
        Some("use") => PlaylistMessage::SetActive {
            kind,
            name: require_name()?,
        },
        Some("rename") => {
            let (name, new_name) = split_pair(rest)?;
            PlaylistMessage::RenamePlaylist {
                kind,
                name,
                new_name,
            }
        }
        Some("add") => {
            let (playlist, item_id) = split_pair(rest)?;
            PlaylistMessage::AddMember {
                kind,
                playlist,
                item_id,
            }
        }
        Some("remove") => {
            let (playlist, item_id) = split_pair(rest)?;
            PlaylistMessage::RemoveMember {
                kind,
                playlist,
                item_id,
            }
        }
        Some(other) => return Err(format!("unknown playlist command '{other}'")),
        None => return Err("missing playlist command".to_string()),
    };
    Ok(ConsoleCommand::Send(vec![Message::Playlist(message)]))
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Err("empty command".to_string());
    };
    let lifecycle = |message: LifecycleMessage| -> Result<ConsoleCommand, String> {
        Ok(ConsoleCommand::Send(vec![Message::Lifecycle(message)]))
    };

    match head {
        "audio" | "music" | "video" => {
            let kind = parse_kind(Some(head))?;
            parse_transport(kind, line, tokens.next())
        }
        "playlist" => parse_playlist(line),
        "reload" => {
            let kind = parse_kind(tokens.next())?;
            Ok(ConsoleCommand::Send(vec![Message::Catalog(
                CatalogMessage::RequestLoad(kind),
            )]))
        }
        "list" => Ok(ConsoleCommand::List(parse_kind(tokens.next())?)),
        "status" => Ok(ConsoleCommand::Status(parse_kind(tokens.next())?)),
        "background" => lifecycle(LifecycleMessage::AppStateChanged(AppState::Background)),
        "inactive" => lifecycle(LifecycleMessage::AppStateChanged(AppState::Inactive)),
        "foreground" => lifecycle(LifecycleMessage::AppStateChanged(AppState::Active)),
        "blur" => lifecycle(LifecycleMessage::FocusLost(parse_kind(tokens.next())?)),
        "focus" => lifecycle(LifecycleMessage::FocusGained(parse_kind(tokens.next())?)),
        "close" => {
            let kind = parse_kind(tokens.next())?;
            Ok(ConsoleCommand::Send(vec![
                Message::Catalog(CatalogMessage::DiscardPending(kind)),
                Message::Lifecycle(LifecycleMessage::Teardown(kind)),
            ]))
        }
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

/// Latest catalog and playback state per kind, as last seen on the bus.
#[derive(Debug, Default)]
pub struct ConsoleSnapshot {
    catalogs: HashMap<MediaKind, Arc<Catalog>>,
    states: HashMap<MediaKind, PlaybackState>,
}

impl ConsoleSnapshot {
    pub fn render_catalog(&self, kind: MediaKind) -> String {
        let Some(catalog) = self.catalogs.get(&kind) else {
            return format!("{} catalog not loaded yet", kind.label());
        };
        if catalog.is_empty() {
            return format!("{} catalog is empty", kind.label());
        }
        catalog
            .items()
            .iter()
            .map(|item| {
                let duration = item
                    .duration_secs
                    .map(format_time)
                    .unwrap_or_else(|| "-:--".to_string());
                format!("{}  {}  [{}]", item.id, item.title, duration)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render_status(&self, kind: MediaKind) -> String {
        match self.states.get(&kind) {
            Some(state) => render_state(kind, state),
            None => format!("{} idle", kind.label()),
        }
    }
}

pub fn render_state(kind: MediaKind, state: &PlaybackState) -> String {
    let title = state.current_title().unwrap_or("nothing selected");
    let mut line = format!(
        "{} {:?}: {} {}/{} repeat={:?} playlist={}",
        kind.label(),
        state.status,
        title,
        format_time(state.position_secs),
        format_time(state.duration_secs),
        state.repeat_mode,
        state.scope.playlist.name
    );
    if state.status == PlaybackStatus::Error {
        if let Some(err) = &state.last_error {
            line.push_str(&format!(" error={err}"));
        }
    }
    line
}

/// Renders one notification, updating the snapshot. Returns `None` for
/// traffic that is not worth printing.
pub fn render_notification(snapshot: &Mutex<ConsoleSnapshot>, message: Message) -> Option<String> {
    match message {
        Message::Catalog(CatalogMessage::CatalogReady {
            kind,
            catalog,
            failures,
        }) => {
            let mut line = format!("{} catalog: {} items", kind.label(), catalog.len());
            for failure in &failures {
                line.push_str(&format!("\n  source failed: {failure}"));
            }
            if let Ok(mut snapshot) = snapshot.lock() {
                snapshot.catalogs.insert(kind, catalog);
            }
            Some(line)
        }
        Message::Playback(PlaybackMessage::StateChanged { kind, state }) => {
            let mut snapshot = snapshot.lock().ok()?;
            let previous = snapshot.states.insert(kind, (*state).clone());
            // Position ticks are kept for `status` but not echoed.
            let changed = previous.map_or(true, |previous| {
                previous.status != state.status
                    || previous.current_item != state.current_item
                    || previous.repeat_mode != state.repeat_mode
            });
            changed.then(|| render_state(kind, &state))
        }
        Message::Playlist(PlaylistMessage::PlaylistsChanged {
            kind,
            names,
            active,
        }) => {
            let rendered: Vec<String> = names
                .iter()
                .map(|name| {
                    if *name == active {
                        format!("*{name}")
                    } else {
                        name.clone()
                    }
                })
                .collect();
            Some(format!("{} playlists: {}", kind.label(), rendered.join(", ")))
        }
        Message::Playlist(PlaylistMessage::CommandFailed { kind, error }) => {
            Some(format!("{} playlist command failed: {}", kind.label(), error))
        }
        _ => None,
    }
}

/// Prints notifications until shutdown or bus closure.
pub fn run_printer(mut bus_consumer: Receiver<protocol::Message>, snapshot: Arc<Mutex<ConsoleSnapshot>>) {
    loop {
        match bus_consumer.blocking_recv() {
            Ok(Message::Lifecycle(LifecycleMessage::Shutdown)) => break,
            Ok(message) => {
                if let Some(line) = render_notification(&snapshot, message) {
                    println!("{line}");
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Console: bus lagged, skipped {} messages", skipped);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                error!("Console: bus closed");
                break;
            }
        }
    }
    trace!("Console printer stopped");
}
