//! Clock-driven engine used by the headless build. It decodes nothing: each
//! handle advances a position counter on its own thread and reports status on
//! the bus the way a platform player reports its callbacks.

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use tokio::sync::broadcast::Sender;

use super::{EngineHandle, EngineStatus, MediaEngine};
use crate::{
    catalog::{local_source::probe_duration_secs, MediaKind},
    config::EngineConfig,
    error::EngineError,
    protocol::{EngineEvent, Message},
    session_config::AudioMode,
};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Clock {
    position_ms: u64,
    duration_ms: u64,
    playing: bool,
}

pub struct SimulatedEngine {
    kind: MediaKind,
    bus_sender: Sender<Message>,
    tick_interval: Duration,
    fallback_duration_ms: u64,
}

impl SimulatedEngine {
    pub fn new(
        kind: MediaKind,
        bus_sender: Sender<Message>,
        config: &EngineConfig,
        audio_mode: AudioMode,
    ) -> Self {
        info!(
            "Simulated {} engine ready: background={} silent_mode={} interruption={:?}",
            kind.label(),
            audio_mode.stays_active_in_background,
            audio_mode.plays_in_silent_mode,
            audio_mode.interruption_mode
        );
        Self {
            kind,
            bus_sender,
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
            fallback_duration_ms: config.fallback_duration_secs.saturating_mul(1000),
        }
    }

    fn resolve_duration_ms(&self, uri: &str) -> Result<u64, EngineError> {
        if let Some(path) = uri.strip_prefix("file://") {
            let path = Path::new(path);
            if !path.exists() {
                return Err(EngineError::new(format!("file not found: {}", path.display())));
            }
            return Ok(probe_duration_secs(path)
                .map(|secs| (secs * 1000.0) as u64)
                .unwrap_or(self.fallback_duration_ms));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            return Ok(self.fallback_duration_ms);
        }
        Err(EngineError::new(format!("unsupported uri: '{uri}'")))
    }
}

impl MediaEngine for SimulatedEngine {
    fn load(&mut self, uri: &str, autoplay: bool) -> Result<Box<dyn EngineHandle>, EngineError> {
        if uri.trim().is_empty() {
            return Err(EngineError::new("empty media uri"));
        }
        let duration_ms = self.resolve_duration_ms(uri)?;
        let handle_id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Simulated {} engine loaded handle={} uri={} duration_ms={}",
            self.kind.label(),
            handle_id,
            uri,
            duration_ms
        );

        let handle = SimulatedHandle {
            id: handle_id,
            kind: self.kind,
            bus_sender: self.bus_sender.clone(),
            clock: Arc::new(Mutex::new(Clock {
                position_ms: 0,
                duration_ms,
                playing: autoplay,
            })),
            loaded: Arc::new(AtomicBool::new(true)),
        };
        handle.spawn_ticker(self.tick_interval);
        handle.publish(false);
        Ok(Box::new(handle))
    }
}

struct SimulatedHandle {
    id: u64,
    kind: MediaKind,
    bus_sender: Sender<Message>,
    clock: Arc<Mutex<Clock>>,
    loaded: Arc<AtomicBool>,
}

fn status_of(handle_id: u64, clock: &Clock, did_just_finish: bool) -> EngineStatus {
    EngineStatus {
        handle_id,
        is_loaded: true,
        is_playing: clock.playing,
        position_ms: clock.position_ms,
        duration_ms: Some(clock.duration_ms),
        did_just_finish,
    }
}

impl SimulatedHandle {
    fn spawn_ticker(&self, tick_interval: Duration) {
        let handle_id = self.id;
        let kind = self.kind;
        let clock = self.clock.clone();
        let loaded = self.loaded.clone();
        let bus_sender = self.bus_sender.clone();
        let tick_ms = tick_interval.as_millis() as u64;

        let spawn_result = thread::Builder::new()
            .name(format!("engine-{}-{}", kind.label(), handle_id))
            .spawn(move || loop {
                thread::sleep(tick_interval);
                if !loaded.load(Ordering::Acquire) {
                    break;
                }
                let status = {
                    let Ok(mut clock) = clock.lock() else {
                        break;
                    };
                    if !clock.playing {
                        continue;
                    }
                    clock.position_ms = (clock.position_ms + tick_ms).min(clock.duration_ms);
                    let finished = clock.position_ms >= clock.duration_ms;
                    if finished {
                        clock.playing = false;
                    }
                    status_of(handle_id, &clock, finished)
                };
                let _ = bus_sender.send(Message::Engine(EngineEvent::Status { kind, status }));
            });
        if let Err(err) = spawn_result {
            warn!("Failed to spawn engine ticker for handle {}: {}", handle_id, err);
        }
    }

    fn with_clock<R>(&self, apply: impl FnOnce(&mut Clock) -> R) -> Result<R, EngineError> {
        if !self.loaded.load(Ordering::Acquire) {
            return Err(EngineError::new(format!("handle {} is unloaded", self.id)));
        }
        let mut clock = self
            .clock
            .lock()
            .map_err(|_| EngineError::new("engine clock poisoned"))?;
        Ok(apply(&mut clock))
    }

    fn publish(&self, did_just_finish: bool) {
        let Ok(clock) = self.clock.lock() else {
            return;
        };
        let status = status_of(self.id, &clock, did_just_finish);
        drop(clock);
        let _ = self.bus_sender.send(Message::Engine(EngineEvent::Status {
            kind: self.kind,
            status,
        }));
    }
}

impl EngineHandle for SimulatedHandle {
    fn id(&self) -> u64 {
        self.id
    }

    fn play(&mut self) -> Result<(), EngineError> {
        self.with_clock(|clock| {
            if clock.position_ms >= clock.duration_ms {
                clock.position_ms = 0;
            }
            clock.playing = true;
        })?;
        self.publish(false);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.with_clock(|clock| clock.playing = false)?;
        self.publish(false);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.with_clock(|clock| {
            clock.playing = false;
            clock.position_ms = 0;
        })
    }

    fn unload(&mut self) -> Result<(), EngineError> {
        self.loaded.store(false, Ordering::Release);
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.with_clock(|clock| clock.position_ms = position_ms.min(clock.duration_ms))?;
        self.publish(false);
        Ok(())
    }

    fn replay(&mut self) -> Result<(), EngineError> {
        self.with_clock(|clock| {
            clock.position_ms = 0;
            clock.playing = true;
        })?;
        self.publish(false);
        Ok(())
    }
}
