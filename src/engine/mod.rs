//! Media engine seam: the opaque decoder/renderer the sessions drive.

pub mod simulated;

use log::{debug, warn};

use crate::error::EngineError;

pub use simulated::SimulatedEngine;

/// Snapshot reported by the engine for one loaded handle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineStatus {
    pub handle_id: u64,
    pub is_loaded: bool,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub did_just_finish: bool,
}

/// Creates playback handles. Status arrives asynchronously on the bus.
pub trait MediaEngine: Send {
    fn load(&mut self, uri: &str, autoplay: bool) -> Result<Box<dyn EngineHandle>, EngineError>;
}

/// One loaded media resource.
pub trait EngineHandle: Send {
    fn id(&self) -> u64;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    fn unload(&mut self) -> Result<(), EngineError>;
    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError>;
    /// Restart from position zero and play.
    fn replay(&mut self) -> Result<(), EngineError>;
}

/// Owns the session's single engine handle and releases it on every exit path.
pub struct ActiveHandle {
    handle: Box<dyn EngineHandle>,
    released: bool,
}

impl ActiveHandle {
    pub fn new(handle: Box<dyn EngineHandle>) -> Self {
        Self {
            handle,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    pub fn handle_mut(&mut self) -> &mut dyn EngineHandle {
        self.handle.as_mut()
    }

    /// Stops and unloads. Errors are logged; the handle counts as released regardless.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let handle_id = self.handle.id();
        if let Err(err) = self.handle.stop() {
            warn!("Engine stop failed. handle={} error={}", handle_id, err);
        }
        if let Err(err) = self.handle.unload() {
            warn!("Engine unload failed. handle={} error={}", handle_id, err);
        }
        debug!("Released engine handle {}", handle_id);
    }
}

impl Drop for ActiveHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}
