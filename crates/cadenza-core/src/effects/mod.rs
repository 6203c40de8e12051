//! Audio primitive seam.
//!
//! The manager drives players only through these traits. The native
//! backend (symphonia + cpal) and the in-memory backend both implement
//! them. All methods take `&self`; players manage their own concurrency.

use std::path::Path;
use std::sync::Arc;

use crate::error::{CadenzaError, CadenzaResult};
use crate::models::TrackId;

/// Loop count meaning "repeat forever".
pub const LOOP_FOREVER: i32 = -1;

/// One prepared audio resource bound to a single asset.
pub trait AudioPlayer: Send {
    /// Start or continue from the current position.
    fn play(&self);
    /// Halt output, keeping the position.
    fn pause(&self);
    /// Halt output and release output resources. Keeps the position;
    /// callers seek explicitly.
    fn stop(&self);
    fn is_playing(&self) -> bool;
    fn set_volume(&self, volume: f32);
    fn volume(&self) -> f32;
    /// Extra repetitions after the first pass. `LOOP_FOREVER` never ends.
    fn set_loops(&self, loops: i32);
    /// Pre-buffer so the next `play` starts without delay.
    fn prepare(&self);
    fn position_ms(&self) -> u64;
    fn set_position_ms(&self, position_ms: u64);
}

/// Listener for asynchronous player notifications.
///
/// Called from whatever thread the backend uses; implementations must not
/// assume the caller's thread.
pub trait PlayerEvents: Send + Sync {
    /// The track reached its natural end. Never called for pause or stop.
    fn on_finished(&self, track: &TrackId, successfully: bool);
    fn on_decode_error(&self, track: &TrackId, error: &CadenzaError);
}

/// Creates players for resolved asset files.
pub trait PlayerFactory: Send + Sync {
    fn open(
        &self,
        track: &TrackId,
        path: &Path,
        events: Arc<dyn PlayerEvents>,
    ) -> CadenzaResult<Box<dyn AudioPlayer>>;
}

/// Default listener: notifications are advisory, so they are only logged.
pub struct LogEvents;

impl PlayerEvents for LogEvents {
    fn on_finished(&self, track: &TrackId, successfully: bool) {
        log::info!("cadenza: player '{}' did finish playing ({})", track, successfully);
    }

    fn on_decode_error(&self, track: &TrackId, error: &CadenzaError) {
        log::error!("cadenza: player '{}' decode error: {}", track, error);
    }
}

#[cfg(feature = "native")]
pub mod audio;
pub mod memory;
