//! In-memory audio backend.
//!
//! Players record what they were told to do and advance only when
//! `advance` is called. Use for headless hosts and tests; the factory keeps
//! a handle to every player it opened so state can be inspected from
//! outside the manager.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioPlayer, PlayerEvents, PlayerFactory, LOOP_FOREVER};
use crate::error::{CadenzaError, CadenzaResult};
use crate::models::TrackId;

/// Simulated length of every in-memory track unless configured otherwise.
pub const DEFAULT_DURATION_MS: u64 = 180_000;

struct MemoryState {
    playing: bool,
    volume: f32,
    loops: i32,
    position_ms: u64,
    duration_ms: u64,
    prepared: bool,
    play_calls: u32,
    stop_calls: u32,
    released: bool,
}

/// Headless player. Clones share state but only observe: dropping the
/// original marks the player released.
pub struct MemoryPlayer {
    track: TrackId,
    path: PathBuf,
    state: Arc<Mutex<MemoryState>>,
    events: Arc<dyn PlayerEvents>,
    owner: bool,
}

impl MemoryPlayer {
    pub fn new(track: TrackId, path: PathBuf, duration_ms: u64, events: Arc<dyn PlayerEvents>) -> Self {
        Self {
            track,
            path,
            state: Arc::new(Mutex::new(MemoryState {
                playing: false,
                volume: 1.0,
                loops: 0,
                position_ms: 0,
                duration_ms,
                prepared: false,
                play_calls: 0,
                stop_calls: 0,
                released: false,
            })),
            events,
            owner: true,
        }
    }

    pub fn track(&self) -> &TrackId {
        &self.track
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loops(&self) -> i32 {
        self.state.lock().loops
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    pub fn play_calls(&self) -> u32 {
        self.state.lock().play_calls
    }

    pub fn stop_calls(&self) -> u32 {
        self.state.lock().stop_calls
    }

    /// True once the original handle has been dropped.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Move the playhead forward as if `ms` of audio had been rendered.
    /// Handles looping and fires `on_finished` at a natural end.
    pub fn advance(&self, ms: u64) {
        let finished = {
            let mut s = self.state.lock();
            if !s.playing || s.duration_ms == 0 {
                return;
            }
            let mut pos = s.position_ms + ms;
            let mut finished = false;
            while pos >= s.duration_ms {
                if s.loops == LOOP_FOREVER {
                    pos -= s.duration_ms;
                } else if s.loops > 0 {
                    s.loops -= 1;
                    pos -= s.duration_ms;
                } else {
                    s.playing = false;
                    pos = 0;
                    finished = true;
                    break;
                }
            }
            s.position_ms = pos;
            finished
        };
        if finished {
            self.events.on_finished(&self.track, true);
        }
    }

    /// Report a decode failure the way a real backend would.
    pub fn fail_decode(&self, reason: &str) {
        self.events
            .on_decode_error(&self.track, &CadenzaError::Decode(reason.to_string()));
    }
}

impl Clone for MemoryPlayer {
    fn clone(&self) -> Self {
        Self {
            track: self.track.clone(),
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            events: Arc::clone(&self.events),
            owner: false,
        }
    }
}

impl Drop for MemoryPlayer {
    fn drop(&mut self) {
        if self.owner {
            self.state.lock().released = true;
        }
    }
}

impl AudioPlayer for MemoryPlayer {
    fn play(&self) {
        let mut s = self.state.lock();
        s.playing = true;
        s.prepared = true;
        s.play_calls += 1;
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn stop(&self) {
        let mut s = self.state.lock();
        s.playing = false;
        s.prepared = false;
        s.stop_calls += 1;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_loops(&self, loops: i32) {
        self.state.lock().loops = loops;
    }

    fn prepare(&self) {
        self.state.lock().prepared = true;
    }

    fn position_ms(&self) -> u64 {
        self.state.lock().position_ms
    }

    fn set_position_ms(&self, position_ms: u64) {
        let mut s = self.state.lock();
        s.position_ms = if s.duration_ms > 0 {
            position_ms.min(s.duration_ms)
        } else {
            position_ms
        };
    }
}

/// Factory for `MemoryPlayer`s.
pub struct MemoryFactory {
    duration_ms: u64,
    failing: Mutex<HashSet<String>>,
    opened: Mutex<Vec<MemoryPlayer>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::with_duration(DEFAULT_DURATION_MS)
    }

    pub fn with_duration(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            failing: Mutex::new(HashSet::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Make every later `open` of `track` fail as an undecodable file would.
    pub fn fail_on(&self, track: &str) {
        self.failing.lock().insert(track.to_string());
    }

    /// Most recently opened player for `track`.
    pub fn player(&self, track: &str) -> Option<MemoryPlayer> {
        self.opened
            .lock()
            .iter()
            .rev()
            .find(|p| p.track.as_str() == track)
            .cloned()
    }

    /// Players opened for `track` that were still held at the last `open`,
    /// oldest first.
    pub fn opened(&self, track: &str) -> Vec<MemoryPlayer> {
        self.opened
            .lock()
            .iter()
            .filter(|p| p.track.as_str() == track)
            .cloned()
            .collect()
    }

    /// Players currently tracked. Released players are forgotten on the next `open`.
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl Default for MemoryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerFactory for MemoryFactory {
    fn open(
        &self,
        track: &TrackId,
        path: &Path,
        events: Arc<dyn PlayerEvents>,
    ) -> CadenzaResult<Box<dyn AudioPlayer>> {
        if self.failing.lock().contains(track.as_str()) {
            return Err(CadenzaError::Decode(format!(
                "unsupported audio data in {}",
                path.display()
            )));
        }
        let player = MemoryPlayer::new(track.clone(), path.to_path_buf(), self.duration_ms, events);
        let mut opened = self.opened.lock();
        opened.retain(|p| !p.is_released());
        opened.push(player.clone());
        Ok(Box::new(player))
    }
}
