//! MusicManager — single-track background music over prepared players.
//!
//! Owns one player per registered track and guarantees that at most one is
//! audible. Every transition runs under one mutex, so redundant or
//! interleaved calls from several threads leave the state consistent.
//!
//! ```text
//! Nothing ──play(a)──▶ Track(a) ──play(b)──▶ Track(b)
//!    ▲                    │ pause/resume        │
//!    └──────── stop_and_reset_all ◀─────────────┘
//! ```
//!
//! Mute and volume are orthogonal to the selection and apply in any state.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::assets::{resolve_asset, AssetLocator};
use crate::effects::{AudioPlayer, LogEvents, PlayerEvents, PlayerFactory, LOOP_FOREVER};
use crate::error::CadenzaError;
use crate::models::{ManagerSnapshot, MusicCommand, Selection, SetupReport, TrackId, TrackSnapshot};
use crate::paths;
use crate::prefs::PreferenceStore;

/// Volume applied when nothing has been set, and after `stop_and_reset_all`.
pub const DEFAULT_VOLUME: f32 = 1.0;

struct ManagerState {
    players: BTreeMap<TrackId, Box<dyn AudioPlayer>>,
    current: Selection,
    volume: f32,
    paused: bool,
}

/// The background music manager. Share it with `Arc`; every method takes `&self`.
pub struct MusicManager {
    factory: Arc<dyn PlayerFactory>,
    locator: Arc<dyn AssetLocator>,
    prefs: Arc<dyn PreferenceStore>,
    events: Arc<dyn PlayerEvents>,
    state: Mutex<ManagerState>,
}

impl MusicManager {
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        locator: Arc<dyn AssetLocator>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            factory,
            locator,
            prefs,
            events: Arc::new(LogEvents),
            state: Mutex::new(ManagerState {
                players: BTreeMap::new(),
                current: Selection::Nothing,
                volume: DEFAULT_VOLUME,
                paused: false,
            }),
        }
    }

    /// Replace the listener handed to players opened from now on.
    pub fn with_events(mut self, events: Arc<dyn PlayerEvents>) -> Self {
        self.events = events;
        self
    }

    /// Boot with the native (symphonia + cpal) backend over a sound directory.
    #[cfg(feature = "native")]
    pub fn native(assets_dir: impl Into<std::path::PathBuf>, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self::new(
            Arc::new(crate::effects::audio::NativeFactory::new()),
            Arc::new(crate::assets::DirLocator::new(assets_dir)),
            prefs,
        )
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Prepare a player for each track. Tracks with no asset, or whose
    /// asset cannot be opened, are skipped and logged; the report lists them.
    ///
    /// Registering an id that is already present stops and releases the old
    /// player before the new one takes its slot.
    pub fn setup<I, S>(&self, tracks: I) -> SetupReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = SetupReport::default();

        for name in tracks {
            let name = name.as_ref();
            let id = match TrackId::new(name) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("cadenza: skipping track: {}", e);
                    continue;
                }
            };

            let Some(path) = resolve_asset(&*self.locator, name) else {
                log::warn!("cadenza: {}", CadenzaError::AssetNotFound(id.to_string()));
                report.missing.push(id);
                continue;
            };

            // Open outside the lock: native players decode the whole file here
            let player = match self.factory.open(&id, &path, Arc::clone(&self.events)) {
                Ok(player) => player,
                Err(e) => {
                    log::warn!("cadenza: failed to open '{}': {}", id, e);
                    report.failed.push((id, e.to_string()));
                    continue;
                }
            };

            let mut state = self.state.lock();
            let muted = self.is_muted();
            load_default_properties(&*player, muted);
            if let Some(old) = state.players.remove(&id) {
                log::debug!("cadenza: replacing player for '{}'", id);
                old.stop();
            }
            if state.current.is(name) && !state.paused {
                player.set_volume(if muted { 0.0 } else { state.volume });
                player.play();
            }
            state.players.insert(id.clone(), player);
            drop(state);

            log::info!("cadenza: loaded '{}' from {}", id, path.display());
            report.loaded.push(id);
        }

        report
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Select `id` and, unless paused, make it the only audible track.
    ///
    /// Does nothing if `id` is already selected or not registered. The
    /// track continues from wherever it was last paused.
    pub fn play(&self, id: &str) {
        let mut state = self.state.lock();
        if state.current.is(id) {
            return;
        }
        let Some(key) = state.players.get_key_value(id).map(|(k, _)| k.clone()) else {
            return;
        };

        state.current = Selection::Track(key);
        if state.paused {
            log::debug!("cadenza: selected '{}' while paused", id);
            return;
        }

        let volume = if self.is_muted() { 0.0 } else { state.volume };
        for (track, player) in &state.players {
            if track.as_str() != id {
                player.pause();
            }
        }
        if let Some(player) = state.players.get(id) {
            player.set_volume(volume);
            player.play();
        }
        log::debug!("cadenza: playing '{}'", id);
    }

    /// Pause every track. The selection is kept for `resume`.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        state.paused = true;
        for player in state.players.values() {
            player.pause();
        }
    }

    /// Restart the selected track if it is not already playing.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        state.paused = false;
        let Some(current) = state.current.track() else {
            return;
        };
        if let Some(player) = state.players.get(current) {
            if !player.is_playing() {
                player.play();
            }
        }
    }

    /// Deselect, reset the volume, and rewind and stop every track.
    /// Pause and mute are left as they are.
    pub fn stop_and_reset_all(&self) {
        let mut state = self.state.lock();
        let muted = self.is_muted();
        state.current = Selection::Nothing;
        state.volume = DEFAULT_VOLUME;
        for player in state.players.values() {
            player.stop();
            player.set_position_ms(0);
            load_default_properties(&**player, muted);
        }
    }

    // -----------------------------------------------------------------------
    // Volume & mute
    // -----------------------------------------------------------------------

    /// Set the volume of every registered track, active or not.
    ///
    /// Ignored while muted, and for non-finite values. Clamped to `0.0..=1.0`.
    pub fn set_volume(&self, value: f32) {
        if !value.is_finite() {
            return;
        }
        let mut state = self.state.lock();
        if self.is_muted() {
            return;
        }
        let value = value.clamp(0.0, 1.0);
        state.volume = value;
        for player in state.players.values() {
            player.set_volume(value);
        }
    }

    pub fn reset_volume(&self) {
        self.set_volume(DEFAULT_VOLUME);
    }

    /// Read straight from the preference store on every call.
    ///
    /// Transitions read the flag only while holding the state lock, so a
    /// concurrent `set_muted` lands entirely before or after them.
    pub fn is_muted(&self) -> bool {
        self.prefs.get_bool(paths::MUTED_KEY)
    }

    /// Persist the mute flag and apply it to every track. Unmuting restores
    /// the stored volume.
    pub fn set_muted(&self, muted: bool) {
        let state = self.state.lock();
        if let Err(e) = self.prefs.set_bool(paths::MUTED_KEY, muted) {
            log::warn!("cadenza: persisting mute flag failed: {}", e);
        }
        let volume = if muted { 0.0 } else { state.volume };
        for player in state.players.values() {
            player.set_volume(volume);
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn apply(&self, cmd: MusicCommand) {
        match cmd {
            MusicCommand::Play { ref id } => self.play(id),
            MusicCommand::SetVolume { volume } => self.set_volume(volume),
            MusicCommand::ResetVolume => self.reset_volume(),
            MusicCommand::Pause => self.pause(),
            MusicCommand::Resume => self.resume(),
            MusicCommand::Stop => self.stop_and_reset_all(),
            MusicCommand::Mute { muted } => self.set_muted(muted),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn currently_playing(&self) -> Option<TrackId> {
        self.state.lock().current.track().cloned()
    }

    pub fn selection(&self) -> Selection {
        self.state.lock().current.clone()
    }

    /// Stored volume level. Unaffected by mute.
    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().players.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.state.lock().players.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        let state = self.state.lock();
        let muted = self.is_muted();
        ManagerSnapshot {
            selection: state.current.clone(),
            volume: state.volume,
            paused: state.paused,
            muted,
            tracks: state
                .players
                .iter()
                .map(|(id, player)| TrackSnapshot {
                    id: id.clone(),
                    playing: player.is_playing(),
                    volume: player.volume(),
                    position_ms: player.position_ms(),
                })
                .collect(),
        }
    }
}

/// Volume 0 when muted else full, loop forever, pre-buffer.
fn load_default_properties(player: &dyn AudioPlayer, muted: bool) {
    player.set_volume(if muted { 0.0 } else { DEFAULT_VOLUME });
    player.set_loops(LOOP_FOREVER);
    player.prepare();
}
