//! Serializable views of manager state, for hosts that poll.

use serde::Serialize;

use super::track::{Selection, TrackId};

/// Point-in-time copy of one registered player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub playing: bool,
    pub volume: f32,
    pub position_ms: u64,
}

/// Point-in-time copy of the whole manager. Tracks are sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSnapshot {
    pub selection: Selection,
    pub volume: f32,
    pub paused: bool,
    pub muted: bool,
    pub tracks: Vec<TrackSnapshot>,
}

impl ManagerSnapshot {
    pub fn track(&self, id: &str) -> Option<&TrackSnapshot> {
        self.tracks.iter().find(|t| t.id.as_str() == id)
    }

    /// Ids of the players currently producing sound.
    pub fn audible(&self) -> Vec<&str> {
        self.tracks
            .iter()
            .filter(|t| t.playing)
            .map(|t| t.id.as_str())
            .collect()
    }
}

/// Outcome of one `setup` call. Informational only: setup never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetupReport {
    pub loaded: Vec<TrackId>,
    /// No file found under any supported extension.
    pub missing: Vec<TrackId>,
    /// File found but the player could not be opened.
    pub failed: Vec<(TrackId, String)>,
}

impl SetupReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}
