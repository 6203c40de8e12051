//! Manager commands.
//!
//! MusicCommand is a tagged enum so hosts (FFI, CLI) can send one JSON
//! shape and have it dispatched through `MusicManager::apply`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MusicCommand {
    Play { id: String },
    SetVolume { volume: f32 },
    ResetVolume,
    Pause,
    Resume,
    Stop,
    Mute { muted: bool },
}

impl MusicCommand {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }
}
