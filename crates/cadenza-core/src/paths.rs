//! Cadenza path conventions over 9S.
//!
//! Pure functions mapping preference keys to scroll paths.

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const SETTINGS_PREFIX: &str = "/cadenza/settings";

pub fn settings_path(key: &str) -> String {
    format!("{}/{}", SETTINGS_PREFIX, key)
}

/// Preference key of the persisted mute flag.
pub const MUTED_KEY: &str = "muted";

