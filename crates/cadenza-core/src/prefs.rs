//! Persisted boolean preferences.
//!
//! The only persisted value is the mute flag, but the store is keyed so
//! hosts can share it. Missing keys read as `false`.

use std::collections::HashMap;

use nine_s_shell::Shell;
use parking_lot::Mutex;

use crate::error::{CadenzaError, CadenzaResult};
use crate::paths;

pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool) -> CadenzaResult<()>;
}

/// Preferences stored as 9S scrolls at `/cadenza/settings/<key>`.
///
/// The shell is rooted at `NINE_S_ROOT`, so values survive restarts.
pub struct ShellPreferences {
    shell: Shell,
}

impl ShellPreferences {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    /// Open a shell for `app` and wrap it.
    pub fn open(app: &str) -> CadenzaResult<Self> {
        Shell::open(app, &[])
            .map(Self::new)
            .map_err(|e| CadenzaError::Store(e.to_string()))
    }

    /// The underlying shell, for hosts that keep other scrolls next to ours.
    pub fn shell(&self) -> &Shell {
        &self.shell
    }
}

impl PreferenceStore for ShellPreferences {
    fn get_bool(&self, key: &str) -> bool {
        match self.shell.get(&paths::settings_path(key)) {
            Ok(Some(scroll)) => scroll.data["value"].as_bool().unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                log::warn!("cadenza: reading preference '{}' failed: {}", key, e);
                false
            }
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> CadenzaResult<()> {
        self.shell
            .put(&paths::settings_path(key), serde_json::json!({ "value": value }))
            .map(|_| ())
            .map_err(|e| CadenzaError::Store(e.to_string()))
    }
}

/// Process-local preferences. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, bool>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get_bool(&self, key: &str) -> bool {
        self.values.lock().get(key).copied().unwrap_or(false)
    }

    fn set_bool(&self, key: &str, value: bool) -> CadenzaResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}
