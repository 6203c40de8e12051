//! cadenza-core — single-track background music for apps and games.
//!
//! One manager owns a prepared, loop-forever player per sound asset and
//! keeps at most one of them audible. Mute is persisted; everything else
//! lives for the process.
//!
//! # Architecture
//!
//! ```text
//! Layer 0: Collaborators (AudioPlayer, AssetLocator, PreferenceStore)
//! Layer 1: Backends (native symphonia + cpal, in-memory, 9S preferences)
//! Layer 2: MusicManager (selection, pause, volume, mute)
//! Layer 3: Hosts (C FFI and CLI send commands, poll snapshots)
//! ```

pub mod assets;
pub mod effects;
pub mod error;
pub mod manager;
pub mod models;
pub mod paths;
pub mod prefs;

pub use error::{CadenzaError, CadenzaResult};
pub use manager::MusicManager;
pub use models::*;
