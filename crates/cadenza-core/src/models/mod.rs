//! Cadenza data models.
//!
//! Types exist where Rust type safety genuinely helps: a validated track
//! name, a sum type for "what is selected", a tagged command enum for
//! dispatch, and serializable snapshots for hosts.

pub mod command;
pub mod snapshot;
pub mod track;

pub use command::MusicCommand;
pub use snapshot::{ManagerSnapshot, SetupReport, TrackSnapshot};
pub use track::{Selection, TrackId};
