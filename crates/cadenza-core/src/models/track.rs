//! Track identifiers and the current selection.
//!
//! A `TrackId` is the base-name of a bundled sound file. "Nothing playing"
//! is its own variant of `Selection`, so no name is reserved.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CadenzaError, CadenzaResult};

/// Name of a registered sound asset. Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackId(String);

impl TrackId {
    /// Empty names are rejected; every other string is a valid asset name.
    pub fn new(name: impl Into<String>) -> CadenzaResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CadenzaError::InvalidTrackId(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TrackId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrackId {
    type Error = CadenzaError;

    fn try_from(value: String) -> CadenzaResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TrackId {
    type Error = CadenzaError;

    fn try_from(value: &str) -> CadenzaResult<Self> {
        Self::new(value)
    }
}

impl From<TrackId> for String {
    fn from(id: TrackId) -> Self {
        id.0
    }
}

/// What the manager has selected to play.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Selection {
    #[default]
    Nothing,
    Track(TrackId),
}

impl Selection {
    pub fn is(&self, id: &str) -> bool {
        matches!(self, Selection::Track(t) if t.as_str() == id)
    }

    pub fn track(&self) -> Option<&TrackId> {
        match self {
            Selection::Nothing => None,
            Selection::Track(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_rejected() {
        assert!(TrackId::new("").is_err());
        assert!(TrackId::try_from("").is_err());
    }

    #[test]
    fn none_is_an_ordinary_name() {
        let id = TrackId::new("None").unwrap();
        let selection = Selection::Track(id);
        assert!(selection.is("None"));
        assert_ne!(selection, Selection::Nothing);
    }

    #[test]
    fn selection_matches_exact_name_only() {
        let selection = Selection::Track(TrackId::new("menu").unwrap());
        assert!(selection.is("menu"));
        assert!(!selection.is("Menu"));
        assert!(!Selection::Nothing.is("menu"));
    }

    #[test]
    fn track_id_serializes_as_plain_string() {
        let id = TrackId::new("game").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), "game");
        let back: TrackId = serde_json::from_value(serde_json::json!("game")).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<TrackId>(serde_json::json!("")).is_err());
    }
}
