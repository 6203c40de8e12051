//! Error types for backends and stores.
//!
//! The manager absorbs these at its boundary: a failed track is skipped
//! and logged, a failed preference write is logged. Only the collaborator
//! traits surface them directly.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenzaError {
    #[error("no asset found for track '{0}'")]
    AssetNotFound(String),

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("audio output error: {0}")]
    Output(String),

    #[error("preference store error: {0}")]
    Store(String),

    #[error("invalid track id: {0:?}")]
    InvalidTrackId(String),
}

pub type CadenzaResult<T> = Result<T, CadenzaError>;

#[cfg(feature = "native")]
impl From<symphonia::core::errors::Error> for CadenzaError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        CadenzaError::Decode(e.to_string())
    }
}
