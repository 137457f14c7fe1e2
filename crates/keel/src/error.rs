use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Host module not available: {0}")]
    ModuleUnavailable(String),

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    #[error("Malformed configuration at {path:?}: {message}")]
    ConfigMalformed { path: PathBuf, message: String },

    #[error("Asset load failed: {0}")]
    AssetLoadFailed(String),

    #[error("Invalid string table '{name}': {message}")]
    TableInvalid { name: String, message: String },

    #[error("Unknown string table: {0}")]
    UnknownTable(String),

    #[error("String entry out of range: {table}[{index}]")]
    EntryOutOfRange { table: String, index: usize },

    #[error("Command already registered: {0}")]
    CommandExists(String),

    #[error("Plugin manifest invalid at {path:?}: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("Subsystem not available: {0}")]
    SubsystemUnavailable(&'static str),

    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
