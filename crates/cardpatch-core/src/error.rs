use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Payload not located: {0}")]
    PayloadNotLocated(String),

    #[error("Invalid range: offset {offset:#x} + length {len} exceeds blob of {blob_len} bytes")]
    InvalidRange {
        offset: usize,
        len: usize,
        blob_len: usize,
    },

    #[error("Entry index {0} out of range")]
    EntryOutOfRange(usize),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::InputMissing(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Errors caused by a container this build cannot read or write
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_) | Error::Compression(_))
    }
}
