//! Error types for civic

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Issue already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Issue {0} was modified concurrently, reload and retry")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// Input was rejected before anything was written
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::InvalidStatus(_) | Error::InvalidLocation(_)
        )
    }
}
