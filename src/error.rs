//! Application-level errors.

use std::path::PathBuf;
use sterm_serial::serial::SerialError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state file {path}: {message}")]
    Storage { path: PathBuf, message: String },

    #[error("{0}")]
    Usage(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
