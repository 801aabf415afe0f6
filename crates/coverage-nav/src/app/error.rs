use super::storage::StorageError;
use coverage_nav_lib::NavError;
use thiserror::Error;

/// Everything that can stop a replay
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Nav(#[from] NavError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX parsing error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No area given and none remembered from a previous run")]
    NoArea,

    #[error("Invalid fix on line {line}: {reason}")]
    InvalidFix { line: usize, reason: String },
}

pub type AppResult<T> = Result<T, AppError>;
