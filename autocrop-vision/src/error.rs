use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid image format in {}: {reason}", .path.display())]
    InvalidFormat { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to write {}: {reason}", .path.display())]
    WriteFailed { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("face detection timed out after {0:?}")]
    Timeout(Duration),

    #[error("face detector unavailable: {0}")]
    Unavailable(String),
}
