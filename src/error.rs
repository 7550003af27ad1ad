//! Error types for asset I/O and resource cache misuse

use thiserror::Error;

/// Failure reading or writing an asset file
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid asset {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Resource cache lifecycle misuse
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource cache used before start_up")]
    NotInitialized,

    #[error("Resource cache already started")]
    AlreadyInitialized,
}

pub type Result<T, E = AssetError> = std::result::Result<T, E>;
