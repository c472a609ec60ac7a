//! Error types for voxel cube operations

use crate::types::Axis;
use thiserror::Error;

/// Main error type for voxel cube operations
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Slice index {index} is out of bounds for axis {axis} (size {len})")]
    OutOfRange { axis: Axis, index: usize, len: usize },

    #[error("{0} is not a valid voxel byte width (expected 1, 2 or 4)")]
    InvalidVoxelWidth(u8),

    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    #[error("Failed to fetch tile {path}: {reason}")]
    TileFetch { path: String, reason: String },

    #[error("Tile {path} failed {attempts} times, giving up: {last}")]
    RetryBudgetExceeded {
        path: String,
        attempts: u32,
        last: Box<VolumeError>,
    },

    #[error("Load aborted")]
    Aborted,

    #[error("Raster decode error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for voxel cube operations
pub type Result<T> = std::result::Result<T, VolumeError>;

impl VolumeError {
    /// Whether a tile that failed with this error may succeed on another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VolumeError::TileFetch { .. }
                | VolumeError::Decode(_)
                | VolumeError::Network(_)
                | VolumeError::Io(_)
        )
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for VolumeError {
    fn from(err: image::ImageError) -> Self {
        VolumeError::Decode(err.to_string())
    }
}
