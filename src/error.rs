//! Shared error types for training and persistence.

use std::io;

/// Errors surfaced by providers, the sample cache, training, and
/// checkpoint persistence.
///
/// Invalid-input and not-found errors abort the per-tree training that hit
/// them. Checkpoint I/O errors are logged by the trainer and training
/// continues (checkpoints are best-effort). Out-of-image pixel reads are
/// not an error anywhere: they are defined to read as 0.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("data grid is {data_width}x{data_height} but label grid is {label_width}x{label_height}")]
    ShapeMismatch {
        data_width: usize,
        data_height: usize,
        label_width: usize,
        label_height: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("image index {index} out of range (provider holds {count} images)")]
    ImageNotFound { index: usize, count: usize },

    #[error("split point index {index} out of range (candidate set holds {total} split points)")]
    SplitPointNotFound { index: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("failed to decode image {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
