//! Error types for trackview-core.

use thiserror::Error;

/// The main error type for core trackview operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A mesh part referenced a parent that does not exist.
    #[error("mesh part {0} does not exist")]
    PartNotFound(usize),

    /// A mesh was built without any vertex data.
    #[error("mesh has no vertices")]
    EmptyMesh,

    /// Position and normal buffers disagree in length.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A draw range points past the end of the vertex buffers.
    #[error("draw range {first}..{end} exceeds {len} vertices")]
    DrawRangeOutOfBounds { first: u32, end: u64, len: usize },

    /// Option values that cannot produce a working viewer.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for core trackview operations.
pub type Result<T> = std::result::Result<T, CoreError>;
