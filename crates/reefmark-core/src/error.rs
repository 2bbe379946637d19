//! Error types for Reefmark.

use thiserror::Error;

/// Main error type for annotation data operations.
#[derive(Error, Debug)]
pub enum ReefError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid RLE: runs cover {actual} pixels, expected {expected}")]
    InvalidRle { expected: usize, actual: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(i32),

    #[error("Category name already exists: {0}")]
    DuplicateCategory(String),

    #[error("Invalid category operation: {0}")]
    InvalidCategory(String),

    #[error("Category {0} is reserved and cannot be removed")]
    ReservedCategory(i32),

    #[error("Mask not found: {0}")]
    MaskNotFound(u32),

    #[error("{0} refused while another operation is running")]
    Busy(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Reefmark operations.
pub type Result<T> = std::result::Result<T, ReefError>;
