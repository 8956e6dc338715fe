//! Error types for amount arithmetic

use thiserror::Error;

/// Result type for amount arithmetic
pub type Result<T> = std::result::Result<T, AmountError>;

/// Amount arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Operands belong to different brands
    #[error("Brand mismatch: expected {expected}, got {actual}")]
    BrandMismatch { expected: String, actual: String },

    /// Addition overflowed, or set elements overlapped
    #[error("Amount addition failed: {left} + {right}")]
    Overflow { left: String, right: String },

    /// Subtraction would go below empty
    #[error("Amount underflow: {left} - {right}")]
    Underflow { left: String, right: String },
}
