//! # Codec Error Types

use thiserror::Error;

/// Errors raised while packing a scale vector.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CodecError {
    /// A component was negative, NaN or infinite.
    #[error("scale component {axis} is not a finite non-negative number: {value}")]
    InvalidComponent {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// The offending value.
        value: f32,
    },

    /// The largest component exceeds what the packed float can represent.
    #[error("scale magnitude {magnitude} exceeds the packable maximum of {limit}")]
    PrecisionOverflow {
        /// Ceiling of the largest component.
        magnitude: f32,
        /// The representable ceiling.
        limit: f32,
    },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
