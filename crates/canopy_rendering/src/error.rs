//! # Resolver Error Types
//!
//! Setup-time validation only. Per-frame work has no recoverable failures.

use thiserror::Error;

/// Errors raised while building a [`crate::VisibilityResolver`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolverError {
    /// Mesh metadata declares no LOD levels.
    #[error("mesh has no LOD levels")]
    NoLodLevels,

    /// More LOD levels than the uniform block can carry.
    #[error("mesh declares {count} LOD levels, at most {max} supported")]
    TooManyLodLevels {
        /// Declared count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A LOD level without submeshes cannot be drawn.
    #[error("LOD {lod} has no submeshes")]
    EmptyLod {
        /// Offending level.
        lod: usize,
    },

    /// Screen size outside `[0, 1]` or larger than the previous level's.
    #[error("LOD {lod} screen size {screen_size} must be in [0, 1] and not exceed LOD {prev}")]
    InvalidScreenSize {
        /// Offending level.
        lod: usize,
        /// Its screen size.
        screen_size: f32,
        /// The level it is compared against.
        prev: usize,
    },

    /// Shadow-region plane list longer than its wire array allows.
    #[error("{count} shadow-region planes supplied, at most {max} supported")]
    TooManyShadowPlanes {
        /// Supplied count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Mesh bounds are not finite or have negative extents.
    #[error("mesh bounds are invalid")]
    InvalidBounds,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for resolver setup.
pub type ResolverResult<T> = Result<T, ResolverError>;
