//! # Placement Error Types
//!
//! All errors that can occur while baking or editing instance data.
//! Out-of-bounds splat samples are NOT errors: they are counted in
//! [`crate::PlacementReport`] and the sample is rejected.

use canopy_shared::CodecError;
use thiserror::Error;

/// Errors that can occur during placement.
#[derive(Error, Debug)]
pub enum PlacementError {
    /// Placement ran without a terrain / weight-map source.
    #[error("no terrain or weight-map source available for placement")]
    MissingTerrainSource,

    /// Scatter placement hit its attempt budget before reaching the target.
    #[error("scatter exhausted {attempts} attempts: accepted {accepted} of {target}")]
    ExhaustedAttempts {
        /// Instances accepted before giving up.
        accepted: usize,
        /// Requested instance count.
        target: usize,
        /// Attempts consumed.
        attempts: u64,
    },

    /// Layer selector outside `-1` and `0..=3`.
    #[error("layer {0} is neither -1 (any) nor a splat channel 0..=3")]
    InvalidLayer(i32),

    /// A min/max pair that cannot be sampled.
    #[error("invalid {what} range on axis {axis}: [{min}, {max}]")]
    InvalidRange {
        /// Which setting the range belongs to.
        what: &'static str,
        /// Axis or channel index.
        axis: usize,
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },

    /// A spawn rule whose grid would exceed the per-rule candidate cap.
    #[error("spawn rule on layer {layer} with density {density} needs more than {limit} grid cells")]
    GridTooDense {
        /// Layer selector of the rule.
        layer: i32,
        /// Requested density.
        density: f32,
        /// Candidate cap.
        limit: u64,
    },

    /// Splat texel count does not match its dimensions.
    #[error("splat map {width}x{height} needs {expected} texels, got {actual}")]
    InvalidSplatMap {
        /// Raster width.
        width: usize,
        /// Raster height.
        height: usize,
        /// Expected texel count.
        expected: usize,
        /// Provided texel count.
        actual: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Scale packing failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Dataset construction failed.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Errors raised by [`crate::InstanceDataset`] and its persistence.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Parallel instance arrays disagree on length.
    #[error("array length mismatch: {positions} positions, {rotations} rotations, custom data {custom_data:?}")]
    ArrayLengthMismatch {
        /// Position array length.
        positions: usize,
        /// Rotation array length.
        rotations: usize,
        /// Custom data length, if present.
        custom_data: Option<usize>,
    },

    /// Edit addressed an instance that does not exist.
    #[error("instance {index} out of range for {count} instances")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current instance count.
        count: usize,
    },

    /// Scale repacking failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// File operations failed.
    #[error("dataset i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A length that does not fit the persisted 32-bit field.
    #[error("{what} {len} exceeds the u32 range of the dataset format")]
    TooLarge {
        /// Which field overflowed.
        what: &'static str,
        /// Actual length.
        len: usize,
    },

    /// Stored bytes are not a valid dataset.
    #[error("corrupt dataset: {0}")]
    Corrupt(String),
}

/// Result type for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
