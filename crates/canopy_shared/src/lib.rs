//! # Canopy Shared
//!
//! Pure functions used by both the placement bake and the per-frame
//! visibility resolver.
//!
//! - [`scale_codec`]: lossy single-float encoding of a 3-component scale
//! - [`math`]: rotation composition and flat wire layouts
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on a GPU API. Anything touching the
//! device belongs in `canopy_rendering`.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod math;
pub mod scale_codec;

pub use error::{CodecError, CodecResult};
pub use math::{quat_from_wire, rotation_from_euler_degrees, unroll_matrix, unroll_planes, Float4};
pub use scale_codec::{
    pack_scale, quantization_error_bound, unpack_scale, MAX_PACKED_MAGNITUDE,
};

/// Re-exported so downstream crates agree on one math library version.
pub use glam;
