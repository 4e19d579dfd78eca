//! # Packed Scale Codec
//!
//! Squeezes a non-negative 3-component scale into ONE `f32` so it can ride
//! in the `w` lane of the per-instance position vector.
//!
//! ## Layout
//!
//! ```text
//!   max  = ceil(max(sx, sy, sz))            (1..=7)
//!   x, y, z = round(s / max * 255)          x clamped to 250, y/z to 253
//!
//!   code = x + y * 255 + z * 255^2 + max * 255^3
//!          └┬┘   └──┬──┘   └───┬───┘   └────┬────┘
//!         lowest  digit 1   digit 2     magnitude
//! ```
//!
//! ## Float32 Boundary
//!
//! For `max >= 2` the code is above 2^24, where consecutive `f32` values are
//! 2, 4 or 8 apart. The x digit is snapped so the whole code lands exactly on
//! the `f32` lattice and stays inside `[0, 250]`; the smaller x budget leaves
//! room for that snap, so decoding never borrows from or carries into `y`.
//! Net effect: `y` and `z` decode to their quantized level exactly, `x` is
//! off by less than one lattice step. Magnitudes above
//! [`MAX_PACKED_MAGNITUDE`] are rejected rather than silently degraded.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

use glam::Vec3;

use crate::error::{CodecError, CodecResult};

/// Largest `ceil(max component)` the codec accepts.
pub const MAX_PACKED_MAGNITUDE: f32 = 7.0;

const BASE: f64 = 255.0;
const BASE_SQ: f64 = BASE * BASE;
const BASE_CUBE: f64 = BASE * BASE * BASE;

/// Quantization ceiling for the lowest-order digit.
const X_CEILING: f32 = 250.0;
/// Quantization ceiling for the two upper digits.
const YZ_CEILING: f32 = 253.0;

/// Packs a scale vector into a single float.
///
/// # Errors
///
/// - [`CodecError::InvalidComponent`] for negative or non-finite components
/// - [`CodecError::PrecisionOverflow`] when `ceil(max component)` exceeds
///   [`MAX_PACKED_MAGNITUDE`]
pub fn pack_scale(scale: Vec3) -> CodecResult<f32> {
    for (axis, value) in scale.to_array().into_iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(CodecError::InvalidComponent { axis, value });
        }
    }

    // An all-zero scale still needs a non-zero divisor.
    let magnitude = scale.max_element().ceil().max(1.0);
    if magnitude > MAX_PACKED_MAGNITUDE {
        return Err(CodecError::PrecisionOverflow {
            magnitude,
            limit: MAX_PACKED_MAGNITUDE,
        });
    }

    let normalized = scale / magnitude;
    let x = quantize(normalized.x, X_CEILING);
    let y = quantize(normalized.y, YZ_CEILING);
    let z = quantize(normalized.z, YZ_CEILING);

    let upper = u64::from(y) * 255 + u64::from(z) * 255 * 255 + (magnitude as u64) * 255 * 255 * 255;
    Ok(snap_to_lattice(upper, x))
}

/// Unpacks a float produced by [`pack_scale`].
#[must_use]
pub fn unpack_scale(code: f32) -> Vec3 {
    let code = f64::from(code);

    let magnitude = (code / BASE_CUBE).floor();
    let mut rest = code - magnitude * BASE_CUBE;
    let z = (rest / BASE_SQ).floor();
    rest -= z * BASE_SQ;
    let y = (rest / BASE).floor();
    let x = rest - y * BASE;

    let unit = magnitude / BASE;
    Vec3::new((x * unit) as f32, (y * unit) as f32, (z * unit) as f32)
}

/// Worst-case absolute decode error per axis for a given magnitude.
///
/// Valid for components below the clamp ceilings (`250/255` of the magnitude
/// for x, `253/255` for y and z); components above lose the clamp difference
/// on top of this.
#[must_use]
pub fn quantization_error_bound(magnitude: f32) -> Vec3 {
    let magnitude = magnitude.ceil().max(1.0);
    let top = ((f64::from(magnitude) + 1.0) * BASE_CUBE) as f32;
    let step = lattice_step(top);
    // Mid-range digits move half a step; digits pinned against 0 or the
    // ceiling can be pushed up to a full step minus one.
    let x_levels = (step - 1.0).max(step * 0.5).max(0.5);

    Vec3::new(x_levels, 0.5, 0.5) * (magnitude / 255.0)
}

#[inline]
fn quantize(normalized: f32, ceiling: f32) -> u32 {
    (normalized * 255.0).round().min(ceiling) as u32
}

/// Picks the representable `f32` nearest to `upper + x` whose x digit stays
/// inside `[0, X_CEILING]`.
fn snap_to_lattice(upper: u64, x: u32) -> f32 {
    let floor = upper as f64;
    let ceiling = floor + f64::from(X_CEILING);

    let mut code = (upper + u64::from(x)) as f32;
    if f64::from(code) < floor {
        code = next_up(code);
    }
    if f64::from(code) > ceiling {
        code = next_down(code);
    }
    code
}

#[inline]
fn lattice_step(value: f32) -> f32 {
    next_up(value) - value
}

#[inline]
fn next_up(value: f32) -> f32 {
    f32::from_bits(value.to_bits() + 1)
}

#[inline]
fn next_down(value: f32) -> f32 {
    f32::from_bits(value.to_bits() - 1)
}
