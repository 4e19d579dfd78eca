//! Rotation composition and flat wire layouts.
//!
//! These are the canonical conversions between `glam` types and the plain
//! float arrays that cross the CPU/GPU boundary.

use glam::{Mat4, Quat, Vec3, Vec4};

/// One 16-byte wire slot: a position+scale, quaternion, plane or custom value.
pub type Float4 = [f32; 4];

/// Builds a rotation from Euler angles in degrees.
///
/// Composition order is intrinsic Y-X-Z: yaw about Y, then pitch about the
/// rotated X, then roll about the twice-rotated Z (`q = qY * qX * qZ`).
/// Applied to a vector, Z acts first, then X, then Y.
#[must_use]
pub fn rotation_from_euler_degrees(degrees: Vec3) -> Quat {
    let radians = degrees * (std::f32::consts::PI / 180.0);
    Quat::from_rotation_y(radians.y) * Quat::from_rotation_x(radians.x) * Quat::from_rotation_z(radians.z)
}

/// Reads a wire quaternion `(x, y, z, w)`, renormalizing drifted input.
#[must_use]
pub fn quat_from_wire(raw: Float4) -> Quat {
    let q = Quat::from_array(raw);
    let len_sq = q.length_squared();
    if len_sq > 0.0 {
        q * len_sq.sqrt().recip()
    } else {
        Quat::IDENTITY
    }
}

/// Flattens planes to 4 floats each, in input order.
#[must_use]
pub fn unroll_planes(planes: &[Vec4]) -> Vec<f32> {
    planes.iter().flat_map(|p| p.to_array()).collect()
}

/// Flattens a matrix to 16 floats in row-major order.
#[must_use]
pub fn unroll_matrix(matrix: &Mat4) -> [f32; 16] {
    matrix.transpose().to_cols_array()
}
