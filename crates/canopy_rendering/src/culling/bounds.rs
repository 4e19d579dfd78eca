//! Bounding spheres for coarse rejection.

#![allow(clippy::cast_precision_loss)]

use glam::Vec3;

use crate::camera::Camera;

/// A world-space sphere.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingSphere {
    /// Center.
    pub center: Vec3,
    /// Radius.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere.
    #[must_use]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Wire format: `(cx, cy, cz, r)`.
    #[must_use]
    pub fn as_array(&self) -> [f32; 4] {
        self.center.extend(self.radius).to_array()
    }

    /// True when the spheres cannot overlap.
    #[inline]
    #[must_use]
    pub fn is_disjoint(&self, center: Vec3, radius: f32) -> bool {
        self.center.distance(center) > self.radius + radius
    }
}

/// Sphere enclosing an axis-aligned box given as center and half extents.
#[must_use]
pub fn bounding_sphere_from_aabb(center: Vec3, extents: Vec3) -> BoundingSphere {
    BoundingSphere::new(center, extents.length())
}

/// Smallest sphere around the view frustum truncated at
/// `far_fraction * camera.far`.
///
/// With `k = tan(fov / 2) * sqrt(1 + (h / w)^2)` the corner ray slope, a
/// frustum wide enough that `k^2 >= (F - N) / (F + N)` is bounded by the circle
/// of the far cap; narrower ones get the sphere through both caps' corners.
#[must_use]
pub fn frustum_bounding_sphere(camera: &Camera, far_fraction: f32) -> BoundingSphere {
    let far = camera.far * far_fraction;
    let near = camera.near;
    let half_tan = (camera.fov_y_degrees.to_radians() * 0.5).tan();
    let inverse_aspect = camera.pixel_height.max(1) as f32 / camera.pixel_width.max(1) as f32;
    let k = half_tan * (1.0 + inverse_aspect * inverse_aspect).sqrt();
    let kk = k * k;

    let (depth, radius) = if kk >= (far - near) / (far + near) {
        (far, k * far)
    } else {
        let span = far - near;
        let sum = far + near;
        let radius =
            0.5 * (span * span + 2.0 * (far * far + near * near) * kk + sum * sum * kk * kk).sqrt();
        (0.5 * sum * (1.0 + kk), radius)
    };

    let center = camera.local_to_world().transform_point3(Vec3::new(0.0, 0.0, depth));
    BoundingSphere::new(center, radius)
}
