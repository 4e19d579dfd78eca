//! Frustum and shadow-region planes.
//!
//! Planes are stored as `(nx, ny, nz, d)` with the normal pointing INTO the
//! kept volume: a point is inside when `dot(n, p) + d >= 0`.
//!
//! ## Plane Order
//!
//! Gribb-Hartmann extraction walks the clip axes and emits the positive side
//! of each axis first:
//!
//! ```text
//!   naive:  [ right, left, top, bottom, far, near ]      (r3 - rk, r3 + rk)
//!   remap:  SHADOW_PLANE_ORDER = [1, 0, 3, 2, 5, 4]
//!   final:  [ left, right, bottom, top, near, far ]
//! ```
//!
//! Shadow culling indexes planes by position, so the final order is part of
//! the wire contract.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::error::{ResolverError, ResolverResult};

/// Maps naive extraction slots to the published plane order.
pub const SHADOW_PLANE_ORDER: [usize; 6] = [1, 0, 3, 2, 5, 4];

/// A plane in 3D space (`ax + by + cz + d = 0`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Normal X component.
    pub a: f32,
    /// Normal Y component.
    pub b: f32,
    /// Normal Z component.
    pub c: f32,
    /// Distance term.
    pub d: f32,
}

impl Plane {
    /// Creates a new plane.
    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Creates a plane from an inward normal and a point on it.
    #[must_use]
    pub fn from_normal_point(normal: Vec3, point: Vec3) -> Self {
        let n = normal.normalize_or_zero();
        Self::new(n.x, n.y, n.z, -n.dot(point))
    }

    /// Rescales so the normal has unit length. Degenerate planes pass through.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.normal().length();
        if len > 0.0 {
            Self::new(self.a / len, self.b / len, self.c / len, self.d / len)
        } else {
            self
        }
    }

    /// The plane normal.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.a, self.b, self.c)
    }

    /// Signed distance from a point; positive on the inside.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.d
    }

    /// Converts to array format.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Converts from array format.
    #[must_use]
    pub const fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Vec4> for Plane {
    fn from(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }
}

/// View frustum in the published `{left, right, bottom, top, near, far}` order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Planes in raw extraction order: `[right, left, top, bottom, far, near]`.
    #[must_use]
    pub fn naive_planes(view_projection: &Mat4) -> [Plane; 6] {
        let r3 = view_projection.row(3);
        let mut planes = [Plane::default(); 6];
        for axis in 0..3 {
            let rk = view_projection.row(axis);
            planes[axis * 2] = Plane::from(r3 - rk).normalized();
            planes[axis * 2 + 1] = Plane::from(r3 + rk).normalized();
        }
        planes
    }

    /// Extracts and reorders the planes of a view-projection matrix.
    #[must_use]
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let naive = Self::naive_planes(view_projection);
        Self {
            planes: SHADOW_PLANE_ORDER.map(|slot| naive[slot]),
        }
    }

    /// True when the sphere is not entirely behind any plane.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|p| p.distance_to(center) >= -radius)
    }

    /// Wire format: 6 x `(nx, ny, nz, d)`.
    #[must_use]
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.as_array())
    }
}

/// Extracts the frustum of a camera.
#[must_use]
pub fn extract_frustum_planes(camera: &Camera) -> Frustum {
    Frustum::from_view_projection(&camera.view_projection())
}

/// Up to [`ShadowRegionPlanes::MAX_PLANES`] planes bounding the region whose
/// occupants may cast shadows into view.
///
/// An empty region contains nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShadowRegionPlanes {
    planes: [Plane; Self::MAX_PLANES],
    count: usize,
}

impl ShadowRegionPlanes {
    /// Wire slots including the header slot.
    pub const WIRE_SLOTS: usize = 12;
    /// Planes that fit after the header slot.
    pub const MAX_PLANES: usize = Self::WIRE_SLOTS - 1;

    /// A region with no planes.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a region from externally derived planes.
    ///
    /// # Errors
    ///
    /// [`ResolverError::TooManyShadowPlanes`] beyond [`Self::MAX_PLANES`].
    pub fn new(planes: &[Plane]) -> ResolverResult<Self> {
        if planes.len() > Self::MAX_PLANES {
            return Err(ResolverError::TooManyShadowPlanes {
                count: planes.len(),
                max: Self::MAX_PLANES,
            });
        }
        let mut region = Self::empty();
        region.planes[..planes.len()].copy_from_slice(planes);
        region.count = planes.len();
        Ok(region)
    }

    /// Valid planes.
    #[must_use]
    pub fn planes(&self) -> &[Plane] {
        &self.planes[..self.count]
    }

    /// Number of valid planes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the region has no planes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when a non-empty region does not exclude the sphere.
    #[must_use]
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        !self.is_empty() && self.planes().iter().all(|p| p.distance_to(center) >= -radius)
    }

    /// Wire format: slot 0 is `[count, 0, 0, 0]`, planes follow in slots
    /// `1..=count`, unused slots are zero.
    #[must_use]
    pub fn to_wire(&self) -> [[f32; 4]; Self::WIRE_SLOTS] {
        let mut wire = [[0.0; 4]; Self::WIRE_SLOTS];
        wire[0][0] = self.count as f32;
        for (slot, plane) in wire[1..].iter_mut().zip(self.planes()) {
            *slot = plane.as_array();
        }
        wire
    }

    /// Reads the wire format; the header count is clamped to the slot count.
    #[must_use]
    pub fn from_wire(wire: &[[f32; 4]; Self::WIRE_SLOTS]) -> Self {
        let count = (wire[0][0].max(0.0) as usize).min(Self::MAX_PLANES);
        let mut region = Self::empty();
        for (plane, raw) in region.planes.iter_mut().zip(&wire[1..=count]) {
            *plane = Plane::from_array(*raw);
        }
        region.count = count;
        region
    }
}
