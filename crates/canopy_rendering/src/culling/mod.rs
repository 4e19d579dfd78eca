//! Culling volumes: frustum planes, shadow-region planes and bounding spheres.

pub mod bounds;
pub mod frustum;

pub use bounds::{bounding_sphere_from_aabb, frustum_bounding_sphere, BoundingSphere};
pub use frustum::{extract_frustum_planes, Frustum, Plane, ShadowRegionPlanes, SHADOW_PLANE_ORDER};
