//! Per-instance classification, mirrored by `instance_classify.wgsl`.

use canopy_shared::{quat_from_wire, unpack_scale, Float4};
use glam::Vec3;

use crate::culling::{BoundingSphere, Frustum, Plane, ShadowRegionPlanes};
use crate::instancing::{FrameUniforms, MAX_LODS};

/// Frame uniforms decoded once per dispatch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KernelParams {
    frustum: Frustum,
    shadow_region: ShadowRegionPlanes,
    frustum_sphere: BoundingSphere,
    camera_position: Vec3,
    projection_y: f32,
    thresholds: [f32; MAX_LODS],
    cast_shadows: [bool; MAX_LODS],
    lod_count: usize,
    bounds_center: Vec3,
    bounds_radius: f32,
    cast_shadow_if_culled: bool,
}

impl KernelParams {
    pub(crate) fn from_uniforms(uniforms: &FrameUniforms) -> Self {
        let sphere = uniforms.frustum_sphere;
        Self {
            frustum: Frustum {
                planes: uniforms.frustum_planes.map(Plane::from_array),
            },
            shadow_region: ShadowRegionPlanes::from_wire(&uniforms.shadow_region_planes),
            frustum_sphere: BoundingSphere::new(Vec3::new(sphere[0], sphere[1], sphere[2]), sphere[3]),
            camera_position: Vec3::from_slice(&uniforms.camera_position[..3]),
            projection_y: uniforms.projection_y_scale(),
            thresholds: uniforms.lod_thresholds,
            cast_shadows: uniforms.cast_shadows.map(|flag| flag != 0),
            lod_count: (uniforms.lod_count as usize).min(MAX_LODS),
            bounds_center: Vec3::from_slice(&uniforms.bounds_center[..3]),
            bounds_radius: uniforms.bounds_extents[3],
            cast_shadow_if_culled: uniforms.has_flag(FrameUniforms::FLAG_CAST_SHADOW_IF_CULLED),
        }
    }

    /// World-space bounding sphere of one instance.
    #[inline]
    fn world_sphere(&self, position: Float4, rotation: Float4) -> (Vec3, f32) {
        let scale = unpack_scale(position[3]);
        let rotation = quat_from_wire(rotation);
        let center = Vec3::new(position[0], position[1], position[2])
            + rotation * (self.bounds_center * scale);
        (center, self.bounds_radius * scale.max_element())
    }

    /// Finest LOD whose threshold the projected size still reaches.
    #[inline]
    fn select_lod(&self, center: Vec3, radius: f32) -> Option<usize> {
        let distance = self.camera_position.distance(center).max(f32::EPSILON);
        let projected = 0.5 * radius * self.projection_y / distance;
        let metric = projected * projected;
        self.thresholds[..self.lod_count]
            .iter()
            .position(|&threshold| metric >= threshold)
    }

    /// Main pass: LOD of a frustum-visible instance.
    pub(crate) fn classify_main(&self, position: Float4, rotation: Float4) -> Option<usize> {
        let (center, radius) = self.world_sphere(position, rotation);
        if self.frustum_sphere.is_disjoint(center, radius) {
            return None;
        }
        if !self.frustum.intersects_sphere(center, radius) {
            return None;
        }
        self.select_lod(center, radius)
    }

    /// Shadow pass: LOD the instance casts shadows with.
    pub(crate) fn classify_shadow(&self, position: Float4, rotation: Float4) -> Option<usize> {
        let (center, radius) = self.world_sphere(position, rotation);
        let lod = self.select_lod(center, radius)?;
        if !self.cast_shadows[lod] {
            return None;
        }

        let visible = !self.frustum_sphere.is_disjoint(center, radius)
            && self.frustum.intersects_sphere(center, radius);
        if visible || (self.cast_shadow_if_culled && self.shadow_region.contains_sphere(center, radius)) {
            Some(lod)
        } else {
            None
        }
    }
}
