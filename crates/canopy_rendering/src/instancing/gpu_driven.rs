//! GPU-visible records of the classification pipeline.
//!
//! Instances never cross back to the CPU. Per frame the host writes one
//! [`FrameUniforms`] block, the classification kernel bumps per-LOD counters,
//! and the counters become `instance_count` of the static argument blocks.

use bytemuck::{Pod, Zeroable};

use super::lod::{MeshMetadata, MAX_LODS};

/// DrawIndexedIndirect arguments, one block per (LOD, submesh).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices per instance.
    pub index_count_per_instance: u32,
    /// Instances to draw (filled from the LOD counter each frame).
    pub instance_count: u32,
    /// First index.
    pub start_index: u32,
    /// Base vertex.
    pub base_vertex: u32,
    /// First instance of the LOD's append list.
    pub start_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Argument blocks for every (LOD, submesh) pair in LOD-major order, with
    /// `instance_count` zeroed.
    #[must_use]
    pub fn blocks_for(mesh: &MeshMetadata) -> Vec<Self> {
        mesh.lods
            .iter()
            .flat_map(|lod| lod.submeshes.iter())
            .map(|sub| Self {
                index_count_per_instance: sub.index_count,
                instance_count: 0,
                start_index: sub.start_index,
                base_vertex: sub.base_vertex,
                start_instance: 0,
            })
            .collect()
    }
}

/// Per-frame parameters shared by the CPU device and the WGSL kernel.
///
/// Layout (464 bytes, 16-byte aligned rows):
///
/// ```text
///   frustum_planes        6 x vec4   left, right, bottom, top, near, far
///   shadow_region_planes 12 x vec4   slot 0 = [count, 0, 0, 0]
///   camera_position       vec4       w unused
///   projection            16 floats  row-major
///   lod_thresholds        vec4       (screen_size * 0.5)^2, unused = MAX
///   frustum_sphere        vec4       center, radius
///   bounds_center         vec4       w unused
///   bounds_extents        vec4       w = object-space radius
///   cast_shadows          uvec4
///   time, lod_count, instance_count, flags
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Frustum planes.
    pub frustum_planes: [[f32; 4]; 6],
    /// Shadow-region planes with header slot.
    pub shadow_region_planes: [[f32; 4]; 12],
    /// Camera world position.
    pub camera_position: [f32; 4],
    /// Projection matrix, row-major.
    pub projection: [f32; 16],
    /// Squared screen-size thresholds.
    pub lod_thresholds: [f32; MAX_LODS],
    /// Coarse frustum bounding sphere.
    pub frustum_sphere: [f32; 4],
    /// Mesh bounds center.
    pub bounds_center: [f32; 4],
    /// Mesh half extents, object-space radius in `w`.
    pub bounds_extents: [f32; 4],
    /// Per-LOD shadow flags.
    pub cast_shadows: [u32; MAX_LODS],
    /// Monotonic time in seconds.
    pub time: f32,
    /// Valid LOD levels.
    pub lod_count: u32,
    /// Instances in the uploaded buffers.
    pub instance_count: u32,
    /// `FLAG_*` bits.
    pub flags: u32,
}

impl FrameUniforms {
    /// Shadow pass also considers frustum-culled instances in the shadow region.
    pub const FLAG_CAST_SHADOW_IF_CULLED: u32 = 1 << 0;

    /// Projection `[1][1]`, the vertical focal scale.
    #[inline]
    #[must_use]
    pub fn projection_y_scale(&self) -> f32 {
        self.projection[5]
    }

    /// True when the flag bit is set.
    #[inline]
    #[must_use]
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}
