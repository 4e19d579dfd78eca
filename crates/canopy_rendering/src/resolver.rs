//! # Visibility Resolver
//!
//! Per-frame orchestration over a [`ClassificationDevice`]:
//!
//! 1. Build and upload one [`FrameUniforms`] block
//! 2. Reset counters, dispatch the main pass (and the shadow pass when LOD0
//!    casts shadows) over `ceil(n / 256)` workgroups
//! 3. Copy each LOD counter into `instance_count` of that LOD's argument blocks
//! 4. Hand back the main, shadow and motion-vector draws
//!
//! The resolver never touches individual instances during a frame. Instance
//! buffers move only through [`VisibilityResolver::sync_instances`].

#![allow(clippy::cast_possible_truncation)]

use std::path::Path;
use std::time::Instant;

use canopy_procedural::InstanceDataset;
use canopy_shared::unroll_matrix;
use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::culling::{extract_frustum_planes, frustum_bounding_sphere, ShadowRegionPlanes};
use crate::device::{
    workgroup_count, ClassificationDevice, ClassificationPass, DeviceUpload, InstanceSnapshot,
    LodCounters,
};
use crate::error::{ResolverError, ResolverResult};
use crate::instancing::{DrawIndexedIndirectArgs, FrameUniforms, MeshMetadata, MAX_LODS};
use crate::stats::ResolverStats;

/// Resolver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fraction of the camera far distance covered by the coarse sphere.
    pub coarse_cull_far_fraction: f32,
    /// Shadow pass also takes frustum-culled instances inside the shadow region.
    pub cast_shadow_if_culled: bool,
    /// Log the previous frame's counters at the start of each frame.
    pub debug_append_count: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            coarse_cull_far_fraction: 1.0,
            cast_shadow_if_culled: false,
            debug_append_count: false,
        }
    }
}

impl ResolverConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ResolverError::InvalidConfig`] on syntax errors or invalid values.
    pub fn from_toml_str(text: &str) -> ResolverResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ResolverError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ResolverError::InvalidConfig`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> ResolverResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ResolverError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ResolverError::InvalidConfig`] for a non-positive far fraction.
    pub fn validate(&self) -> ResolverResult<()> {
        if !(self.coarse_cull_far_fraction.is_finite() && self.coarse_cull_far_fraction > 0.0) {
            return Err(ResolverError::InvalidConfig(format!(
                "coarse_cull_far_fraction must be positive, got {}",
                self.coarse_cull_far_fraction
            )));
        }
        Ok(())
    }
}

/// Inputs of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    /// Viewing camera.
    pub camera: Camera,
    /// Shadow-caster region, empty when no shadow map is rendered.
    pub shadow_region: ShadowRegionPlanes,
    /// Monotonic time in seconds.
    pub time: f32,
}

impl FrameParams {
    /// Frame with no shadow region at time zero.
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            shadow_region: ShadowRegionPlanes::empty(),
            time: 0.0,
        }
    }

    /// Sets the shadow region.
    #[must_use]
    pub fn with_shadow_region(mut self, shadow_region: ShadowRegionPlanes) -> Self {
        self.shadow_region = shadow_region;
        self
    }

    /// Sets the time value.
    #[must_use]
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

/// One finalized argument block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectDraw {
    /// LOD level.
    pub lod: usize,
    /// Submesh within the level.
    pub submesh: usize,
    /// Arguments for `DrawIndexedIndirect`.
    pub args: DrawIndexedIndirectArgs,
}

/// Draws of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDraws {
    /// Main-pass draws, every (LOD, submesh).
    pub main: Vec<IndirectDraw>,
    /// Shadow draws of shadow-casting LODs; empty when the shadow pass is off.
    pub shadow: Vec<IndirectDraw>,
    /// Motion-vector draws of LODs that request them.
    pub motion_vectors: Vec<IndirectDraw>,
    /// This frame's view-projection.
    pub view_projection: Mat4,
    /// Last frame's view-projection; this frame's on the first frame.
    pub previous_view_projection: Mat4,
}

impl FrameDraws {
    /// Instances the main pass draws at `lod` (per submesh, they all match).
    #[must_use]
    pub fn main_instances(&self, lod: usize) -> u32 {
        Self::instances_at(&self.main, lod)
    }

    /// Instances the shadow pass draws at `lod`.
    #[must_use]
    pub fn shadow_instances(&self, lod: usize) -> u32 {
        Self::instances_at(&self.shadow, lod)
    }

    /// Number of indirect draws across all passes.
    #[must_use]
    pub fn draw_calls(&self) -> usize {
        self.main.len() + self.shadow.len() + self.motion_vectors.len()
    }

    fn instances_at(draws: &[IndirectDraw], lod: usize) -> u32 {
        draws
            .iter()
            .find(|d| d.lod == lod)
            .map_or(0, |d| d.args.instance_count)
    }
}

/// What [`VisibilityResolver::sync_instances`] sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing changed.
    Unchanged,
    /// Every buffer was replaced.
    FullUpload {
        /// Instances uploaded.
        instances: usize,
    },
    /// Only edited instances were re-uploaded.
    Patched {
        /// Instances uploaded.
        instances: usize,
    },
}

/// GPU-driven visibility for one instanced mesh.
pub struct VisibilityResolver<D: ClassificationDevice> {
    device: D,
    mesh: MeshMetadata,
    config: ResolverConfig,
    thresholds: [f32; MAX_LODS],
    /// `(lod, submesh)` of each argument block.
    blocks: Vec<(usize, usize)>,
    main_args: Vec<DrawIndexedIndirectArgs>,
    shadow_args: Vec<DrawIndexedIndirectArgs>,
    uniforms: FrameUniforms,
    instance_count: usize,
    previous_view_projection: Option<Mat4>,
    pending_debug_counts: Option<LodCounters>,
    stats: ResolverStats,
}

impl<D: ClassificationDevice> VisibilityResolver<D> {
    /// Validates the mesh and caches its static draw arguments.
    ///
    /// # Errors
    ///
    /// Any [`MeshMetadata::validate`] or [`ResolverConfig::validate`] error.
    pub fn new(device: D, mesh: MeshMetadata, config: ResolverConfig) -> ResolverResult<Self> {
        mesh.validate()?;
        config.validate()?;

        let blocks = mesh
            .lods
            .iter()
            .enumerate()
            .flat_map(|(lod, level)| (0..level.submeshes.len()).map(move |sub| (lod, sub)))
            .collect();
        let main_args = DrawIndexedIndirectArgs::blocks_for(&mesh);

        tracing::info!(
            "VisibilityResolver: {} LODs, {} argument blocks, shadows {}",
            mesh.lod_count(),
            main_args.len(),
            if mesh.lods[0].cast_shadows { "on" } else { "off" }
        );

        Ok(Self {
            device,
            thresholds: mesh.lod_thresholds(),
            blocks,
            shadow_args: main_args.clone(),
            main_args,
            mesh,
            config,
            uniforms: FrameUniforms::default(),
            instance_count: 0,
            previous_view_projection: None,
            pending_debug_counts: None,
            stats: ResolverStats::default(),
        })
    }

    /// Mesh metadata.
    #[must_use]
    pub fn mesh(&self) -> &MeshMetadata {
        &self.mesh
    }

    /// Settings.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Squared LOD thresholds.
    #[must_use]
    pub fn lod_thresholds(&self) -> [f32; MAX_LODS] {
        self.thresholds
    }

    /// The device.
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Statistics of the last frame.
    #[must_use]
    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Instances resident on the device.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Main-pass argument blocks in LOD-major order.
    #[must_use]
    pub fn main_args(&self) -> &[DrawIndexedIndirectArgs] {
        &self.main_args
    }

    /// Shadow-pass argument blocks in LOD-major order.
    #[must_use]
    pub fn shadow_args(&self) -> &[DrawIndexedIndirectArgs] {
        &self.shadow_args
    }

    /// Main argument blocks as bytes for an indirect buffer.
    #[must_use]
    pub fn main_args_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.main_args)
    }

    /// Shadow argument blocks as bytes for an indirect buffer.
    #[must_use]
    pub fn shadow_args_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.shadow_args)
    }

    /// Last uploaded uniforms.
    #[must_use]
    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    /// Last uploaded uniforms as bytes.
    #[must_use]
    pub fn uniforms_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }

    /// Brings device buffers up to date with the dataset.
    ///
    /// A dirty dataset is uploaded in full and its dirty flag cleared;
    /// otherwise pending edited indices are drained into one patch.
    pub fn sync_instances(&mut self, dataset: &mut InstanceDataset) -> SyncOutcome {
        if dataset.is_dirty() {
            let snapshot = InstanceSnapshot::from_arrays(dataset.arrays());
            let instances = snapshot.len();
            self.device.upload(DeviceUpload::Instances(snapshot));
            dataset.clear_dirty();
            self.instance_count = instances;
            self.stats.full_uploads += 1;
            tracing::debug!("Uploaded {} instances of '{}'", instances, dataset.name());
            return SyncOutcome::FullUpload { instances };
        }

        if dataset.modified().is_empty() {
            return SyncOutcome::Unchanged;
        }
        let modified = dataset.drain_modified();
        let (indices, snapshot) = InstanceSnapshot::gather(dataset.arrays(), &modified);
        let instances = indices.len();
        self.device.upload(DeviceUpload::InstancePatch { indices, snapshot });
        self.stats.patched_instances += instances as u64;
        tracing::debug!("Patched {} instances of '{}'", instances, dataset.name());
        SyncOutcome::Patched { instances }
    }

    /// Classifies every resident instance and finalizes the frame's draws.
    pub fn resolve_frame(&mut self, params: &FrameParams) -> FrameDraws {
        let started = Instant::now();
        let camera = &params.camera;
        debug_assert!(camera.near > 0.0 && camera.far > camera.near, "invalid clip range");
        debug_assert!(
            camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0,
            "invalid field of view"
        );

        if let Some(counts) = self.pending_debug_counts.take() {
            tracing::debug!(
                "Previous frame appends: main {:?}, shadow {:?}",
                counts.main,
                counts.shadow
            );
        }

        self.uniforms = self.build_uniforms(params);
        let workgroups = workgroup_count(self.instance_count);
        self.device.upload(DeviceUpload::Frame(&self.uniforms));
        self.device.upload(DeviceUpload::ResetCounters);
        self.device.dispatch(ClassificationPass::Main, workgroups);
        let shadows = self.mesh.lods[0].cast_shadows;
        if shadows {
            self.device.dispatch(ClassificationPass::Shadow, workgroups);
        }

        let counters = self.device.read_counters();
        self.finalize_args(&counters);
        if self.config.debug_append_count {
            self.pending_debug_counts = Some(counters);
        }

        let view_projection = camera.view_projection();
        let previous_view_projection = self
            .previous_view_projection
            .replace(view_projection)
            .unwrap_or(view_projection);
        let draws = self.collect_draws(shadows, view_projection, previous_view_projection);

        self.stats = ResolverStats {
            frames: self.stats.frames + 1,
            instances: self.instance_count as u32,
            workgroups,
            counters,
            draw_calls: draws.draw_calls() as u32,
            full_uploads: self.stats.full_uploads,
            patched_instances: self.stats.patched_instances,
            resolve_time_ms: started.elapsed().as_secs_f32() * 1000.0,
        };
        draws
    }

    fn build_uniforms(&self, params: &FrameParams) -> FrameUniforms {
        let camera = &params.camera;
        let sphere = self.mesh.bounding_sphere();
        let mut flags = 0;
        if self.config.cast_shadow_if_culled {
            flags |= FrameUniforms::FLAG_CAST_SHADOW_IF_CULLED;
        }

        FrameUniforms {
            frustum_planes: extract_frustum_planes(camera).as_arrays(),
            shadow_region_planes: params.shadow_region.to_wire(),
            camera_position: camera.position.extend(1.0).to_array(),
            projection: unroll_matrix(&camera.projection()),
            lod_thresholds: self.thresholds,
            frustum_sphere: frustum_bounding_sphere(camera, self.config.coarse_cull_far_fraction)
                .as_array(),
            bounds_center: self.mesh.bounds_center.extend(0.0).to_array(),
            bounds_extents: self.mesh.bounds_extents.extend(sphere.radius).to_array(),
            cast_shadows: self.mesh.shadow_flags(),
            time: params.time,
            lod_count: self.mesh.lod_count() as u32,
            instance_count: self.instance_count as u32,
            flags,
        }
    }

    fn finalize_args(&mut self, counters: &LodCounters) {
        for (block, &(lod, _)) in self.blocks.iter().enumerate() {
            self.main_args[block].instance_count = counters.main[lod];
            self.shadow_args[block].instance_count = counters.shadow[lod];
        }
    }

    fn collect_draws(
        &self,
        shadows: bool,
        view_projection: Mat4,
        previous_view_projection: Mat4,
    ) -> FrameDraws {
        let draw = |args: &[DrawIndexedIndirectArgs], block: usize| {
            let (lod, submesh) = self.blocks[block];
            IndirectDraw {
                lod,
                submesh,
                args: args[block],
            }
        };
        let (lods, blocks) = (&self.mesh.lods, &self.blocks);
        let lod_of = |block: usize| &lods[blocks[block].0];
        let all = 0..self.blocks.len();

        FrameDraws {
            main: all.clone().map(|b| draw(&self.main_args, b)).collect(),
            shadow: if shadows {
                all.clone()
                    .filter(|&b| lod_of(b).cast_shadows)
                    .map(|b| draw(&self.shadow_args, b))
                    .collect()
            } else {
                Vec::new()
            },
            motion_vectors: all
                .filter(|&b| lod_of(b).motion_vectors)
                .map(|b| draw(&self.main_args, b))
                .collect(),
            view_projection,
            previous_view_projection,
        }
    }
}
