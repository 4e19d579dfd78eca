//! Static mesh and LOD metadata, validated once at resolver setup.

use glam::Vec3;

use crate::culling::{bounding_sphere_from_aabb, BoundingSphere};
use crate::error::{ResolverError, ResolverResult};

/// Maximum LOD levels a mesh may declare.
pub const MAX_LODS: usize = 4;

/// One indexed draw range of a LOD mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmeshRange {
    /// Indices per instance.
    pub index_count: u32,
    /// First index in the shared index buffer.
    pub start_index: u32,
    /// Value added to each index.
    pub base_vertex: u32,
}

impl SubmeshRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(index_count: u32, start_index: u32, base_vertex: u32) -> Self {
        Self {
            index_count,
            start_index,
            base_vertex,
        }
    }
}

/// One level of detail.
#[derive(Debug, Clone, PartialEq)]
pub struct LodLevel {
    /// Fraction of the viewport height the bounding sphere must cover for this
    /// level to be chosen, in `[0, 1]`.
    pub screen_size: f32,
    /// Instances at this level are drawn into the shadow pass.
    pub cast_shadows: bool,
    /// Instances at this level are drawn into the motion-vector pass.
    pub motion_vectors: bool,
    /// Draw ranges, one argument block each.
    pub submeshes: Vec<SubmeshRange>,
}

impl LodLevel {
    /// A shadow-casting level without motion vectors.
    #[must_use]
    pub fn new(screen_size: f32, submeshes: Vec<SubmeshRange>) -> Self {
        Self {
            screen_size,
            cast_shadows: true,
            motion_vectors: false,
            submeshes,
        }
    }

    /// Sets the shadow flag.
    #[must_use]
    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    /// Sets the motion-vector flag.
    #[must_use]
    pub fn with_motion_vectors(mut self, motion_vectors: bool) -> Self {
        self.motion_vectors = motion_vectors;
        self
    }

    /// `(screen_size * 0.5)^2`, compared against the squared projected size.
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> f32 {
        let half = self.screen_size * 0.5;
        half * half
    }
}

/// Object-space bounds and LOD chain of the instanced mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshMetadata {
    /// Object-space bounds center.
    pub bounds_center: Vec3,
    /// Object-space bounds half extents.
    pub bounds_extents: Vec3,
    /// LOD0 first, finest to coarsest.
    pub lods: Vec<LodLevel>,
}

impl MeshMetadata {
    /// Creates and validates metadata.
    ///
    /// # Errors
    ///
    /// See [`MeshMetadata::validate`].
    pub fn new(bounds_center: Vec3, bounds_extents: Vec3, lods: Vec<LodLevel>) -> ResolverResult<Self> {
        let mesh = Self {
            bounds_center,
            bounds_extents,
            lods,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Checks bounds and the LOD chain.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidBounds`] for non-finite or negative bounds
    /// - [`ResolverError::NoLodLevels`] / [`ResolverError::TooManyLodLevels`]
    /// - [`ResolverError::EmptyLod`] for a level without submeshes
    /// - [`ResolverError::InvalidScreenSize`] when sizes leave `[0, 1]` or grow
    pub fn validate(&self) -> ResolverResult<()> {
        if !self.bounds_center.is_finite()
            || !self.bounds_extents.is_finite()
            || self.bounds_extents.min_element() < 0.0
        {
            return Err(ResolverError::InvalidBounds);
        }
        if self.lods.is_empty() {
            return Err(ResolverError::NoLodLevels);
        }
        if self.lods.len() > MAX_LODS {
            return Err(ResolverError::TooManyLodLevels {
                count: self.lods.len(),
                max: MAX_LODS,
            });
        }

        let mut prev_size = 1.0;
        for (lod, level) in self.lods.iter().enumerate() {
            if level.submeshes.is_empty() {
                return Err(ResolverError::EmptyLod { lod });
            }
            if !(0.0..=prev_size).contains(&level.screen_size) {
                return Err(ResolverError::InvalidScreenSize {
                    lod,
                    screen_size: level.screen_size,
                    prev: lod.saturating_sub(1),
                });
            }
            prev_size = level.screen_size;
        }
        Ok(())
    }

    /// Number of LOD levels.
    #[must_use]
    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }

    /// Squared thresholds; unused slots are `f32::MAX` so they never match.
    #[must_use]
    pub fn lod_thresholds(&self) -> [f32; MAX_LODS] {
        let mut thresholds = [f32::MAX; MAX_LODS];
        for (slot, level) in thresholds.iter_mut().zip(&self.lods) {
            *slot = level.threshold();
        }
        thresholds
    }

    /// Per-LOD shadow flags as `0` / `1`.
    #[must_use]
    pub fn shadow_flags(&self) -> [u32; MAX_LODS] {
        let mut flags = [0; MAX_LODS];
        for (slot, level) in flags.iter_mut().zip(&self.lods) {
            *slot = u32::from(level.cast_shadows);
        }
        flags
    }

    /// Object-space bounding sphere.
    #[must_use]
    pub fn bounding_sphere(&self) -> BoundingSphere {
        bounding_sphere_from_aabb(self.bounds_center, self.bounds_extents)
    }
}
