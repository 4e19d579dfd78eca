//! # Classification Device
//!
//! The compute substrate that runs one classification unit per instance.
//! The resolver only talks to [`ClassificationDevice`]; a GPU backend runs
//! [`classification_shader`], [`CpuClassificationDevice`] runs the same
//! kernel on scoped worker threads.

#![allow(clippy::cast_possible_truncation)]

mod cpu;
mod kernel;

pub use cpu::CpuClassificationDevice;

use canopy_procedural::InstanceArrays;
use canopy_shared::Float4;

use crate::instancing::{FrameUniforms, MAX_LODS};

/// Instances per workgroup.
pub const WORKGROUP_SIZE: u32 = 256;

/// Workgroups needed to cover `instance_count` instances.
#[inline]
#[must_use]
pub fn workgroup_count(instance_count: usize) -> u32 {
    (instance_count as u32).div_ceil(WORKGROUP_SIZE)
}

/// WGSL source of the classification kernel.
///
/// Binds `FrameUniforms` at `@group(0) @binding(0)` with the layout of
/// [`FrameUniforms`].
#[must_use]
pub fn classification_shader() -> &'static str {
    include_str!("../../shaders/instance_classify.wgsl")
}

/// Host-side copy of the per-instance buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceSnapshot {
    /// Position + packed scale.
    pub positions: Vec<Float4>,
    /// Rotation quaternions `(x, y, z, w)`.
    pub rotations: Vec<Float4>,
    /// Optional custom data.
    pub custom_data: Option<Vec<Float4>>,
}

impl InstanceSnapshot {
    /// Copies every instance.
    #[must_use]
    pub fn from_arrays(arrays: &InstanceArrays) -> Self {
        Self {
            positions: arrays.positions().to_vec(),
            rotations: arrays.rotations().to_vec(),
            custom_data: arrays.custom_data().map(<[Float4]>::to_vec),
        }
    }

    /// Copies the listed instances in the given order. Indices past the end
    /// are skipped.
    #[must_use]
    pub fn gather(arrays: &InstanceArrays, indices: &[usize]) -> (Vec<u32>, Self) {
        let valid: Vec<usize> = indices.iter().copied().filter(|&i| i < arrays.len()).collect();
        let pick = |src: &[Float4]| valid.iter().map(|&i| src[i]).collect::<Vec<_>>();
        let snapshot = Self {
            positions: pick(arrays.positions()),
            rotations: pick(arrays.rotations()),
            custom_data: arrays.custom_data().map(pick),
        };
        (valid.iter().map(|&i| i as u32).collect(), snapshot)
    }

    /// Instance count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when no instances are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position buffer bytes.
    #[must_use]
    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Rotation buffer bytes.
    #[must_use]
    pub fn rotations_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.rotations)
    }

    /// Custom-data buffer bytes, empty when absent.
    #[must_use]
    pub fn custom_data_bytes(&self) -> &[u8] {
        match &self.custom_data {
            Some(data) => bytemuck::cast_slice(data),
            None => &[],
        }
    }
}

/// Data written to the device.
#[derive(Debug, Clone)]
pub enum DeviceUpload<'a> {
    /// Replaces every instance buffer.
    Instances(InstanceSnapshot),
    /// Overwrites single instances; `indices[i]` receives record `i`.
    InstancePatch {
        /// Destination indices.
        indices: Vec<u32>,
        /// Records in the same order.
        snapshot: InstanceSnapshot,
    },
    /// The frame's uniform block.
    Frame(&'a FrameUniforms),
    /// Zeroes every LOD counter and append list.
    ResetCounters,
}

/// Which classification pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassificationPass {
    /// Frustum test and LOD selection.
    Main,
    /// Shadow-caster selection.
    Shadow,
}

/// Per-LOD append counts after the frame's dispatches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LodCounters {
    /// Main-pass instances per LOD.
    pub main: [u32; MAX_LODS],
    /// Shadow casters per LOD.
    pub shadow: [u32; MAX_LODS],
}

impl LodCounters {
    /// Instances drawn by the main pass.
    #[must_use]
    pub fn main_total(&self) -> u32 {
        self.main.iter().sum()
    }

    /// Instances drawn by the shadow pass.
    #[must_use]
    pub fn shadow_total(&self) -> u32 {
        self.shadow.iter().sum()
    }
}

/// The compute substrate seen by the resolver.
///
/// Operations issued in order are observed in order: a dispatch sees every
/// earlier upload, `read_counters` sees every earlier dispatch.
pub trait ClassificationDevice {
    /// Writes instance buffers, frame uniforms, or a counter reset.
    fn upload(&mut self, upload: DeviceUpload<'_>);

    /// Runs `workgroups` x [`WORKGROUP_SIZE`] classification units.
    fn dispatch(&mut self, pass: ClassificationPass, workgroups: u32);

    /// Current per-LOD counters.
    fn read_counters(&self) -> LodCounters;
}

impl<D: ClassificationDevice + ?Sized> ClassificationDevice for Box<D> {
    fn upload(&mut self, upload: DeviceUpload<'_>) {
        (**self).upload(upload);
    }

    fn dispatch(&mut self, pass: ClassificationPass, workgroups: u32) {
        (**self).dispatch(pass, workgroups);
    }

    fn read_counters(&self) -> LodCounters {
        (**self).read_counters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(0), 0);
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(256), 1);
        assert_eq!(workgroup_count(257), 2);
    }

    #[test]
    fn test_gather_skips_out_of_range() {
        let arrays = InstanceArrays::new(
            vec![[0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0], [2.0, 0.0, 0.0, 1.0]],
            vec![[0.0, 0.0, 0.0, 1.0]; 3],
            None,
        )
        .unwrap();
        let (indices, snapshot) = InstanceSnapshot::gather(&arrays, &[2, 7, 0]);

        assert_eq!(indices, vec![2, 0]);
        assert_eq!(snapshot.positions[0][0], 2.0);
        assert_eq!(snapshot.positions[1][0], 0.0);
        assert_eq!(snapshot.positions_bytes().len(), 32);
        assert!(snapshot.custom_data_bytes().is_empty());
    }

    #[test]
    fn test_shader_declares_uniforms() {
        let source = classification_shader();
        assert!(source.contains("struct FrameUniforms"));
        assert!(source.contains("@workgroup_size(256)"));
    }
}
