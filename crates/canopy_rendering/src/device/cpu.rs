//! CPU classification device.
//!
//! Workgroups are split into contiguous ranges, one per scoped worker thread.
//! Every classified instance bumps its LOD counter with one atomic increment;
//! the instance indices themselves are collected per worker and appended to
//! the shared per-LOD lists once, when the worker finishes.

#![allow(clippy::cast_possible_truncation)]

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};

use canopy_shared::Float4;
use parking_lot::Mutex;

use super::kernel::KernelParams;
use super::{
    ClassificationDevice, ClassificationPass, DeviceUpload, InstanceSnapshot, LodCounters,
    WORKGROUP_SIZE,
};
use crate::instancing::{FrameUniforms, MAX_LODS};

/// Counters and append lists of one pass.
#[derive(Debug)]
struct PassOutput {
    counters: [AtomicU32; MAX_LODS],
    lists: [Mutex<Vec<u32>>; MAX_LODS],
}

impl PassOutput {
    fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU32::new(0)),
            lists: std::array::from_fn(|_| Mutex::new(Vec::new())),
        }
    }

    fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
        for list in &self.lists {
            list.lock().clear();
        }
    }

    fn counts(&self) -> [u32; MAX_LODS] {
        std::array::from_fn(|lod| self.counters[lod].load(Ordering::Acquire))
    }

    fn sorted_list(&self, lod: usize) -> Vec<u32> {
        let mut list = self.lists.get(lod).map(|l| l.lock().clone()).unwrap_or_default();
        list.sort_unstable();
        list
    }
}

/// Runs the classification kernel on a pool of scoped threads.
#[derive(Debug)]
pub struct CpuClassificationDevice {
    positions: Vec<Float4>,
    rotations: Vec<Float4>,
    custom_data: Option<Vec<Float4>>,
    uniforms: FrameUniforms,
    main: PassOutput,
    shadow: PassOutput,
    workers: usize,
    instance_uploads: u64,
    patched_instances: u64,
}

impl Default for CpuClassificationDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuClassificationDevice {
    /// One worker per available core.
    #[must_use]
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self::with_workers(workers)
    }

    /// A fixed number of workers (at least one).
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            positions: Vec::new(),
            rotations: Vec::new(),
            custom_data: None,
            uniforms: FrameUniforms::default(),
            main: PassOutput::new(),
            shadow: PassOutput::new(),
            workers: workers.max(1),
            instance_uploads: 0,
            patched_instances: 0,
        }
    }

    /// Instances currently resident.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.positions.len()
    }

    /// Resident position buffer.
    #[must_use]
    pub fn positions(&self) -> &[Float4] {
        &self.positions
    }

    /// Resident custom-data buffer.
    #[must_use]
    pub fn custom_data(&self) -> Option<&[Float4]> {
        self.custom_data.as_deref()
    }

    /// Full instance uploads received.
    #[must_use]
    pub fn instance_uploads(&self) -> u64 {
        self.instance_uploads
    }

    /// Instances overwritten by patches.
    #[must_use]
    pub fn patched_instances(&self) -> u64 {
        self.patched_instances
    }

    /// Indices appended to a main-pass LOD list, sorted.
    #[must_use]
    pub fn main_instances(&self, lod: usize) -> Vec<u32> {
        self.main.sorted_list(lod)
    }

    /// Indices appended to a shadow-pass LOD list, sorted.
    #[must_use]
    pub fn shadow_instances(&self, lod: usize) -> Vec<u32> {
        self.shadow.sorted_list(lod)
    }

    fn apply_patch(&mut self, indices: &[u32], snapshot: &InstanceSnapshot) {
        debug_assert_eq!(indices.len(), snapshot.len());
        for (record, &index) in indices.iter().enumerate() {
            let index = index as usize;
            if index >= self.positions.len() {
                continue;
            }
            self.positions[index] = snapshot.positions[record];
            self.rotations[index] = snapshot.rotations[record];
            if let (Some(dst), Some(src)) = (self.custom_data.as_mut(), snapshot.custom_data.as_ref()) {
                dst[index] = src[record];
            }
            self.patched_instances += 1;
        }
    }
}

impl ClassificationDevice for CpuClassificationDevice {
    fn upload(&mut self, upload: DeviceUpload<'_>) {
        match upload {
            DeviceUpload::Instances(snapshot) => {
                self.positions = snapshot.positions;
                self.rotations = snapshot.rotations;
                self.custom_data = snapshot.custom_data;
                self.instance_uploads += 1;
            }
            DeviceUpload::InstancePatch { indices, snapshot } => {
                self.apply_patch(&indices, &snapshot);
            }
            DeviceUpload::Frame(uniforms) => self.uniforms = *uniforms,
            DeviceUpload::ResetCounters => {
                self.main.reset();
                self.shadow.reset();
            }
        }
    }

    fn dispatch(&mut self, pass: ClassificationPass, workgroups: u32) {
        let units = (workgroups as usize * WORKGROUP_SIZE as usize)
            .min(self.positions.len())
            .min(self.uniforms.instance_count as usize);
        if units == 0 {
            return;
        }

        let params = KernelParams::from_uniforms(&self.uniforms);
        let output = match pass {
            ClassificationPass::Main => &self.main,
            ClassificationPass::Shadow => &self.shadow,
        };
        let group = WORKGROUP_SIZE as usize;
        let groups_per_worker = units.div_ceil(group).div_ceil(self.workers);
        let chunk = groups_per_worker * group;
        let positions = &self.positions[..units];
        let rotations = &self.rotations[..units];

        std::thread::scope(|scope| {
            for (worker, (pos_chunk, rot_chunk)) in
                positions.chunks(chunk).zip(rotations.chunks(chunk)).enumerate()
            {
                let params = &params;
                scope.spawn(move || {
                    let base = (worker * chunk) as u32;
                    let mut local: [Vec<u32>; MAX_LODS] = Default::default();
                    for (offset, (&position, &rotation)) in pos_chunk.iter().zip(rot_chunk).enumerate() {
                        let lod = match pass {
                            ClassificationPass::Main => params.classify_main(position, rotation),
                            ClassificationPass::Shadow => params.classify_shadow(position, rotation),
                        };
                        if let Some(lod) = lod {
                            output.counters[lod].fetch_add(1, Ordering::Relaxed);
                            local[lod].push(base + offset as u32);
                        }
                    }
                    for (list, indices) in output.lists.iter().zip(local) {
                        if !indices.is_empty() {
                            list.lock().extend(indices);
                        }
                    }
                });
            }
        });
    }

    fn read_counters(&self) -> LodCounters {
        LodCounters {
            main: self.main.counts(),
            shadow: self.shadow.counts(),
        }
    }
}
