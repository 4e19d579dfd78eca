//! # Canopy Rendering
//!
//! GPU-driven visibility for baked instance populations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PER-FRAME PIPELINE                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Camera → Frustum planes + bounding sphere → FrameUniforms    │
//! │       ↓                                                       │
//! │  Reset counters → Classify (1 unit / instance, atomic += 1)   │
//! │       ↓                                                       │
//! │  Counters → instanceCount of every (LOD, submesh) arg block   │
//! │       ↓                                                       │
//! │  Main / shadow / motion-vector indirect draws                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Instance buffers are uploaded only when the dataset changes
//! - The only per-frame upload is one `FrameUniforms` block
//! - No per-instance CPU work on the resolver side

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod camera;
pub mod culling;
pub mod device;
pub mod error;
pub mod instancing;
pub mod resolver;
pub mod stats;

pub use camera::Camera;
pub use culling::{
    bounding_sphere_from_aabb, extract_frustum_planes, frustum_bounding_sphere, BoundingSphere,
    Frustum, Plane, ShadowRegionPlanes,
};
pub use device::{
    classification_shader, ClassificationDevice, ClassificationPass, CpuClassificationDevice,
    DeviceUpload, InstanceSnapshot, LodCounters,
};
pub use error::{ResolverError, ResolverResult};
pub use instancing::{
    DrawIndexedIndirectArgs, FrameUniforms, LodLevel, MeshMetadata, SubmeshRange, MAX_LODS,
};
pub use resolver::{FrameDraws, FrameParams, IndirectDraw, ResolverConfig, SyncOutcome, VisibilityResolver};
pub use stats::ResolverStats;
