//! Instanced-draw records and mesh metadata.
//!
//! ## Key Concepts
//!
//! - **LOD chain**: up to four levels, each a list of submesh draw ranges
//! - **Argument block**: one `DrawIndexedIndirect` record per (LOD, submesh)
//! - **Frame uniforms**: the single per-frame upload

mod gpu_driven;
mod lod;

pub use gpu_driven::{DrawIndexedIndirectArgs, FrameUniforms};
pub use lod::{LodLevel, MeshMetadata, SubmeshRange, MAX_LODS};
