//! # Canopy Procedural Placement
//!
//! Bakes populations of mesh instances over a terrain.
//!
//! ## Design Principles
//!
//! 1. **Explicit context**: terrain and RNG travel in a [`PlacementContext`],
//!    never through globals
//! 2. **Atomic replacement**: a bake produces a whole new [`InstanceArrays`];
//!    datasets are never regenerated incrementally
//! 3. **Bounded**: scatter placement gives up after a fixed attempt budget
//!
//! ## Core Components
//!
//! - `SplatMap` / `Terrain`: 4-channel weight raster and its world extent
//! - `place_grid` / `place_scatter`: the two placement strategies
//! - `InstanceAttributes`: per-instance scale, rotation and custom data
//! - `InstanceDataset`: arrays + dirty flag + modified indices, persistable
//! - `PlacementConfig`: TOML-driven bake settings
//!
//! ## Example
//!
//! ```rust,ignore
//! use canopy_procedural::{bake, PlacementConfig, SplatMap, Terrain};
//!
//! let config = PlacementConfig::from_file("assets/pines.toml".as_ref())?;
//! let terrain = Terrain::new(origin, size, SplatMap::uniform(64, 64, [1.0, 0.0, 0.0, 0.0]));
//! let dataset = bake(&config, Some(&terrain))?;
//! println!("{} pines", dataset.instance_count());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod noise;
pub mod placement;
pub mod rules;
pub mod splat;

pub use config::{PlacementConfig, PlacementStrategy, ScatterExtent, ScatterSettings};
pub use dataset::{InstanceArrays, InstanceDataset, ModifiedIndexSet};
pub use error::{DatasetError, DatasetResult, PlacementError, PlacementResult};
pub use noise::{NoiseSeed, SimplexNoise};
pub use placement::{
    bake, generate, place_grid, place_scatter, InstanceAttributes, PlacementContext,
    PlacementReport,
};
pub use rules::{CustomDataRanges, RotationSpec, ScaleMode, ScaleSpec, SpawnRule};
pub use splat::{SplatMap, Terrain};
