//! # Instance Placement
//!
//! Two strategies turn a terrain and its splat map into instance arrays.
//!
//! ## Jittered Grid (preferred)
//!
//! ```text
//!   per rule:  N = ceil(sqrt(|size.x * size.z * density / 100|))
//!              step = 1 / N            (normalized)
//!              jitter = clamp01(j) * step * 0.5 * size   (world, per axis)
//!
//!   ┌───┬───┬───┐   each cell corner + uniform offset in [-jitter, +jitter]
//!   │ • │  •│ • │   layer == -1 → keep
//!   ├───┼───┼───┤   otherwise   → w = bilinear(splat)[layer]
//!   │•  │ • │  •│                 keep iff w > 0 && w > U[0, 1)
//!   └───┴───┴───┘
//! ```
//!
//! Accepted positions of all rules are concatenated, then every instance
//! draws its scale, rotation and custom data.
//!
//! ## Scatter-and-Reject (legacy)
//!
//! Uniform `(x, z)` samples inside an extent; a sample is kept when the
//! requested layer dominates the nearest texel. Each acceptance draws its own
//! attributes immediately. The loop is capped by an attempt budget.

#![allow(clippy::cast_precision_loss)]

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use canopy_shared::{pack_scale, Float4};

use crate::config::{PlacementConfig, PlacementStrategy, ScatterSettings};
use crate::dataset::{InstanceArrays, InstanceDataset};
use crate::error::{PlacementError, PlacementResult};
use crate::rules::{layer_channel, CustomDataRanges, RotationSpec, ScaleSpec, SpawnRule};
use crate::splat::Terrain;

/// Terrain source and random stream of one placement run.
pub struct PlacementContext<'t> {
    terrain: Option<&'t Terrain>,
    rng: ChaCha8Rng,
}

impl<'t> PlacementContext<'t> {
    /// A context drawing from OS entropy. Runs are not reproducible.
    #[must_use]
    pub fn new(terrain: Option<&'t Terrain>) -> Self {
        Self {
            terrain,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// A context with a fixed seed. Same seed + same inputs = same output.
    #[must_use]
    pub fn seeded(terrain: Option<&'t Terrain>, seed: u64) -> Self {
        Self {
            terrain,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The terrain source.
    ///
    /// # Errors
    ///
    /// [`PlacementError::MissingTerrainSource`] when none was supplied.
    pub fn terrain(&self) -> PlacementResult<&'t Terrain> {
        self.terrain.ok_or(PlacementError::MissingTerrainSource)
    }

    /// The random stream.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

/// Counters describing one placement run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementReport {
    /// Candidate points evaluated.
    pub attempts: u64,
    /// Points kept.
    pub accepted: usize,
    /// Points discarded by the layer test.
    pub rejected: usize,
    /// Points discarded because they fell outside the terrain.
    pub out_of_bounds: usize,
}

/// Per-instance attribute distributions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InstanceAttributes {
    /// Scale distribution.
    pub scale: ScaleSpec,
    /// Rotation axes.
    pub rotation: RotationSpec,
    /// Custom-data ranges; `None` skips the custom-data array entirely.
    pub custom_data: Option<CustomDataRanges>,
}

impl InstanceAttributes {
    /// Checks scale and custom-data ranges.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidRange`].
    pub fn validate(&self) -> PlacementResult<()> {
        self.scale.validate()?;
        if let Some(ranges) = &self.custom_data {
            ranges.validate()?;
        }
        Ok(())
    }

    /// Draws attributes for every position, in order.
    ///
    /// # Errors
    ///
    /// [`PlacementError::Codec`] when a drawn scale cannot be packed.
    pub fn build(&self, positions: &[Vec3], rng: &mut impl Rng) -> PlacementResult<InstanceArrays> {
        let mut builder = ArrayBuilder::with_capacity(positions.len(), self.custom_data.is_some());
        for &position in positions {
            builder.push(position, self, rng)?;
        }
        builder.finish()
    }
}

/// Accumulates the parallel arrays while keeping them the same length.
struct ArrayBuilder {
    positions: Vec<Float4>,
    rotations: Vec<Float4>,
    custom_data: Option<Vec<Float4>>,
}

impl ArrayBuilder {
    fn with_capacity(capacity: usize, custom: bool) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            rotations: Vec::with_capacity(capacity),
            custom_data: custom.then(|| Vec::with_capacity(capacity)),
        }
    }

    fn push(
        &mut self,
        position: Vec3,
        attributes: &InstanceAttributes,
        rng: &mut impl Rng,
    ) -> PlacementResult<()> {
        let packed = pack_scale(attributes.scale.sample(rng))?;
        let rotation = attributes.rotation.sample(rng);

        self.positions.push([position.x, position.y, position.z, packed]);
        self.rotations.push(rotation.to_array());
        if let (Some(out), Some(ranges)) = (self.custom_data.as_mut(), &attributes.custom_data) {
            out.push(ranges.sample(rng));
        }
        Ok(())
    }

    fn finish(self) -> PlacementResult<InstanceArrays> {
        Ok(InstanceArrays::new(self.positions, self.rotations, self.custom_data)?)
    }
}

/// Accepted grid positions of every rule, concatenated in rule order.
///
/// Within a rule, cells are visited x-major: `(0,0), (0,1), ..., (1,0), ...`.
///
/// # Errors
///
/// [`PlacementError::MissingTerrainSource`] or an invalid rule.
pub fn grid_positions(
    ctx: &mut PlacementContext<'_>,
    rules: &[SpawnRule],
    report: &mut PlacementReport,
) -> PlacementResult<Vec<Vec3>> {
    let terrain = ctx.terrain()?;
    let mut positions = Vec::new();

    for rule in rules {
        rule.validate()?;
        let channel = layer_channel(rule.layer)?;
        let cells = rule.checked_cells_per_axis(terrain.size)?;
        if cells == 0 {
            continue;
        }

        let step = 1.0 / cells as f32;
        let spread = rule.jitter.clamp(0.0, 1.0) * step * 0.5;
        let max_jitter_x = spread * terrain.size.x;
        let max_jitter_z = spread * terrain.size.z;

        let before = positions.len();
        for x in 0..cells {
            for z in 0..cells {
                report.attempts += 1;
                let corner_x = terrain.origin.x + x as f32 * step * terrain.size.x;
                let corner_z = terrain.origin.z + z as f32 * step * terrain.size.z;
                let position = Vec3::new(
                    corner_x + ctx.rng.gen_range(-1.0f32..=1.0) * max_jitter_x,
                    0.0,
                    corner_z + ctx.rng.gen_range(-1.0f32..=1.0) * max_jitter_z,
                );

                let Some(channel) = channel else {
                    positions.push(position);
                    continue;
                };

                let Some((u, v)) = terrain.normalized(position) else {
                    report.out_of_bounds += 1;
                    tracing::debug!(
                        "Grid sample ({:.2}, {:.2}) outside terrain, rejected",
                        position.x,
                        position.z
                    );
                    continue;
                };

                let weight = terrain.splat().sample_bilinear(u, v)[channel];
                if weight > 0.0 && weight > ctx.rng.gen::<f32>() {
                    positions.push(position);
                } else {
                    report.rejected += 1;
                }
            }
        }

        tracing::debug!(
            "Rule layer={} density={}: {}x{} cells, {} accepted",
            rule.layer,
            rule.density,
            cells,
            cells,
            positions.len() - before
        );
    }

    report.accepted += positions.len();
    Ok(positions)
}

/// Runs the jittered-grid strategy.
///
/// # Errors
///
/// [`InstanceAttributes::validate`] failures, then see [`grid_positions`]
/// and [`InstanceAttributes::build`].
pub fn place_grid(
    ctx: &mut PlacementContext<'_>,
    rules: &[SpawnRule],
    attributes: &InstanceAttributes,
) -> PlacementResult<(InstanceArrays, PlacementReport)> {
    attributes.validate()?;
    let mut report = PlacementReport::default();
    let positions = grid_positions(ctx, rules, &mut report)?;
    let arrays = attributes.build(&positions, &mut ctx.rng)?;

    if report.out_of_bounds > 0 {
        tracing::info!(
            "{} grid samples fell outside the terrain and were skipped",
            report.out_of_bounds
        );
    }
    Ok((arrays, report))
}

/// Runs the scatter-and-reject strategy.
///
/// # Errors
///
/// - [`PlacementError::InvalidLayer`] or [`PlacementError::InvalidRange`]
///   from settings or attribute validation
/// - [`PlacementError::MissingTerrainSource`]
/// - [`PlacementError::ExhaustedAttempts`] when the budget runs out first
pub fn place_scatter(
    ctx: &mut PlacementContext<'_>,
    settings: &ScatterSettings,
    attributes: &InstanceAttributes,
) -> PlacementResult<(InstanceArrays, PlacementReport)> {
    settings.validate()?;
    attributes.validate()?;
    let terrain = ctx.terrain()?;
    let channel = layer_channel(settings.layer)?;
    let (min, max) = settings
        .extent
        .map_or_else(|| terrain.xz_bounds(), |e| (e.min, e.max));
    let budget = settings.effective_budget();

    let mut report = PlacementReport::default();
    let mut builder = ArrayBuilder::with_capacity(settings.target_count, attributes.custom_data.is_some());

    while report.accepted < settings.target_count {
        if report.attempts >= budget {
            tracing::warn!(
                "Scatter gave up after {} attempts with {}/{} instances",
                report.attempts,
                report.accepted,
                settings.target_count
            );
            return Err(PlacementError::ExhaustedAttempts {
                accepted: report.accepted,
                target: settings.target_count,
                attempts: report.attempts,
            });
        }
        report.attempts += 1;

        let position = Vec3::new(
            ctx.rng.gen_range(min[0]..=max[0]),
            0.0,
            ctx.rng.gen_range(min[1]..=max[1]),
        );

        if let Some(channel) = channel {
            let Some((u, v)) = terrain.normalized(position) else {
                report.out_of_bounds += 1;
                tracing::debug!(
                    "Scatter sample ({:.2}, {:.2}) outside terrain, rejected",
                    position.x,
                    position.z
                );
                continue;
            };
            let texel = terrain.splat().sample_nearest(u, v);
            let dominant = texel.iter().copied().fold(f32::MIN, f32::max);
            if (texel[channel] - dominant).abs() > f32::EPSILON {
                report.rejected += 1;
                continue;
            }
        }

        builder.push(position, attributes, &mut ctx.rng)?;
        report.accepted += 1;
    }

    Ok((builder.finish()?, report))
}

/// Runs whichever strategy `config` selects.
///
/// # Errors
///
/// Validation errors, then whatever the strategy reports.
pub fn generate(
    config: &PlacementConfig,
    ctx: &mut PlacementContext<'_>,
) -> PlacementResult<(InstanceArrays, PlacementReport)> {
    config.validate()?;
    let attributes = config.attributes();
    match config.strategy {
        PlacementStrategy::Grid => place_grid(ctx, &config.rules, &attributes),
        PlacementStrategy::Scatter => place_scatter(ctx, &config.scatter, &attributes),
    }
}

/// One-call bake: builds the context from `config.seed`, places, and wraps
/// the result in a fresh dirty dataset.
///
/// # Errors
///
/// See [`generate`].
pub fn bake(config: &PlacementConfig, terrain: Option<&Terrain>) -> PlacementResult<InstanceDataset> {
    let mut ctx = match config.seed {
        Some(seed) => PlacementContext::seeded(terrain, seed),
        None => PlacementContext::new(terrain),
    };
    let (arrays, report) = generate(config, &mut ctx)?;

    tracing::info!(
        "Baked '{}': {} instances ({} attempts, {} rejected, {} out of bounds)",
        config.name,
        arrays.len(),
        report.attempts,
        report.rejected,
        report.out_of_bounds
    );
    Ok(InstanceDataset::with_arrays(config.name.clone(), arrays))
}
