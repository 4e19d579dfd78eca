//! # Spawn Rules and Attribute Specs
//!
//! Plain, serde-friendly settings describing where instances go and how each
//! one is scaled, rotated and tinted.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use canopy_shared::rotation_from_euler_degrees;

use crate::error::{PlacementError, PlacementResult};

/// Validates a layer selector, returning the channel it addresses
/// (`None` for "any layer").
///
/// # Errors
///
/// [`PlacementError::InvalidLayer`] for anything but `-1` or `0..=3`.
pub fn layer_channel(layer: i32) -> PlacementResult<Option<usize>> {
    match layer {
        -1 => Ok(None),
        0..=3 => Ok(Some(layer as usize)),
        other => Err(PlacementError::InvalidLayer(other)),
    }
}

/// One density rule of the grid strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRule {
    /// Splat channel to follow, or [`SpawnRule::ANY_LAYER`].
    #[serde(default = "any_layer")]
    pub layer: i32,
    /// Target instances per 100 square world units.
    pub density: f32,
    /// Fraction of half a grid cell each point may wander, in `[0, 1]`.
    #[serde(default)]
    pub jitter: f32,
}

fn any_layer() -> i32 {
    SpawnRule::ANY_LAYER
}

impl SpawnRule {
    /// Layer selector meaning "accept regardless of splat weights".
    pub const ANY_LAYER: i32 = -1;

    /// Most grid candidates one rule may evaluate.
    pub const MAX_GRID_CELLS: u64 = 1 << 26;

    /// Creates a rule.
    #[must_use]
    pub const fn new(layer: i32, density: f32, jitter: f32) -> Self {
        Self {
            layer,
            density,
            jitter,
        }
    }

    /// Checks the layer selector and density.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidLayer`] or [`PlacementError::InvalidConfig`].
    pub fn validate(&self) -> PlacementResult<()> {
        layer_channel(self.layer)?;
        if !self.density.is_finite() {
            return Err(PlacementError::InvalidConfig(format!(
                "spawn rule density must be finite, got {}",
                self.density
            )));
        }
        Ok(())
    }

    /// Grid cells per axis over a terrain of the given world size:
    /// `ceil(sqrt(|size.x * size.z * density / 100|))`.
    #[must_use]
    pub fn cells_per_axis(&self, size: Vec3) -> usize {
        (size.x * size.z * self.density / 100.0).abs().sqrt().ceil() as usize
    }

    /// [`SpawnRule::cells_per_axis`], refusing grids above
    /// [`SpawnRule::MAX_GRID_CELLS`] candidates.
    ///
    /// # Errors
    ///
    /// [`PlacementError::GridTooDense`].
    pub fn checked_cells_per_axis(&self, size: Vec3) -> PlacementResult<usize> {
        // non-finite sizes saturate the cast, so the product check catches them too
        let cells = self.cells_per_axis(size);
        let total = (cells as u64).checked_mul(cells as u64);
        match total {
            Some(total) if total <= Self::MAX_GRID_CELLS => Ok(cells),
            _ => Err(PlacementError::GridTooDense {
                layer: self.layer,
                density: self.density,
                limit: Self::MAX_GRID_CELLS,
            }),
        }
    }
}

/// How the three scale components relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// One draw in `[min.x, max.x]` for all axes.
    #[default]
    Uniform,
    /// Independent draw per axis.
    Freeform,
    /// Independent X and Y draws; Z copies X exactly.
    LockXz,
}

/// Per-instance scale distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    /// Relationship between axes.
    #[serde(default)]
    pub mode: ScaleMode,
    /// Per-axis lower bound.
    pub min: [f32; 3],
    /// Per-axis upper bound.
    pub max: [f32; 3],
}

impl Default for ScaleSpec {
    fn default() -> Self {
        Self {
            mode: ScaleMode::Uniform,
            min: [1.0; 3],
            max: [1.0; 3],
        }
    }
}

impl ScaleSpec {
    /// Checks every axis is a finite, non-negative, ordered range.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidRange`] naming the first bad axis.
    pub fn validate(&self) -> PlacementResult<()> {
        for axis in 0..3 {
            check_range("scale", axis, self.min[axis], self.max[axis])?;
            if self.min[axis] < 0.0 {
                return Err(PlacementError::InvalidRange {
                    what: "scale",
                    axis,
                    min: self.min[axis],
                    max: self.max[axis],
                });
            }
        }
        Ok(())
    }

    /// Draws one scale vector.
    pub fn sample(&self, rng: &mut impl Rng) -> Vec3 {
        let [min_x, min_y, min_z] = self.min;
        let [max_x, max_y, max_z] = self.max;
        match self.mode {
            ScaleMode::Uniform => Vec3::splat(rng.gen_range(min_x..=max_x)),
            ScaleMode::Freeform => Vec3::new(
                rng.gen_range(min_x..=max_x),
                rng.gen_range(min_y..=max_y),
                rng.gen_range(min_z..=max_z),
            ),
            ScaleMode::LockXz => {
                let x = rng.gen_range(min_x..=max_x);
                let y = rng.gen_range(min_y..=max_y);
                Vec3::new(x, y, x)
            }
        }
    }
}

/// Which axes receive a random rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSpec {
    /// Randomize pitch.
    #[serde(default)]
    pub random_x: bool,
    /// Randomize yaw.
    #[serde(default = "yes")]
    pub random_y: bool,
    /// Randomize roll.
    #[serde(default)]
    pub random_z: bool,
}

fn yes() -> bool {
    true
}

impl Default for RotationSpec {
    fn default() -> Self {
        Self {
            random_x: false,
            random_y: true,
            random_z: false,
        }
    }
}

impl RotationSpec {
    /// Draws one rotation: each enabled axis gets a uniform angle in
    /// `[0, 360)` degrees, disabled axes stay at 0.
    pub fn sample(&self, rng: &mut impl Rng) -> Quat {
        let mut angle = |enabled: bool| {
            if enabled {
                rng.gen::<f32>() * 360.0
            } else {
                0.0
            }
        };
        let x = angle(self.random_x);
        let y = angle(self.random_y);
        let z = angle(self.random_z);
        rotation_from_euler_degrees(Vec3::new(x, y, z))
    }
}

/// Ranges of the four custom-data channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomDataRanges {
    /// Red tint.
    pub r: [f32; 2],
    /// Green tint.
    pub g: [f32; 2],
    /// Blue tint.
    pub b: [f32; 2],
    /// Free-form fourth channel.
    pub w: [f32; 2],
}

impl Default for CustomDataRanges {
    fn default() -> Self {
        Self {
            r: [0.7, 1.1],
            g: [0.85, 1.1],
            b: [0.6, 1.0],
            w: [0.3, 300_000.0],
        }
    }
}

impl CustomDataRanges {
    /// Checks each channel range is finite and ordered.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidRange`] naming the first bad channel.
    pub fn validate(&self) -> PlacementResult<()> {
        for (channel, [lo, hi]) in [self.r, self.g, self.b, self.w].into_iter().enumerate() {
            check_range("custom data", channel, lo, hi)?;
        }
        Ok(())
    }

    /// Draws four independent channel values.
    pub fn sample(&self, rng: &mut impl Rng) -> [f32; 4] {
        [
            rng.gen_range(self.r[0]..=self.r[1]),
            rng.gen_range(self.g[0]..=self.g[1]),
            rng.gen_range(self.b[0]..=self.b[1]),
            rng.gen_range(self.w[0]..=self.w[1]),
        ]
    }
}

pub(crate) fn check_range(what: &'static str, axis: usize, min: f32, max: f32) -> PlacementResult<()> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(PlacementError::InvalidRange {
            what,
            axis,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_layer_channel() {
        assert_eq!(layer_channel(-1).unwrap(), None);
        assert_eq!(layer_channel(3).unwrap(), Some(3));
        assert!(matches!(layer_channel(4), Err(PlacementError::InvalidLayer(4))));
        assert!(matches!(layer_channel(-2), Err(PlacementError::InvalidLayer(-2))));
    }

    #[test]
    fn test_cells_per_axis() {
        let rule = SpawnRule::new(-1, 3.0, 0.0);
        // 100 * 100 * 3 / 100 = 300 -> sqrt = 17.32 -> 18
        assert_eq!(rule.cells_per_axis(Vec3::new(100.0, 0.0, 100.0)), 18);
        assert_eq!(SpawnRule::new(-1, 0.0, 0.0).cells_per_axis(Vec3::splat(100.0)), 0);
        // negative density uses the magnitude
        assert_eq!(SpawnRule::new(-1, -1.0, 0.0).cells_per_axis(Vec3::splat(100.0)), 10);
    }

    #[test]
    fn test_checked_cells_caps_dense_grids() {
        let size = Vec3::new(100.0, 0.0, 100.0);
        assert_eq!(SpawnRule::new(-1, 3.0, 0.0).checked_cells_per_axis(size).unwrap(), 18);

        // 8192^2 = 2^26 candidates is the largest grid allowed
        let at_limit = SpawnRule::new(-1, 8192.0 * 8192.0 / 100.0, 0.0);
        assert_eq!(at_limit.checked_cells_per_axis(size).unwrap(), 8192);

        let dense = SpawnRule::new(2, 1.0e9, 0.0);
        assert!(matches!(
            dense.checked_cells_per_axis(size),
            Err(PlacementError::GridTooDense { layer: 2, .. })
        ));
        let huge = SpawnRule::new(-1, f32::MAX, 0.0);
        assert!(huge.checked_cells_per_axis(Vec3::splat(1.0e30)).is_err());
    }

    #[test]
    fn test_lock_xz_copies_x() {
        let spec = ScaleSpec {
            mode: ScaleMode::LockXz,
            min: [0.5, 2.0, 0.1],
            max: [1.5, 3.0, 0.2],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1_000 {
            let s = spec.sample(&mut rng);
            assert_eq!(s.x, s.z);
            assert!((0.5..=1.5).contains(&s.x));
            assert!((2.0..=3.0).contains(&s.y));
        }
    }

    #[test]
    fn test_uniform_and_freeform() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let uniform = ScaleSpec {
            mode: ScaleMode::Uniform,
            min: [0.8, 5.0, 5.0],
            max: [1.2, 6.0, 6.0],
        };
        let s = uniform.sample(&mut rng);
        assert!(s.x == s.y && s.y == s.z);
        assert!((0.8..=1.2).contains(&s.x), "uniform ignores y/z ranges");

        let fixed = ScaleSpec {
            mode: ScaleMode::Freeform,
            min: [1.0, 2.0, 3.0],
            max: [1.0, 2.0, 3.0],
        };
        assert_eq!(fixed.sample(&mut rng), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_scale_validation() {
        let mut spec = ScaleSpec::default();
        assert!(spec.validate().is_ok());
        spec.min[1] = 2.0;
        assert!(matches!(spec.validate(), Err(PlacementError::InvalidRange { axis: 1, .. })));
        spec.min[1] = -1.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_rotation_only_enabled_axes() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let spec = RotationSpec::default();
        for _ in 0..100 {
            let q = spec.sample(&mut rng);
            // Yaw-only rotations keep the up axis fixed.
            let up = q * Vec3::Y;
            assert!((up - Vec3::Y).length() < 1e-5, "{up:?}");
        }

        let none = RotationSpec {
            random_x: false,
            random_y: false,
            random_z: false,
        };
        assert!(none.sample(&mut rng).abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn test_custom_data_ranges() {
        let ranges = CustomDataRanges::default();
        assert!(ranges.validate().is_ok());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..1_000 {
            let [r, g, b, w] = ranges.sample(&mut rng);
            assert!((0.7..=1.1).contains(&r));
            assert!((0.85..=1.1).contains(&g));
            assert!((0.6..=1.0).contains(&b));
            assert!((0.3..=300_000.0).contains(&w));
        }
    }
}
