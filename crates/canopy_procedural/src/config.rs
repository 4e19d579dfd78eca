//! # Placement Configuration
//!
//! Bake settings loaded once from TOML.
//!
//! ```toml
//! name = "pines"
//! strategy = "grid"
//! seed = 7
//! use_custom_data = true
//!
//! [scale]
//! mode = "lock_xz"
//! min = [0.8, 0.9, 0.8]
//! max = [1.3, 1.6, 1.3]
//!
//! [rotation]
//! random_y = true
//!
//! [[rules]]
//! layer = 0
//! density = 2.5
//! jitter = 0.8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, PlacementResult};
use crate::placement::InstanceAttributes;
use crate::rules::{check_range, layer_channel, CustomDataRanges, RotationSpec, ScaleSpec, SpawnRule};

/// Which placement algorithm a bake runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Jittered grid per spawn rule.
    #[default]
    Grid,
    /// Legacy scatter-and-reject on the dominant layer.
    Scatter,
}

/// World-space X/Z rectangle for scatter sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterExtent {
    /// Minimum `(x, z)`.
    pub min: [f32; 2],
    /// Maximum `(x, z)`.
    pub max: [f32; 2],
}

/// Settings of the scatter-and-reject strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterSettings {
    /// Instances to accept.
    pub target_count: usize,
    /// Layer that must dominate at a sample, or `-1` for any.
    pub layer: i32,
    /// Sampling rectangle; the terrain extent when absent.
    pub extent: Option<ScatterExtent>,
    /// Attempt cap; derived from `target_count` when absent.
    pub attempt_budget: Option<u64>,
}

impl ScatterSettings {
    /// Attempts granted per requested instance when no budget is set.
    pub const ATTEMPTS_PER_INSTANCE: u64 = 1_000;
    /// Floor of the derived budget.
    pub const MIN_ATTEMPTS: u64 = 10_000;

    /// Checks the layer selector and the sampling rectangle.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidLayer`], or [`PlacementError::InvalidRange`]
    /// for an extent that is inverted or not finite.
    pub fn validate(&self) -> PlacementResult<()> {
        layer_channel(self.layer)?;
        if let Some(extent) = self.extent {
            for axis in 0..2 {
                check_range("scatter extent", axis, extent.min[axis], extent.max[axis])?;
            }
        }
        Ok(())
    }

    /// The attempt cap actually enforced.
    #[must_use]
    pub fn effective_budget(&self) -> u64 {
        self.attempt_budget.unwrap_or_else(|| {
            (self.target_count as u64)
                .saturating_mul(Self::ATTEMPTS_PER_INSTANCE)
                .max(Self::MIN_ATTEMPTS)
        })
    }
}

impl Default for ScatterSettings {
    fn default() -> Self {
        Self {
            target_count: 1_000,
            layer: SpawnRule::ANY_LAYER,
            extent: None,
            attempt_budget: None,
        }
    }
}

/// Everything one bake needs besides the terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Dataset name.
    pub name: String,
    /// Algorithm to run.
    #[serde(default)]
    pub strategy: PlacementStrategy,
    /// Fixed seed for reproducible bakes; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Generate the per-instance custom-data array.
    #[serde(default)]
    pub use_custom_data: bool,
    /// Scale distribution.
    #[serde(default)]
    pub scale: ScaleSpec,
    /// Rotation axes.
    #[serde(default)]
    pub rotation: RotationSpec,
    /// Custom-data channel ranges.
    #[serde(default)]
    pub custom_data: CustomDataRanges,
    /// Grid spawn rules.
    #[serde(default)]
    pub rules: Vec<SpawnRule>,
    /// Scatter settings.
    #[serde(default)]
    pub scatter: ScatterSettings,
}

impl PlacementConfig {
    /// A grid bake with default attributes.
    #[must_use]
    pub fn grid(name: impl Into<String>, rules: Vec<SpawnRule>) -> Self {
        Self {
            name: name.into(),
            strategy: PlacementStrategy::Grid,
            seed: None,
            use_custom_data: false,
            scale: ScaleSpec::default(),
            rotation: RotationSpec::default(),
            custom_data: CustomDataRanges::default(),
            rules,
            scatter: ScatterSettings::default(),
        }
    }

    /// A scatter bake with default attributes.
    #[must_use]
    pub fn scatter(name: impl Into<String>, scatter: ScatterSettings) -> Self {
        Self {
            strategy: PlacementStrategy::Scatter,
            scatter,
            ..Self::grid(name, Vec::new())
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidConfig`] on syntax errors, or whatever
    /// [`PlacementConfig::validate`] reports.
    pub fn from_toml_str(text: &str) -> PlacementResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PlacementError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidConfig`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> PlacementResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PlacementError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every setting the bake will use.
    ///
    /// # Errors
    ///
    /// The first invalid layer, range or missing rule found.
    pub fn validate(&self) -> PlacementResult<()> {
        self.attributes().validate()?;
        match self.strategy {
            PlacementStrategy::Grid => {
                if self.rules.is_empty() {
                    return Err(PlacementError::InvalidConfig(
                        "grid placement needs at least one spawn rule".into(),
                    ));
                }
                for rule in &self.rules {
                    rule.validate()?;
                }
            }
            PlacementStrategy::Scatter => self.scatter.validate()?,
        }
        Ok(())
    }

    /// Per-instance attribute settings of this bake.
    #[must_use]
    pub fn attributes(&self) -> InstanceAttributes {
        InstanceAttributes {
            scale: self.scale,
            rotation: self.rotation,
            custom_data: self.use_custom_data.then_some(self.custom_data),
        }
    }
}
