//! # Splat Maps and Terrain Extent
//!
//! A splat map is a row-major raster of 4-channel blend weights; texel
//! `(x, y)` covers world X along `x` and world Z along `y`.
//!
//! ```text
//!   v = 1 ┌──────────────┐  origin + size
//!         │              │
//!         │   terrain    │
//!         │              │
//!   v = 0 └──────────────┘
//!      origin  u = 0    u = 1
//! ```
//!
//! Normalized coordinates map onto texel coordinates as `u * (width - 1)`,
//! so the four corners of the terrain hit the four corner texels exactly.

#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use glam::Vec3;

use crate::error::{PlacementError, PlacementResult};
use crate::noise::{NoiseSeed, SimplexNoise};

/// Four layer weights at one texel.
pub type SplatTexel = [f32; 4];

/// A 4-channel terrain weight raster.
#[derive(Debug, Clone, PartialEq)]
pub struct SplatMap {
    width: usize,
    height: usize,
    texels: Vec<SplatTexel>,
}

impl SplatMap {
    /// Wraps an existing raster.
    ///
    /// # Errors
    ///
    /// [`PlacementError::InvalidSplatMap`] when the texel count is not
    /// `width * height` or either dimension is zero.
    pub fn new(width: usize, height: usize, texels: Vec<SplatTexel>) -> PlacementResult<Self> {
        let expected = width * height;
        if expected == 0 || texels.len() != expected {
            return Err(PlacementError::InvalidSplatMap {
                width,
                height,
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// A raster with the same weights everywhere. Dimensions are raised to 1.
    #[must_use]
    pub fn uniform(width: usize, height: usize, weights: SplatTexel) -> Self {
        Self::from_fn(width, height, |_, _| weights)
    }

    /// Builds a raster texel by texel. Dimensions are raised to 1.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> SplatTexel) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut texels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// Fractal octaves layered into a noise mask.
    pub const MASK_OCTAVES: u32 = 3;

    /// Authors a two-layer mask from layered noise.
    ///
    /// Channel 0 is 1 where [`SimplexNoise::fbm`] is positive and 0
    /// elsewhere; channel 1 is its complement; channels 2 and 3 stay 0.
    /// `zoom` is the number of base-octave noise cells across the raster.
    #[must_use]
    pub fn from_noise(width: usize, height: usize, zoom: f64, seed: NoiseSeed) -> Self {
        let noise = SimplexNoise::new(seed);
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;

        Self::from_fn(width, height, |x, y| {
            let value = noise.fbm(
                x as f64 / w * zoom,
                y as f64 / h * zoom,
                Self::MASK_OCTAVES,
                0.5,
                2.0,
            );
            if value > 0.0 {
                [1.0, 0.0, 0.0, 0.0]
            } else {
                [0.0, 1.0, 0.0, 0.0]
            }
        })
    }

    /// Raster width in texels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Raster height in texels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Texel at `(x, y)`, clamped to the raster edge.
    #[inline]
    #[must_use]
    pub fn texel(&self, x: usize, y: usize) -> SplatTexel {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.texels[y * self.width + x]
    }

    /// Nearest-texel lookup at normalized `(u, v)`.
    #[must_use]
    pub fn sample_nearest(&self, u: f32, v: f32) -> SplatTexel {
        let (fx, fy) = self.texel_coords(u, v);
        self.texel(fx.round() as usize, fy.round() as usize)
    }

    /// Bilinear lookup at normalized `(u, v)`: lerp along x on both rows,
    /// then along z between them.
    #[must_use]
    pub fn sample_bilinear(&self, u: f32, v: f32) -> SplatTexel {
        let (fx, fy) = self.texel_coords(u, v);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let bottom = lerp4(self.texel(x0, y0), self.texel(x0 + 1, y0), tx);
        let top = lerp4(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), tx);
        lerp4(bottom, top, ty)
    }

    #[inline]
    fn texel_coords(&self, u: f32, v: f32) -> (f32, f32) {
        (
            u.clamp(0.0, 1.0) * (self.width - 1) as f32,
            v.clamp(0.0, 1.0) * (self.height - 1) as f32,
        )
    }
}

#[inline]
fn lerp4(a: SplatTexel, b: SplatTexel, t: f32) -> SplatTexel {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// World extent of a terrain plus its weight map.
#[derive(Debug, Clone, PartialEq)]
pub struct Terrain {
    /// World position of the lower-left (min X, min Z) corner.
    pub origin: Vec3,
    /// World size; only X and Z are used for placement.
    pub size: Vec3,
    splat: SplatMap,
}

impl Terrain {
    /// Creates a terrain source.
    #[must_use]
    pub fn new(origin: Vec3, size: Vec3, splat: SplatMap) -> Self {
        Self {
            origin,
            size,
            splat,
        }
    }

    /// The terrain's weight map.
    #[inline]
    #[must_use]
    pub fn splat(&self) -> &SplatMap {
        &self.splat
    }

    /// Normalized `(u, v)` of a world position, or `None` when it falls
    /// outside the terrain.
    #[must_use]
    pub fn normalized(&self, world: Vec3) -> Option<(f32, f32)> {
        let u = (world.x - self.origin.x) / self.size.x;
        let v = (world.z - self.origin.z) / self.size.z;
        if (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) {
            Some((u, v))
        } else {
            None
        }
    }

    /// World-space X/Z bounds as `(min, max)` corners.
    #[must_use]
    pub fn xz_bounds(&self) -> ([f32; 2], [f32; 2]) {
        (
            [self.origin.x, self.origin.z],
            [self.origin.x + self.size.x, self.origin.z + self.size.z],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_map() -> SplatMap {
        // channel 0 ramps 0 -> 1 along x, channel 1 ramps along y
        SplatMap::from_fn(3, 3, |x, y| [x as f32 / 2.0, y as f32 / 2.0, 0.0, 0.0])
    }

    #[test]
    fn test_new_rejects_bad_dimensions() {
        assert!(SplatMap::new(2, 2, vec![[0.0; 4]; 3]).is_err());
        assert!(SplatMap::new(0, 4, Vec::new()).is_err());
        assert!(SplatMap::new(2, 2, vec![[0.0; 4]; 4]).is_ok());
    }

    #[test]
    fn test_bilinear_interpolates() {
        let map = gradient_map();
        let mid = map.sample_bilinear(0.25, 0.75);
        assert!((mid[0] - 0.25).abs() < 1e-6, "{mid:?}");
        assert!((mid[1] - 0.75).abs() < 1e-6, "{mid:?}");

        let corner = map.sample_bilinear(1.0, 1.0);
        assert_eq!(corner, [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_nearest_rounds() {
        let map = gradient_map();
        assert_eq!(map.sample_nearest(0.2, 0.8), [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(map.sample_nearest(0.3, 0.1), [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_terrain_normalized_bounds() {
        let terrain = Terrain::new(
            Vec3::new(-50.0, 0.0, 10.0),
            Vec3::new(100.0, 20.0, 40.0),
            SplatMap::uniform(4, 4, [1.0, 0.0, 0.0, 0.0]),
        );

        assert_eq!(terrain.normalized(Vec3::new(0.0, 5.0, 30.0)), Some((0.5, 0.5)));
        assert!(terrain.normalized(Vec3::new(-50.1, 0.0, 10.0)).is_none());
        assert!(terrain.normalized(Vec3::new(0.0, 0.0, 50.5)).is_none());
    }

    #[test]
    fn test_noise_mask_is_binary_and_complementary() {
        let map = SplatMap::from_noise(32, 32, 4.0, NoiseSeed::new(9));
        let mut layer0 = 0;
        for y in 0..32 {
            for x in 0..32 {
                let t = map.texel(x, y);
                assert!(t[0] == 0.0 || t[0] == 1.0);
                assert_eq!(t[0] + t[1], 1.0);
                if t[0] == 1.0 {
                    layer0 += 1;
                }
            }
        }
        println!("noise mask: {layer0}/1024 texels on layer 0");
        assert!(layer0 > 0 && layer0 < 1024, "mask should mix both layers");
    }

    #[test]
    fn test_noise_mask_follows_layered_noise() {
        let seed = NoiseSeed::new(9);
        let map = SplatMap::from_noise(32, 32, 4.0, seed);
        let noise = SimplexNoise::new(seed);
        for (x, y) in [(0, 0), (5, 17), (31, 31), (12, 3)] {
            let (u, v) = (x as f64 / 32.0 * 4.0, y as f64 / 32.0 * 4.0);
            let value = noise.fbm(u, v, SplatMap::MASK_OCTAVES, 0.5, 2.0);
            assert_eq!(map.texel(x, y)[0] == 1.0, value > 0.0, "texel ({x}, {y}) fbm {value}");
        }
        assert_eq!(map, SplatMap::from_noise(32, 32, 4.0, seed));
    }
}
