//! # Simplex Noise
//!
//! Deterministic 2D simplex noise used to author splat masks when no painted
//! weight map exists.
//!
//! ## Determinism Guarantee
//!
//! The permutation is shuffled by a `ChaCha8Rng` seeded from [`NoiseSeed`],
//! whose output stream is fixed across platforms and `rand` releases. Same
//! seed, same mask.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed for noise-authored masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoiseSeed(u64);

impl NoiseSeed {
    /// Creates a new seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Default for NoiseSeed {
    fn default() -> Self {
        Self(0x5EED_CA40_9F1E_1D00)
    }
}

/// Eight unit-ish gradient directions.
const GRADIENTS: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [0.707_106_78, 0.707_106_78],
    [-0.707_106_78, 0.707_106_78],
    [0.707_106_78, -0.707_106_78],
    [-0.707_106_78, -0.707_106_78],
];

/// 2D simplex noise generator producing values in `[-1, 1]`.
pub struct SimplexNoise {
    /// 256-entry permutation, doubled so `perm[i + perm[j]]` never wraps.
    perm: [u8; 512],
}

impl SimplexNoise {
    /// Skewing factor: (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_439;
    /// Unskewing factor: (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187;

    /// Creates a generator from a seed.
    #[must_use]
    pub fn new(seed: NoiseSeed) -> Self {
        let mut shuffled: Vec<u8> = (0..=255).collect();
        shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(seed.value()));

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = shuffled[i & 255];
        }
        Self { perm }
    }

    /// Samples noise at `(x, y)`, in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = (x + skew).floor();
        let j = (y + skew).floor();

        let unskew = (i + j) * Self::G2;
        let x0 = x - (i - unskew);
        let y0 = y - (j - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + Self::G2;
        let y1 = y0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        // rem_euclid keeps negative lattice coordinates inside the table
        let ii = i.rem_euclid(256.0) as usize;
        let jj = j.rem_euclid(256.0) as usize;

        let h0 = self.hash(ii, jj);
        let h1 = self.hash(ii + i1 as usize, jj + j1 as usize);
        let h2 = self.hash(ii + 1, jj + 1);

        70.0 * (corner(x0, y0, h0) + corner(x1, y1, h1) + corner(x2, y2, h2))
    }

    /// Fractal sum of `octaves` layers, normalized back to roughly `[-1, 1]`.
    #[must_use]
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut norm = 0.0;

        for _ in 0..octaves {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            norm += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        if norm > 0.0 {
            total / norm
        } else {
            0.0
        }
    }

    #[inline]
    fn hash(&self, i: usize, j: usize) -> u8 {
        self.perm[(i + self.perm[j & 511] as usize) & 511]
    }
}

#[inline]
fn corner(x: f64, y: f64, hash: u8) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let g = GRADIENTS[(hash & 7) as usize];
    let t2 = t * t;
    t2 * t2 * (x * g[0] + y * g[1])
}
