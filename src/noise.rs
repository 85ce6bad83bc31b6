// Noise Module - Seeded 3D gradient noise and its fractal (octave) sum
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// World units are multiplied by this before reaching the lattice.
pub const DEFAULT_NOISE_SCALE: f64 = 100_000.0;

// The primitive takes 16.16 fixed-point style input: 65536 steps per lattice cell
const LATTICE_STEPS: f64 = 65_536.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub seed: u64,
    pub scale: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            seed: 0x5eed_1ed5,
            scale: DEFAULT_NOISE_SCALE,
        }
    }
}

/// Deterministic coherent noise field. Cheap to share by reference; holds no
/// per-frame state.
pub struct NoiseField {
    perm: [u8; 512],
    scale: f64,
}

impl NoiseField {
    pub fn new(config: &NoiseConfig) -> Self {
        let mut p: Vec<u8> = (0..=255u8).collect();
        let mut rng = StdRng::seed_from_u64(config.seed);
        p.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = p[i & 255];
        }

        NoiseField { perm, scale: config.scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Single-octave sample in [0, 1].
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let k = self.scale / LATTICE_STEPS;
        let raw = self.perlin(x * k, y * k, z * k);
        ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// One-dimensional driver, used for slowly varying scalars.
    pub fn sample_1d(&self, t: f64) -> f64 {
        self.sample(t, 0.0, 0.0)
    }

    /// Sum of `octaves` samples at doubling frequency and halving amplitude.
    /// Each term is already normalised, so the result lies in [0, 2).
    pub fn fractal_sample(&self, x: f64, y: f64, z: f64, octaves: u32) -> f64 {
        let (mut x, mut y, mut z) = (x, y, z);
        let mut amp = 1.0;
        let mut r = 0.0;
        for _ in 0..octaves {
            r += self.sample(x, y, z) * amp;
            amp *= 0.5;
            x *= 2.0;
            y *= 2.0;
            z *= 2.0;
        }
        r
    }

    fn perlin(&self, x: f64, y: f64, z: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let zf = z.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let zi = (zf as i64 & 255) as usize;
        let x = x - xf;
        let y = y - yf;
        let z = z - zf;

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z)),
                lerp(u, grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z)),
            ),
            lerp(
                v,
                lerp(u, grad(p[aa + 1], x, y, z - 1.0), grad(p[ba + 1], x - 1.0, y, z - 1.0)),
                lerp(
                    u,
                    grad(p[ab + 1], x, y - 1.0, z - 1.0),
                    grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        )
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

// 12 cube-edge gradients, padded to 16
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field() -> NoiseField {
        NoiseField::new(&NoiseConfig::default())
    }

    #[test]
    fn test_sample_range_and_determinism() {
        let a = field();
        let b = field();
        for i in 0..500 {
            let t = i as f64 * 0.0137;
            let v = a.sample(t, -t * 0.5, t * 2.0);
            assert!((0.0..=1.0).contains(&v));
            assert_eq!(v, b.sample(t, -t * 0.5, t * 2.0));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = field();
        let b = NoiseField::new(&NoiseConfig { seed: 7, ..Default::default() });
        let differs = (0..50).any(|i| {
            let t = i as f64 * 0.031;
            a.sample(t, t, t) != b.sample(t, t, t)
        });
        assert!(differs);
    }

    #[test]
    fn test_lattice_points_sit_mid_range() {
        // Gradient noise is zero on integer lattice points
        let f = field();
        let cell = LATTICE_STEPS / f.scale();
        assert!((f.sample(cell * 3.0, cell * 5.0, cell) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_fractal_octaves_bound() {
        let f = field();
        for i in 0..200 {
            let t = i as f64 * 0.021;
            assert_eq!(f.fractal_sample(t, t, t, 1), f.sample(t, t, t));
            let v = f.fractal_sample(t, 0.3 * t, 1.0 - t, 4);
            assert!((0.0..2.0).contains(&v));
        }
        assert_eq!(f.fractal_sample(1.0, 2.0, 3.0, 0), 0.0);
    }

    proptest! {
        #[test]
        fn fractal_sample_is_continuous(
            x in -50.0f64..50.0,
            y in -50.0f64..50.0,
            z in -50.0f64..50.0,
            octaves in 1u32..=4,
        ) {
            let f = field();
            let lattice_per_unit = f.scale() / LATTICE_STEPS;
            let base = f.fractal_sample(x, y, z, octaves);
            let mut previous_bound = f64::INFINITY;
            for eps in [1e-2, 1e-4, 1e-6, 1e-8] {
                let diff = (f.fractal_sample(x + eps, y, z, octaves) - base).abs();
                let bound = 8.0 * eps * lattice_per_unit * (1u32 << octaves) as f64;
                prop_assert!(diff <= bound, "eps={} diff={} bound={}", eps, diff, bound);
                prop_assert!(bound < previous_bound);
                previous_bound = bound;
            }
        }
    }
}
