//! Seedable PRNG wrapper (spec.md §4.C).
//!
//! No Mersenne-Twister crate appears anywhere in this project's dependency
//! corpus, so `Random` is backed by `rand_pcg::Pcg64` — a real,
//! statistically strong generator from the same family the pack reaches
//! for elsewhere — behind the spec's `Reset`/`DrawUniform`/`DrawNormal`
//! surface. See DESIGN.md for the full writeup of this substitution.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

pub struct Random {
    rng: Pcg64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn reset(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Continuous uniform distribution, half-open `[min, max)`.
    pub fn draw_uniform_f64(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Discrete uniform distribution, closed `[min, max]`.
    pub fn draw_uniform_i32(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Normal distribution via the Box–Muller transform, avoiding a
    /// dependency on a distributions crate this pack never reaches for.
    pub fn draw_normal(&mut self, mean: f64, variance: f64) -> f64 {
        let u1: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.random::<f64>();
        let z0 = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        mean + z0 * variance.sqrt()
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Control-thread RNG instance (performer task tie-breaking, stochastic
/// slice selection). Never shared with [`AudioRng`].
pub struct MainRng(Random);

impl MainRng {
    pub fn new(seed: u64) -> Self {
        Self(Random::new(seed))
    }
}

impl std::ops::Deref for MainRng {
    type Target = Random;
    fn deref(&self) -> &Random {
        &self.0
    }
}

impl std::ops::DerefMut for MainRng {
    fn deref_mut(&mut self) -> &mut Random {
        &mut self.0
    }
}

/// Audio-thread RNG instance (noise oscillator). Never shared with
/// [`MainRng`].
pub struct AudioRng(Random);

impl AudioRng {
    pub fn new(seed: u64) -> Self {
        Self(Random::new(seed))
    }
}

impl std::ops::Deref for AudioRng {
    type Target = Random;
    fn deref(&self) -> &Random {
        &self.0
    }
}

impl std::ops::DerefMut for AudioRng {
    fn deref_mut(&mut self) -> &mut Random {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_f64_stays_in_half_open_range() {
        let mut rng = Random::new(1);
        for _ in 0..1000 {
            let value = rng.draw_uniform_f64(-1.0, 1.0);
            assert!(value >= -1.0 && value < 1.0);
        }
    }

    #[test]
    fn uniform_i32_stays_in_closed_range() {
        let mut rng = Random::new(2);
        for _ in 0..1000 {
            let value = rng.draw_uniform_i32(0, 3);
            assert!((0..=3).contains(&value));
        }
    }

    #[test]
    fn reset_with_same_seed_reproduces_sequence() {
        let mut a = Random::new(7);
        let first: Vec<f64> = (0..10).map(|_| a.draw_uniform_f64(0.0, 1.0)).collect();
        a.reset(7);
        let second: Vec<f64> = (0..10).map(|_| a.draw_uniform_f64(0.0, 1.0)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn normal_distribution_centers_near_mean() {
        let mut rng = Random::new(3);
        let samples: Vec<f64> = (0..10_000).map(|_| rng.draw_normal(5.0, 1.0)).collect();
        let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - 5.0).abs() < 0.2, "mean was {mean}");
    }
}
