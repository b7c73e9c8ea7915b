//! Per-tick bookkeeping shared by the GPU engine and the CPU simulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// All passes ran and both ping-pong pairs were swapped.
    Rendered,
    /// No field is loaded yet; nothing was drawn or advanced.
    SkippedNoField,
}

/// Source of the scalar random seed fed to the advection kernel.
///
/// Consecutive seeds always differ so the reseed pattern never repeats
/// between two ticks.
#[derive(Debug, Clone)]
pub struct SeedSource {
    rng: StdRng,
    last: f32,
}

impl SeedSource {
    /// Seeds from OS entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self { rng, last: -1.0 }
    }

    /// Next seed in `[0.001, 1)`.
    pub fn next_seed(&mut self) -> f32 {
        loop {
            let seed = self.rng.gen_range(0.001f32..1.0);
            if seed != self.last {
                self.last = seed;
                return seed;
            }
        }
    }

    /// Underlying generator, for state reseeding.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_seeds_differ() {
        let mut seeds = SeedSource::seeded(42);
        let mut last = seeds.next_seed();
        for _ in 0..10_000 {
            let s = seeds.next_seed();
            assert!(s != last);
            assert!((0.001..1.0).contains(&s));
            last = s;
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a: Vec<f32> = {
            let mut s = SeedSource::seeded(3);
            (0..8).map(|_| s.next_seed()).collect()
        };
        let b: Vec<f32> = {
            let mut s = SeedSource::seeded(3);
            (0..8).map(|_| s.next_seed()).collect()
        };
        assert_eq!(a, b);
    }
}
