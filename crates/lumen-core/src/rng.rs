//! Random number generator abstraction for determinism.
//!
//! In production, this wraps an OS-seeded RNG. In tests a seeded or
//! recorded implementation is injected so generated idempotency keys are
//! reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;
}

/// Production RNG seeded from the operating system.
#[derive(Debug)]
pub struct SystemRng(StdRng);

impl SystemRng {
    /// Creates an RNG seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl DeterministicRng for SystemRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        self.0.random_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_rng_stays_within_inclusive_bounds() {
        let mut rng = SystemRng::from_entropy();
        for _ in 0..1_000 {
            let value = rng.next_u32_range(3, 5);
            assert!((3..=5).contains(&value));
        }
    }

    #[test]
    fn test_system_rng_handles_degenerate_range() {
        let mut rng = SystemRng::from_entropy();
        assert_eq!(rng.next_u32_range(7, 7), 7);
    }
}
