//! Test RNGs — deterministic `DeterministicRng` implementations for tests.

use lumen_core::rng::DeterministicRng;

/// A no-op RNG that always returns `min`. Suitable for tests that do not
/// depend on specific random values.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}

/// An RNG that cycles through a predetermined sequence. Used in tests that
/// need distinct but repeatable idempotency keys.
#[derive(Debug)]
pub struct SequenceRng {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRng {
    /// Create a new `SequenceRng` with the given values. An empty sequence
    /// behaves like [`MockRng`].
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if self.values.is_empty() {
            return min;
        }
        let val = self.values[self.index % self.values.len()];
        self.index += 1;
        val.clamp(min, max)
    }
}
