//! Stochastic stopping rule.
//!
//! Consulted once after every accepted estimate: a single independent
//! Bernoulli(alpha) draw, so sequence length before resolution is
//! geometrically distributed, truncated at the capacity cap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::models::MAX_ESTIMATES;

/// Decides after each accepted estimate whether the question resolves.
///
/// The random source is injected at construction so tests can seed it and
/// make resolution deterministic; production wiring seeds from OS entropy.
/// The capacity check runs unconditionally on every consultation - even a
/// degenerate alpha near zero cannot keep a question open past capacity.
#[derive(Debug)]
pub struct StoppingRule {
    rng: Mutex<StdRng>,
    capacity: usize,
}

impl StoppingRule {
    /// Entropy-seeded rule with the standard capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ESTIMATES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            capacity,
        }
    }

    /// Deterministic rule for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::seeded_with_capacity(seed, MAX_ESTIMATES)
    }

    pub fn seeded_with_capacity(seed: u64, capacity: usize) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One memoryless Bernoulli(alpha) trial, OR-ed with the capacity cap
    /// evaluated against the post-append sequence length.
    pub fn should_stop(&self, alpha: f64, sequence_len: usize) -> bool {
        let fired = self
            .rng
            .lock()
            .expect("stopping rule RNG mutex poisoned")
            .gen_bool(alpha);
        fired || sequence_len >= self.capacity
    }
}

impl Default for StoppingRule {
    fn default() -> Self {
        Self::new()
    }
}
