//! Shedding threshold controller
//!
//! A bounded random walk over heap-usage values. Each heap check commits a
//! new candidate threshold, so consecutive checks probe a range of usages
//! instead of pinning to a single level; a completed collection biases the
//! walk downward.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Fraction of the generation size that bounds the walk from above.
const MAX_FRACTION: f64 = 0.7;
/// Fraction of the generation size where the walk starts.
const START_FRACTION: f64 = 0.5;
/// Fraction of the generation size that bounds the walk from below.
const MIN_FRACTION: f64 = 0.3;
/// Fraction of the generation size drawn as the per-step half-range.
const ENTROPY_FRACTION: f64 = 0.1;

/// Bounded random-walk controller for the heap-usage level at which a
/// collection should be requested.
///
/// Operations are not synchronized; the control engine owns one instance and
/// mutates it only from the check-and-collect activity.
pub struct SheddingThreshold {
    rng: StdRng,
    max: i64,
    min: i64,
    val: i64,
    entropy: i64,
}

impl SheddingThreshold {
    /// Create a controller for a generation of `gen_size` bytes.
    ///
    /// The seed fixes the pseudo-random stream, which keeps cycle decisions
    /// reproducible in tests.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn new(seed: u64, gen_size: i64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max: (MAX_FRACTION * gen_size as f64) as i64,
            min: (MIN_FRACTION * gen_size as f64) as i64,
            val: (START_FRACTION * gen_size as f64) as i64,
            entropy: (ENTROPY_FRACTION * gen_size as f64) as i64,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn next_entropy(&mut self) -> i64 {
        (self.rng.gen::<f64>() * self.entropy as f64) as i64
    }

    fn random_sign(&mut self) -> i64 {
        if self.rng.gen::<f64>() < 0.5 {
            -1
        } else {
            1
        }
    }

    /// Commit and return the next candidate threshold.
    ///
    /// Draws a step of up to `entropy` bytes in a random direction. A
    /// candidate past a bound is folded back inside it with a fresh draw, so
    /// the committed value always lands in `[min, max]`.
    pub fn next_value(&mut self) -> i64 {
        let mut candidate = self.val + self.random_sign() * self.next_entropy();
        if candidate > self.max {
            candidate = self.max - self.next_entropy();
        } else if candidate < self.min {
            candidate = self.min + self.next_entropy();
        }
        self.val = candidate;
        candidate
    }

    /// Bias the walk downward after a collection.
    ///
    /// The lower bound is not re-enforced here; the next
    /// [`next_value`](Self::next_value) call clamps.
    pub fn gc(&mut self) {
        self.val -= self.next_entropy();
    }

    /// Current committed value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.val
    }
}
