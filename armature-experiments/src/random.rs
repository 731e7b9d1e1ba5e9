//! Randomness providers for filters and choosers.
//!
//! Strategies never reach for a process-wide generator directly; they draw
//! from a [`RandomSource`] so tests can pin the outcome.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of uniformly distributed integers.
pub trait RandomSource: Send + Sync {
    /// Draw an integer in the inclusive range `[low, high]`.
    ///
    /// Callers guarantee `low <= high`.
    fn between(&self, low: u32, high: u32) -> u32;
}

/// Thread-local generator from `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn between(&self, low: u32, high: u32) -> u32 {
        rand::rng().random_range(low..=high)
    }
}

/// Seeded generator; identical seeds yield identical sequences.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn between(&self, low: u32, high: u32) -> u32 {
        self.rng.lock().random_range(low..=high)
    }
}

/// Replays a fixed sequence of values, clamped into the requested range.
///
/// The sequence wraps around once exhausted.
#[derive(Debug)]
pub struct FixedRandom {
    values: Vec<u32>,
    cursor: AtomicUsize,
}

impl FixedRandom {
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always return `value`
    pub fn always(value: u32) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws so far
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for FixedRandom {
    fn between(&self, low: u32, high: u32) -> u32 {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let value = match self.values.len() {
            0 => low,
            len => self.values[index % len],
        };
        value.clamp(low, high)
    }
}

/// Shared default provider.
pub fn thread_random() -> Arc<dyn RandomSource> {
    Arc::new(ThreadRandom)
}
