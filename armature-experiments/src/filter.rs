//! Admission filters
//!
//! A filter decides whether a user without a stored decision enters an
//! experiment at all. Users turned away are excluded for good.

use crate::error::{ExperimentError, ExperimentResult};
use crate::random::{RandomSource, thread_random};
use std::fmt;
use std::sync::Arc;

/// Admission gate for undecided users.
pub trait ParticipationFilter: Send + Sync {
    /// Whether the current user should participate
    fn should_participate(&self) -> bool;
}

/// Admits a fixed share of users.
///
/// `100` always admits and `0` never admits without drawing. Any other
/// probability `P` draws `R` uniformly from the inclusive range `0..=100`
/// and admits when `R <= P`. There are 101 possible draws, so the
/// effective admission rate is `(P + 1) / 101`, slightly above `P / 100`.
///
/// # Examples
///
/// ```
/// use armature_experiments::{ParticipationFilter, Percentage};
///
/// let everyone = Percentage::new(100)?;
/// assert!(everyone.should_participate());
///
/// let nobody = Percentage::new(0)?;
/// assert!(!nobody.should_participate());
/// # Ok::<(), armature_experiments::ExperimentError>(())
/// ```
#[derive(Clone)]
pub struct Percentage {
    probability: u8,
    random: Arc<dyn RandomSource>,
}

impl Percentage {
    /// Create a filter drawing from the thread-local generator
    pub fn new(probability: i32) -> ExperimentResult<Self> {
        Self::with_random(probability, thread_random())
    }

    /// Create a filter drawing from `random`
    pub fn with_random(probability: i32, random: Arc<dyn RandomSource>) -> ExperimentResult<Self> {
        if !(0..=100).contains(&probability) {
            return Err(ExperimentError::InvalidProbability(probability));
        }

        Ok(Self {
            probability: probability as u8,
            random,
        })
    }

    pub fn probability(&self) -> u8 {
        self.probability
    }
}

impl fmt::Debug for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Percentage")
            .field("probability", &self.probability)
            .finish()
    }
}

impl ParticipationFilter for Percentage {
    fn should_participate(&self) -> bool {
        match self.probability {
            100 => true,
            0 => false,
            probability => self.random.between(0, 100) <= u32::from(probability),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{FixedRandom, SeededRandom};
    use proptest::prelude::*;

    #[test]
    fn test_full_probability_always_admits() {
        let random = Arc::new(FixedRandom::always(100));
        let filter = Percentage::with_random(100, random.clone()).unwrap();

        assert!(filter.should_participate());
        assert_eq!(random.draws(), 0);
    }

    #[test]
    fn test_zero_probability_never_draws() {
        let random = Arc::new(FixedRandom::always(0));
        let filter = Percentage::with_random(0, random.clone()).unwrap();

        assert!(!filter.should_participate());
        assert_eq!(random.draws(), 0);
    }

    #[test]
    fn test_low_draw_admits() {
        let filter = Percentage::with_random(23, Arc::new(FixedRandom::always(0))).unwrap();
        assert!(filter.should_participate());
    }

    #[test]
    fn test_high_draw_denies() {
        let filter = Percentage::with_random(23, Arc::new(FixedRandom::always(99))).unwrap();
        assert!(!filter.should_participate());
    }

    #[test]
    fn test_draw_equal_to_probability_admits() {
        let filter = Percentage::with_random(23, Arc::new(FixedRandom::always(23))).unwrap();
        assert!(filter.should_participate());

        let filter = Percentage::with_random(23, Arc::new(FixedRandom::always(24))).unwrap();
        assert!(!filter.should_participate());
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        assert!(matches!(
            Percentage::new(101),
            Err(ExperimentError::InvalidProbability(101))
        ));
        assert!(matches!(
            Percentage::new(-1),
            Err(ExperimentError::InvalidProbability(-1))
        ));
    }

    #[test]
    fn test_inclusive_draw_rate() {
        // 50 admits 51 of the 101 possible draws
        let filter = Percentage::with_random(50, Arc::new(SeededRandom::new(7))).unwrap();
        let admitted = (0..10_000).filter(|_| filter.should_participate()).count();
        assert!((4_700..=5_400).contains(&admitted));
    }

    proptest! {
        #[test]
        fn prop_boundaries_ignore_random_source(seed in any::<u64>(), values in prop::collection::vec(0u32..=100, 0..8)) {
            let full = Percentage::with_random(100, Arc::new(FixedRandom::new(values.clone()))).unwrap();
            let none = Percentage::with_random(0, Arc::new(SeededRandom::new(seed))).unwrap();

            prop_assert!(full.should_participate());
            prop_assert!(!none.should_participate());
        }

        #[test]
        fn prop_admission_matches_draw(probability in 1i32..100, draw in 0u32..=100) {
            let filter = Percentage::with_random(probability, Arc::new(FixedRandom::always(draw))).unwrap();
            prop_assert_eq!(filter.should_participate(), draw <= probability as u32);
        }
    }
}
