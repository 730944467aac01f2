//! Fault decisions.
//!
//! A [`FaultPolicy`] answers "fail now?" at the two checkpoints of every
//! operation. Each answer consumes one draw from a [`BernoulliSource`]
//! unless a one-shot override is pending, in which case the override is
//! consumed instead.

use std::mem;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of independent yes/no draws.
pub trait BernoulliSource: Send {
    fn draw(&mut self) -> bool;
}

/// Draws `true` with a fixed probability from a seeded `SmallRng`.
pub struct SeededBernoulli {
    rng: SmallRng,
    probability: f64,
}

impl SeededBernoulli {
    pub fn new(probability: f64, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            probability: clamp_probability(probability),
        }
    }
}

impl BernoulliSource for SeededBernoulli {
    fn draw(&mut self) -> bool {
        self.rng.r#gen::<f64>() < self.probability
    }
}

/// Clamps into `[0, 1]`; NaN becomes 0.
pub fn clamp_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

/// Returns `seed`, or a fresh non-zero random seed when it is 0.
pub fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    loop {
        let fresh = rand::random::<u64>();
        if fresh != 0 {
            return fresh;
        }
    }
}

/// Seeded fault decision source with one-shot overrides.
pub struct FaultPolicy {
    probability: f64,
    seed: u64,
    source: Box<dyn BernoulliSource>,
    must_fail_before: bool,
    must_fail_after: bool,
}

impl FaultPolicy {
    /// Creates a policy drawing from [`SeededBernoulli`].
    pub fn new(probability: f64, seed: u64) -> Self {
        let probability = clamp_probability(probability);
        let seed = resolve_seed(seed);
        Self::with_source(probability, seed, Box::new(SeededBernoulli::new(probability, seed)))
    }

    /// Creates a policy drawing from `source`. `seed` is only reported in
    /// diagnostics; `probability` gates whether `source` is consulted.
    pub fn with_source(probability: f64, seed: u64, source: Box<dyn BernoulliSource>) -> Self {
        Self {
            probability: clamp_probability(probability),
            seed,
            source,
            must_fail_before: false,
            must_fail_after: false,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether random faults can happen at all.
    pub fn is_active(&self) -> bool {
        self.probability > 0.0
    }

    /// Decides whether to fail before the operation runs.
    pub fn decide_before(&mut self) -> bool {
        mem::take(&mut self.must_fail_before) || self.draw()
    }

    /// Decides whether to fail after the operation ran.
    pub fn decide_after(&mut self) -> bool {
        mem::take(&mut self.must_fail_after) || self.draw()
    }

    /// Forces the next before-checkpoint to fail.
    pub fn force_next_before(&mut self) {
        self.must_fail_before = true;
    }

    /// Forces the next after-checkpoint to fail.
    pub fn force_next_after(&mut self) {
        self.must_fail_after = true;
    }

    fn draw(&mut self) -> bool {
        // A disabled policy never touches its source.
        self.is_active() && self.source.draw()
    }
}

impl std::fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultPolicy")
            .field("probability", &self.probability)
            .field("seed", &self.seed)
            .field("must_fail_before", &self.must_fail_before)
            .field("must_fail_after", &self.must_fail_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    /// Counts draws and always answers `answer`.
    struct CountingSource {
        draws: Arc<AtomicUsize>,
        answer: bool,
    }

    impl BernoulliSource for CountingSource {
        fn draw(&mut self) -> bool {
            self.draws.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn counting(probability: f64, answer: bool) -> (FaultPolicy, Arc<AtomicUsize>) {
        let draws = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            draws: Arc::clone(&draws),
            answer,
        };
        (FaultPolicy::with_source(probability, 1, Box::new(source)), draws)
    }

    #[test_case(-0.5 => 0.0; "negative")]
    #[test_case(1.5 => 1.0; "above one")]
    #[test_case(f64::NAN => 0.0; "nan")]
    #[test_case(0.25 => 0.25; "in range")]
    fn probability_is_clamped(probability: f64) -> f64 {
        FaultPolicy::new(probability, 1).probability()
    }

    #[test]
    fn zero_seed_is_replaced() {
        assert_ne!(FaultPolicy::new(0.5, 0).seed(), 0);
        assert_eq!(FaultPolicy::new(0.5, 99).seed(), 99);
    }

    #[test]
    fn every_decision_draws_once() {
        let (mut policy, draws) = counting(0.5, false);
        assert!(!policy.decide_before());
        assert!(!policy.decide_after());
        assert_eq!(draws.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn override_is_consumed_instead_of_a_draw() {
        let (mut policy, draws) = counting(0.5, false);
        policy.force_next_before();

        assert!(policy.decide_before());
        assert_eq!(draws.load(Ordering::SeqCst), 0);
        assert!(!policy.decide_before());
        assert_eq!(draws.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overrides_are_independent() {
        let (mut policy, _) = counting(0.5, false);
        policy.force_next_after();

        assert!(!policy.decide_before());
        assert!(policy.decide_after());
        assert!(!policy.decide_after());
    }

    #[test]
    fn disabled_policy_never_draws() {
        let (mut policy, draws) = counting(0.0, true);
        for _ in 0..10 {
            assert!(!policy.decide_before());
            assert!(!policy.decide_after());
        }
        assert_eq!(draws.load(Ordering::SeqCst), 0);
        assert!(!policy.is_active());
    }

    #[test]
    fn certain_policy_always_fails() {
        let mut policy = FaultPolicy::new(1.0, 3);
        assert!((0..100).all(|_| policy.decide_before() && policy.decide_after()));
    }

    proptest! {
        #[test]
        fn same_seed_same_decisions(seed in 1u64.., probability in 0.0f64..=1.0) {
            let mut a = FaultPolicy::new(probability, seed);
            let mut b = FaultPolicy::new(probability, seed);
            for _ in 0..64 {
                prop_assert_eq!(a.decide_before(), b.decide_before());
                prop_assert_eq!(a.decide_after(), b.decide_after());
            }
        }
    }
}
