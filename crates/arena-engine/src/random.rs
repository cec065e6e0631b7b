//! Match length distribution
//!
//! Match lengths follow `floor(200 - 40 * ln(U))` with U uniform in (0, 1]:
//! never shorter than 200 turns, mode at 200, long right tail. Players
//! cannot exploit a known last turn.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BASE_TURNS: f64 = 200.0;
const TAIL_SCALE: f64 = 40.0;

/// Map a uniform draw in (0, 1] to a turn count
pub fn turns_from_uniform(u: f64) -> usize {
    (BASE_TURNS - TAIL_SCALE * u.ln()).floor() as usize
}

/// Supplies the number of turns for each match
pub trait TurnSource: Send {
    fn next_turns(&mut self) -> usize;
}

/// Turn counts drawn from the match length distribution
#[derive(Clone, Debug)]
pub struct RandomTurns {
    rng: ChaCha8Rng,
}

impl RandomTurns {
    /// Reproducible sequence of match lengths
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl TurnSource for RandomTurns {
    fn next_turns(&mut self) -> usize {
        // gen() is in [0, 1); flip it so ln() never sees zero
        let u = 1.0 - self.rng.gen::<f64>();
        turns_from_uniform(u)
    }
}

/// Every match lasts exactly this many turns
#[derive(Clone, Copy, Debug)]
pub struct FixedTurns(pub usize);

impl TurnSource for FixedTurns {
    fn next_turns(&mut self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_upper_bound_of_u_gives_base() {
        assert_eq!(turns_from_uniform(1.0), 200);
    }

    #[test]
    fn test_small_u_gives_long_match() {
        // ln(e^-5.01) = -5.01 -> 200 + 200.4
        assert_eq!(turns_from_uniform((-5.01f64).exp()), 400);
    }

    #[test]
    fn test_seeded_determinism() {
        let mut a = RandomTurns::seeded(7);
        let mut b = RandomTurns::seeded(7);
        for _ in 0..100 {
            assert_eq!(a.next_turns(), b.next_turns());
        }
    }

    #[test]
    fn test_distribution_shape() {
        let mut source = RandomTurns::seeded(42);
        let samples = 5000;
        let draws: Vec<usize> = (0..samples).map(|_| source.next_turns()).collect();

        assert!(draws.iter().all(|&n| n >= 200));
        // Mean of 200 + 40 * Exp(1) is 240
        let mean = draws.iter().sum::<usize>() as f64 / samples as f64;
        assert!(mean > 235.0 && mean < 245.0, "mean {} not ~240", mean);
        // Right-skewed: most matches land in the first 40 turns past the floor
        let short = draws.iter().filter(|&&n| n < 240).count();
        assert!(short as f64 / samples as f64 > 0.55);
    }

    #[test]
    fn test_fixed_turns() {
        let mut source = FixedTurns(10);
        assert_eq!(source.next_turns(), 10);
        assert_eq!(source.next_turns(), 10);
    }

    proptest! {
        #[test]
        fn turns_never_below_base(u in 1e-12f64..=1.0) {
            prop_assert!(turns_from_uniform(u) >= 200);
        }

        #[test]
        fn turns_monotone_in_u(a in 1e-9f64..=1.0, b in 1e-9f64..=1.0) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(turns_from_uniform(lo) >= turns_from_uniform(hi));
        }
    }
}
