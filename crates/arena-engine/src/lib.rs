//! Tournament engine for Prisoner's Arena
//!
//! Runs a round-robin Iterated Prisoner's Dilemma tournament between
//! pluggable strategies:
//! - Strategy discovery (built-in table, bytecode scripts, external processes)
//! - Per-move deadline enforcement on isolated worker threads
//! - Match simulation with randomized length
//! - Disqualification tracking, score aggregation and result export

mod arbiter;
mod builtin;
mod config;
mod disqualification;
mod error;
mod export;
mod game;
mod leaderboard;
mod pairing;
mod process;
mod random;
mod registry;
mod scheduler;
mod script;
mod strategy;

pub use arbiter::{Arbiter, DEFAULT_STARTUP_BUDGET, Seat};
pub use builtin::Builtin;
pub use config::TournamentConfig;
pub use disqualification::DisqualificationSet;
pub use error::{Fault, LoadError, Result, TournamentError};
pub use export::{MatchSummary, ResultFile, SideSummary};
pub use game::{play_match, simulate, MatchOutcome, MatchRecord, Playthrough};
pub use leaderboard::{Leaderboard, Standing};
pub use pairing::{calculate_match_count, round_robin_pairs};
pub use process::{parse_reply, CommandSpec, ProcessStrategy, PROTOCOL_VERSION};
pub use random::{turns_from_uniform, FixedTurns, RandomTurns, TurnSource};
pub use registry::{load_units, Definition, Registry};
pub use scheduler::{Tournament, TournamentReport};
pub use script::{Script, ScriptError, ScriptStrategy, MAX_SCRIPT_LEN};
pub use strategy::{encode_history, Decision, Instance, KillSwitch, Strategy, StrategyFactory, StrategyUnit};

/// Payoff matrix for the Prisoner's Dilemma
/// Returns (score_a, score_b)
pub fn payoff(a: Decision, b: Decision) -> (u8, u8) {
    match (a, b) {
        (Decision::Cooperate, Decision::Cooperate) => (3, 3),
        (Decision::Cooperate, Decision::Defect) => (0, 5),
        (Decision::Defect, Decision::Cooperate) => (5, 0),
        (Decision::Defect, Decision::Defect) => (1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::{payoff, Decision};
    use proptest::prelude::*;

    #[test]
    fn test_payoff_matrix() {
        assert_eq!(payoff(Decision::Cooperate, Decision::Cooperate), (3, 3));
        assert_eq!(payoff(Decision::Cooperate, Decision::Defect), (0, 5));
        assert_eq!(payoff(Decision::Defect, Decision::Cooperate), (5, 0));
        assert_eq!(payoff(Decision::Defect, Decision::Defect), (1, 1));
    }

    fn decision() -> impl Strategy<Value = Decision> {
        prop_oneof![Just(Decision::Cooperate), Just(Decision::Defect)]
    }

    proptest! {
        #[test]
        fn payoff_is_symmetric(a in decision(), b in decision()) {
            let (x, y) = payoff(a, b);
            prop_assert_eq!(payoff(b, a), (y, x));
        }
    }
}
