//! Match execution engine

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arbiter::Arbiter;
use crate::error::Fault;
use crate::payoff;
use crate::random::TurnSource;
use crate::strategy::{Decision, StrategyUnit};

/// One side of a completed match
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playthrough {
    pub name: String,
    pub history: Vec<Decision>,
    /// Sum of per-turn payoffs
    pub total: u32,
    /// Per-turn average as a percentage: `total / n * 100`
    pub score: f64,
}

impl Playthrough {
    fn new(name: &str, history: Vec<Decision>, total: u32) -> Self {
        let turns = history.len();
        let score = if turns == 0 {
            0.0
        } else {
            total as f64 / turns as f64 * 100.0
        };
        Self {
            name: name.to_string(),
            history,
            total,
            score,
        }
    }
}

/// Result of a complete match. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub s1: Playthrough,
    pub s2: Playthrough,
    pub turns: usize,
}

impl MatchRecord {
    pub fn sides(&self) -> [&Playthrough; 2] {
        [&self.s1, &self.s2]
    }

    pub fn involves(&self, name: &str) -> bool {
        self.s1.name == name || self.s2.name == name
    }
}

/// What became of a scheduled pairing
#[derive(Debug)]
pub enum MatchOutcome {
    Completed(MatchRecord),
    /// A side faulted; the faulting strategy is already disqualified
    Abandoned(Fault),
}

impl MatchOutcome {
    pub fn record(&self) -> Option<&MatchRecord> {
        match self {
            MatchOutcome::Completed(record) => Some(record),
            MatchOutcome::Abandoned(_) => None,
        }
    }
}

/// Run a match whose length is drawn from `turns`
pub fn simulate(
    arbiter: &Arbiter,
    strategy_a: &StrategyUnit,
    strategy_b: &StrategyUnit,
    turns: &mut dyn TurnSource,
) -> MatchOutcome {
    let n = turns.next_turns();
    play_match(arbiter, strategy_a, strategy_b, n)
}

/// Run a match of exactly `turns` turns between fresh instances.
///
/// Both sides decide against the histories as they stood at the start of the
/// turn; the two moves are appended together afterwards. The first fault
/// abandons the match.
pub fn play_match(
    arbiter: &Arbiter,
    strategy_a: &StrategyUnit,
    strategy_b: &StrategyUnit,
    turns: usize,
) -> MatchOutcome {
    match run_turns(arbiter, strategy_a, strategy_b, turns) {
        Ok(record) => MatchOutcome::Completed(record),
        Err(fault) => MatchOutcome::Abandoned(fault),
    }
}

fn run_turns(
    arbiter: &Arbiter,
    strategy_a: &StrategyUnit,
    strategy_b: &StrategyUnit,
    turns: usize,
) -> Result<MatchRecord, Fault> {
    let mut seat_a = arbiter.seat(strategy_a)?;
    let mut seat_b = arbiter.seat(strategy_b)?;

    let mut history_a: Vec<Decision> = Vec::with_capacity(turns);
    let mut history_b: Vec<Decision> = Vec::with_capacity(turns);
    let mut total_a = 0u32;
    let mut total_b = 0u32;

    for turn in 0..turns {
        let move_a = arbiter.decide(&mut seat_a, &history_a, &history_b)?;
        let move_b = arbiter.decide(&mut seat_b, &history_b, &history_a)?;

        let (score_a, score_b) = payoff(move_a, move_b);
        total_a += score_a as u32;
        total_b += score_b as u32;
        debug!(turn, a = ?move_a, b = ?move_b, total_a, total_b, "turn played");

        history_a.push(move_a);
        history_b.push(move_b);
    }

    Ok(MatchRecord {
        s1: Playthrough::new(strategy_a.name(), history_a, total_a),
        s2: Playthrough::new(strategy_b.name(), history_b, total_b),
        turns,
    })
}
