//! Tournament scheduler
//!
//! Plays R round-robin iterations over the loaded units. Disqualification
//! carries across iterations, and a pair is skipped when either member is
//! disqualified by the time it is reached. With `parallel` set, the pairings
//! of one iteration run on the rayon pool; records are still collected in
//! enumeration order. A match that finishes after one of its members was
//! disqualified by a concurrent pairing is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::arbiter::Arbiter;
use crate::config::TournamentConfig;
use crate::disqualification::DisqualificationSet;
use crate::error::Result;
use crate::export::ResultFile;
use crate::game::{play_match, MatchOutcome, MatchRecord};
use crate::leaderboard::Leaderboard;
use crate::pairing::round_robin_pairs;
use crate::random::{RandomTurns, TurnSource};
use crate::strategy::StrategyUnit;

/// Everything a finished run produced
#[derive(Debug)]
pub struct TournamentReport {
    /// Completed matches across all iterations, in play order
    pub matches: Vec<MatchRecord>,
    pub leaderboard: Leaderboard,
    /// Matches cut short by a fault
    pub abandoned: usize,
    /// Disqualified strategies, in the order they were disqualified
    pub disqualified: Vec<String>,
    pub iterations: u32,
}

impl TournamentReport {
    pub fn result_file(&self) -> ResultFile<'_> {
        ResultFile::new(&self.leaderboard, &self.matches)
    }
}

pub struct Tournament {
    units: Vec<StrategyUnit>,
    config: TournamentConfig,
    arbiter: Arbiter,
    turns: Box<dyn TurnSource>,
}

impl Tournament {
    pub fn new(units: Vec<StrategyUnit>, config: TournamentConfig) -> Self {
        let arbiter = Arbiter::new(config.move_budget(), Arc::new(DisqualificationSet::new()))
            .with_startup_budget(config.startup_budget());
        let turns: Box<dyn TurnSource> = match config.seed {
            Some(seed) => Box::new(RandomTurns::seeded(seed)),
            None => Box::new(RandomTurns::from_entropy()),
        };
        Self {
            units,
            config,
            arbiter,
            turns,
        }
    }

    /// Replace the match length source
    pub fn with_turns(mut self, turns: impl TurnSource + 'static) -> Self {
        self.turns = Box::new(turns);
        self
    }

    pub fn units(&self) -> &[StrategyUnit] {
        &self.units
    }

    pub fn disqualified(&self) -> &DisqualificationSet {
        self.arbiter.disqualified()
    }

    /// Play every iteration and rank the field.
    ///
    /// In strict mode the first fault stops scheduling and is returned.
    pub fn run(&mut self) -> Result<TournamentReport> {
        self.config.validate()?;

        let pairs = round_robin_pairs(self.units.len());
        let cancel = AtomicBool::new(false);
        let mut matches = Vec::new();
        let mut abandoned = 0;

        info!(
            strategies = self.units.len(),
            pairings = pairs.len(),
            iterations = self.config.iterations,
            "starting tournament"
        );

        for iteration in 1..=self.config.iterations {
            if self.config.log_matches {
                info!("iteration #{}:", iteration);
            }

            // Lengths are drawn up front so a seeded run is reproducible
            // whether or not pairings run in parallel
            let lengths: Vec<usize> = pairs.iter().map(|_| self.turns.next_turns()).collect();
            let round = Round {
                units: &self.units,
                arbiter: &self.arbiter,
                log_matches: self.config.log_matches,
                strict: self.config.strict,
                cancel: &cancel,
            };

            let outcomes: Vec<Option<MatchOutcome>> = if self.config.parallel {
                pairs
                    .par_iter()
                    .zip(lengths.par_iter())
                    .map(|(&pair, &turns)| round.play(pair, turns))
                    .collect()
            } else {
                pairs
                    .iter()
                    .zip(&lengths)
                    .map(|(&pair, &turns)| round.play(pair, turns))
                    .collect()
            };

            for outcome in outcomes.into_iter().flatten() {
                match outcome {
                    MatchOutcome::Completed(record) => matches.push(record),
                    MatchOutcome::Abandoned(fault) => {
                        if self.config.strict {
                            return Err(fault.into());
                        }
                        abandoned += 1;
                    }
                }
            }

            if !self.config.log_matches {
                info!("iteration #{} finished", iteration);
            }
        }

        let leaderboard = Leaderboard::aggregate(
            self.units.iter().map(|u| u.name()),
            &matches,
            self.config.iterations,
        );

        Ok(TournamentReport {
            matches,
            leaderboard,
            abandoned,
            disqualified: self.arbiter.disqualified().snapshot(),
            iterations: self.config.iterations,
        })
    }
}

/// Shared, read-only view of one iteration
struct Round<'a> {
    units: &'a [StrategyUnit],
    arbiter: &'a Arbiter,
    log_matches: bool,
    strict: bool,
    cancel: &'a AtomicBool,
}

impl Round<'_> {
    /// `None` when the pair is skipped
    fn play(&self, (i, j): (usize, usize), turns: usize) -> Option<MatchOutcome> {
        if self.cancel.load(Ordering::SeqCst) {
            return None;
        }

        let (a, b) = (&self.units[i], &self.units[j]);
        let disqualified = self.arbiter.disqualified();
        if disqualified.contains(a.name()) || disqualified.contains(b.name()) {
            debug!("skipping {} vs {}: disqualified", a.name(), b.name());
            return None;
        }

        let outcome = play_match(self.arbiter, a, b, turns);
        if matches!(outcome, MatchOutcome::Completed(_))
            && (disqualified.contains(a.name()) || disqualified.contains(b.name()))
        {
            debug!("discarding {} vs {}: disqualified during the match", a.name(), b.name());
            return None;
        }

        match &outcome {
            MatchOutcome::Completed(record) if self.log_matches => info!(
                "{} (score: {:.3}, total: {}) vs {} (score: {:.3}, total: {}), n = {}",
                record.s1.name,
                record.s1.score,
                record.s1.total,
                record.s2.name,
                record.s2.score,
                record.s2.total,
                record.turns
            ),
            MatchOutcome::Completed(_) => {}
            MatchOutcome::Abandoned(fault) => {
                warn!(
                    "match between {} and {} was terminated early: {}",
                    a.name(),
                    b.name(),
                    fault
                );
                if self.strict {
                    self.cancel.store(true, Ordering::SeqCst);
                }
            }
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    use crate::builtin::Builtin;
    use crate::random::FixedTurns;
    use crate::strategy::{Decision, Strategy};

    /// Hangs on its third move when `hang` is set, otherwise plays slowly
    struct Flaky {
        hang: bool,
    }

    impl Strategy for Flaky {
        fn decide(&mut self, own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
            if self.hang && own.len() == 2 {
                thread::sleep(Duration::from_secs(1));
            } else {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(Decision::Cooperate)
        }
    }

    fn field(builtins: &[Builtin]) -> Vec<StrategyUnit> {
        builtins.iter().map(|b| b.unit()).collect()
    }

    fn config() -> TournamentConfig {
        TournamentConfig::default()
            .with_iterations(1)
            .with_move_budget(500)
    }

    #[test]
    fn test_single_pairing() {
        let units = field(&[Builtin::AlwaysCooperate, Builtin::AlwaysDefect]);
        let report = Tournament::new(units, config())
            .with_turns(FixedTurns(10))
            .run()
            .unwrap();

        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.abandoned, 0);
        let standings = report.leaderboard.standings();
        assert_eq!(standings[0].name, "always-defect");
        assert_eq!(standings[0].total, 500.0);
        assert_eq!(standings[0].score, 250.0);
        assert_eq!(standings[1].score, 0.0);
    }

    #[test]
    fn test_every_pair_every_iteration() {
        let units = field(&[
            Builtin::TitForTat,
            Builtin::GrimTrigger,
            Builtin::Detective,
            Builtin::Simpleton,
        ]);
        let report = Tournament::new(units, config().with_iterations(3))
            .with_turns(FixedTurns(20))
            .run()
            .unwrap();

        assert_eq!(report.matches.len(), 6 * 3);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.result_file().matches.len(), 6);
        let first: Vec<_> = report.matches[..6]
            .iter()
            .map(|m| (m.s1.name.as_str(), m.s2.name.as_str()))
            .collect();
        assert_eq!(first[0], ("tit-for-tat", "grim-trigger"));
        assert_eq!(first[5], ("detective", "simpleton"));
    }

    #[test]
    fn test_parallel_matches_sequential_shape() {
        let builtins = [
            Builtin::AlwaysCooperate,
            Builtin::AlwaysDefect,
            Builtin::TitForTat,
            Builtin::TitForTwoTats,
            Builtin::SuspiciousTitForTat,
        ];
        let sequential = Tournament::new(field(&builtins), config().with_seed(11))
            .run()
            .unwrap();
        let parallel = Tournament::new(field(&builtins), config().with_seed(11).with_parallel(true))
            .run()
            .unwrap();

        assert_eq!(sequential.matches, parallel.matches);
        assert_eq!(sequential.leaderboard, parallel.leaderboard);
    }

    #[test]
    fn test_parallel_discards_matches_of_disqualified_strategy() {
        // Only the first instance built hangs; the concurrent one keeps playing
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let flaky = StrategyUnit::from_fn("flaky", move || Flaky {
            hang: counter.fetch_add(1, Ordering::SeqCst) == 0,
        });
        let units = vec![flaky, Builtin::AlwaysCooperate.unit(), Builtin::TitForTat.unit()];

        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let report = pool.install(|| {
            Tournament::new(units, config().with_move_budget(20).with_parallel(true))
                .with_turns(FixedTurns(60))
                .run()
                .unwrap()
        });

        assert_eq!(report.disqualified, vec!["flaky".to_string()]);
        assert_eq!(report.abandoned, 1);
        assert!(report.matches.iter().all(|m| !m.involves("flaky")));
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.leaderboard.get("flaky").unwrap().score, 0.0);
    }

    #[test]
    fn test_seeded_lengths_in_range() {
        let units = field(&[Builtin::AlwaysCooperate, Builtin::TitForTat]);
        let report = Tournament::new(units, config().with_iterations(5).with_seed(3))
            .run()
            .unwrap();
        for record in &report.matches {
            assert!(record.turns >= 200);
            assert_eq!(record.s1.history.len(), record.turns);
            assert_eq!(record.s1.score, 300.0);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let units = field(&[Builtin::AlwaysCooperate, Builtin::TitForTat]);
        let result = Tournament::new(units, config().with_iterations(0)).run();
        assert!(result.is_err());
    }

    #[test]
    fn test_lone_strategy_plays_nothing() {
        let report = Tournament::new(field(&[Builtin::Joss]), config())
            .run()
            .unwrap();
        assert!(report.matches.is_empty());
        assert_eq!(report.leaderboard.len(), 1);
        assert_eq!(report.leaderboard.standings()[0].score, 0.0);
    }
}
