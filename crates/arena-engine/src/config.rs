//! Tournament configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TournamentError};

/// Settings for one tournament run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    /// Directory scanned for `*.json` strategy definitions
    pub strategy_dir: PathBuf,
    /// Register the whole built-in table ahead of discovered definitions
    pub include_builtins: bool,
    /// Abort the run on the first load failure or strategy fault
    pub strict: bool,
    /// Where the result file is written
    pub result_path: PathBuf,
    /// Number of full round-robin passes
    pub iterations: u32,
    /// Wall-clock budget for a single decision call
    pub move_budget_ms: u64,
    /// Time an instance gets to become ready before its first move
    pub startup_budget_ms: u64,
    /// Fixes the sequence of match lengths when set
    pub seed: Option<u64>,
    /// Play the pairings of an iteration on the rayon pool
    pub parallel: bool,
    /// Log every completed match; otherwise one line per iteration
    pub log_matches: bool,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            strategy_dir: PathBuf::from("./solutions"),
            include_builtins: false,
            strict: false,
            result_path: PathBuf::from("./results.json"),
            iterations: 20,
            move_budget_ms: 20,
            startup_budget_ms: 5000,
            seed: None,
            parallel: false,
            log_matches: true,
        }
    }
}

impl TournamentConfig {
    pub fn with_strategy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.strategy_dir = dir.into();
        self
    }

    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_result_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_path = path.into();
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_move_budget(mut self, budget_ms: u64) -> Self {
        self.move_budget_ms = budget_ms;
        self
    }

    pub fn with_startup_budget(mut self, budget_ms: u64) -> Self {
        self.startup_budget_ms = budget_ms;
        self
    }

    /// Set seed for reproducible match lengths
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_match_logging(mut self, log_matches: bool) -> Self {
        self.log_matches = log_matches;
        self
    }

    pub fn move_budget(&self) -> Duration {
        Duration::from_millis(self.move_budget_ms)
    }

    pub fn startup_budget(&self) -> Duration {
        Duration::from_millis(self.startup_budget_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(TournamentError::Config(
                "iterations must be at least 1".to_string(),
            ));
        }
        if self.move_budget_ms == 0 {
            return Err(TournamentError::Config(
                "move budget must be at least 1 ms".to_string(),
            ));
        }
        if self.startup_budget_ms == 0 {
            return Err(TournamentError::Config(
                "startup budget must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }
}
