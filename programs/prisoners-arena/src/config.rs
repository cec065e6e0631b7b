//! Command-line options and config-file loading

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arena_engine::TournamentConfig;
use clap::Args;

/// Tournament options shared by every subcommand
#[derive(Args, Clone, Debug, Default)]
pub struct RunOptions {
    /// JSON config file; flags given on the command line override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding strategy definitions [default: ./solutions]
    #[arg(short, long, global = true)]
    pub solution_dir: Option<PathBuf>,

    /// Enter the built-in strategies as well
    #[arg(long, global = true)]
    pub builtins: bool,

    /// Abort on the first strategy that fails to load or misbehaves
    #[arg(long, global = true, conflicts_with = "ignore_errors")]
    pub strict: bool,

    /// Skip broken strategies and keep going, even if the config file says strict
    #[arg(long, global = true)]
    pub ignore_errors: bool,

    /// Where to write the results JSON [default: ./results.json]
    #[arg(short = 'p', long, global = true)]
    pub result_path: Option<PathBuf>,

    /// Number of times every pairing is re-run [default: 20]
    #[arg(short, long, global = true)]
    pub iterations: Option<u32>,

    /// Time budget for one move, in milliseconds [default: 20]
    #[arg(long, global = true)]
    pub move_budget_ms: Option<u64>,

    /// Time a strategy gets to start up before its first move, in milliseconds [default: 5000]
    #[arg(long, global = true)]
    pub startup_budget_ms: Option<u64>,

    /// Seed for reproducible match lengths
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Play the pairings of each iteration in parallel
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Don't log individual match results
    #[arg(long, global = true)]
    pub no_log: bool,
}

impl RunOptions {
    /// Config file (or defaults) with command-line overrides applied
    pub fn resolve(&self) -> Result<TournamentConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => TournamentConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut TournamentConfig) {
        if let Some(dir) = &self.solution_dir {
            config.strategy_dir = dir.clone();
        }
        if let Some(path) = &self.result_path {
            config.result_path = path.clone();
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(budget) = self.move_budget_ms {
            config.move_budget_ms = budget;
        }
        if let Some(budget) = self.startup_budget_ms {
            config.startup_budget_ms = budget;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.builtins {
            config.include_builtins = true;
        }
        if self.strict {
            config.strict = true;
        }
        if self.ignore_errors {
            config.strict = false;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.no_log {
            config.log_matches = false;
        }
    }
}

pub fn load_config(path: &Path) -> Result<TournamentConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
}
