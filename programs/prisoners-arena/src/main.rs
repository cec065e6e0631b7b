//! Prisoner's Arena tournament runner.
//!
//! Loads strategy definitions, plays a round-robin Iterated Prisoner's
//! Dilemma tournament between them and writes the results.
//!
//! # Usage
//!
//! ```bash
//! # Full tournament over ./solutions, results in ./results.json
//! prisoners-arena
//!
//! # Built-ins only, 5 iterations, reproducible match lengths
//! prisoners-arena run --builtins -s /nonexistent -i 5 --seed 42
//!
//! # What would be loaded
//! prisoners-arena strategies --builtins
//!
//! # One pairing, turn by turn
//! prisoners-arena match tit-for-tat joss --builtins -n 12
//! ```
//!
//! Logs go to stderr (`RUST_LOG` is honoured); the leaderboard goes to stdout.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::RunOptions;

#[derive(Parser)]
#[command(name = "prisoners-arena")]
#[command(about = "Round-robin Iterated Prisoner's Dilemma tournament")]
#[command(version)]
struct Cli {
    /// Debug logging, including every turn
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    options: RunOptions,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the full tournament (default)
    Run,

    /// List the strategies a run would load
    Strategies,

    /// Play a single pairing and print it turn by turn
    Match {
        /// First seat
        first: String,

        /// Second seat
        second: String,

        /// Fixed number of turns instead of a random draw
        #[arg(short = 'n', long)]
        turns: Option<usize>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = cli.options.resolve()?;
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::execute(&config),
        Commands::Strategies => commands::strategies::execute(&config),
        Commands::Match {
            first,
            second,
            turns,
        } => commands::replay::execute(&config, &first, &second, turns),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["prisoners-arena", "-i", "3", "--no-log"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.options.iterations, Some(3));
        assert!(cli.options.no_log);
    }

    #[test]
    fn test_match_subcommand() {
        let cli = Cli::try_parse_from([
            "prisoners-arena",
            "match",
            "tit-for-tat",
            "joss",
            "-n",
            "12",
            "--builtins",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Match {
                first: "tit-for-tat".to_string(),
                second: "joss".to_string(),
                turns: Some(12),
            })
        );
        assert!(cli.options.builtins);
    }

    #[test]
    fn test_strict_conflicts_with_ignore_errors() {
        assert!(Cli::try_parse_from(["prisoners-arena", "--strict", "--ignore-errors"]).is_err());
    }
}
