//! Full tournament run

use anyhow::Result;
use arena_engine::{load_units, Tournament, TournamentConfig};
use tracing::info;

pub fn execute(config: &TournamentConfig) -> Result<()> {
    let units = load_units(config)?;
    let mut tournament = Tournament::new(units, config.clone());
    let report = tournament.run()?;

    if !report.disqualified.is_empty() {
        info!(
            abandoned = report.abandoned,
            "disqualified: {}",
            report.disqualified.join(", ")
        );
    }

    println!();
    println!("Total scores:");
    for line in report.leaderboard.render() {
        println!("{}", line);
    }

    report.result_file().write(&config.result_path)?;
    println!();
    println!("Results written to {}", config.result_path.display());
    Ok(())
}
