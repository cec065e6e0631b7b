//! List the strategies a run would load

use anyhow::Result;
use arena_engine::{load_units, Builtin, TournamentConfig, TournamentError};

pub fn execute(config: &TournamentConfig) -> Result<()> {
    let units = match load_units(config) {
        Ok(units) => units,
        Err(TournamentError::NoStrategies) => {
            println!("no strategies found in {}", config.strategy_dir.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let width = units.iter().map(|u| u.name().len()).max().unwrap_or(0);
    for unit in &units {
        println!("{:<width$}  {}", unit.name(), unit.origin(), width = width);
    }

    if config.include_builtins {
        println!();
        for builtin in Builtin::ALL {
            println!("{:<24}{}", builtin.name(), builtin.describe());
        }
    }
    Ok(())
}
