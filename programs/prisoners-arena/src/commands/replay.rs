//! Single pairing, printed turn by turn

use std::sync::Arc;

use anyhow::{anyhow, Result};
use arena_engine::{
    load_units, payoff, simulate, Arbiter, Builtin, Decision, DisqualificationSet, FixedTurns,
    LoadError, MatchOutcome, MatchRecord, RandomTurns, StrategyUnit, TournamentConfig, TournamentError,
    TurnSource,
};

pub fn execute(config: &TournamentConfig, first: &str, second: &str, turns: Option<usize>) -> Result<()> {
    let units = match load_units(config) {
        Ok(units) => units,
        // Built-ins below are still reachable without any definitions
        Err(TournamentError::NoStrategies)
        | Err(TournamentError::Load(LoadError::DirectoryNotFound { .. })) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let a = find_unit(&units, first)?;
    let b = find_unit(&units, second)?;

    let arbiter = Arbiter::new(config.move_budget(), Arc::new(DisqualificationSet::new()))
        .with_startup_budget(config.startup_budget());
    let mut source: Box<dyn TurnSource> = match (turns, config.seed) {
        (Some(n), _) => Box::new(FixedTurns(n)),
        (None, Some(seed)) => Box::new(RandomTurns::seeded(seed)),
        (None, None) => Box::new(RandomTurns::from_entropy()),
    };

    match simulate(&arbiter, &a, &b, source.as_mut()) {
        MatchOutcome::Completed(record) => {
            print_record(&record);
            Ok(())
        }
        MatchOutcome::Abandoned(fault) => Err(TournamentError::Fault(fault).into()),
    }
}

/// Loaded units first; built-ins are always reachable by name
fn find_unit(units: &[StrategyUnit], name: &str) -> Result<StrategyUnit> {
    if let Some(unit) = units.iter().find(|u| u.name() == name) {
        return Ok(unit.clone());
    }
    Builtin::from_name(name)
        .map(Builtin::unit)
        .ok_or_else(|| anyhow!("no strategy named '{}'", name))
}

fn letter(decision: Decision) -> char {
    match decision {
        Decision::Cooperate => 'C',
        Decision::Defect => 'D',
    }
}

fn print_record(record: &MatchRecord) {
    let width = record.s1.name.len().max(4);
    println!("{:>5}  {:<width$}  {}", "turn", record.s1.name, record.s2.name, width = width);

    let (mut total_a, mut total_b) = (0u32, 0u32);
    for (turn, (a, b)) in record.s1.history.iter().zip(&record.s2.history).enumerate() {
        let (score_a, score_b) = payoff(*a, *b);
        total_a += score_a as u32;
        total_b += score_b as u32;
        println!(
            "{:>5}  {:<width$}  {}    {}-{}  ({}-{})",
            turn + 1,
            letter(*a),
            letter(*b),
            score_a,
            score_b,
            total_a,
            total_b,
            width = width
        );
    }

    println!();
    println!(
        "{} (score: {:.3}, total: {}) vs {} (score: {:.3}, total: {}), n = {}",
        record.s1.name,
        record.s1.score,
        record.s1.total,
        record.s2.name,
        record.s2.score,
        record.s2.total,
        record.turns
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_unit_falls_back_to_builtins() {
        let units = vec![StrategyUnit::new(
            "joss",
            "override",
            Arc::new(|| -> anyhow::Result<arena_engine::Instance> {
                Ok(Builtin::AlwaysCooperate.instantiate())
            }),
        )];
        assert_eq!(find_unit(&units, "joss").unwrap().origin(), "override");
        assert_eq!(find_unit(&units, "grim-trigger").unwrap().origin(), "built-in");
        assert!(find_unit(&units, "nobody").is_err());
    }

    #[test]
    fn test_letters() {
        assert_eq!(letter(Decision::Cooperate), 'C');
        assert_eq!(letter(Decision::Defect), 'D');
    }

    #[test]
    fn test_replay_with_builtins_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = TournamentConfig::default()
            .with_strategy_dir(dir.path().join("missing"))
            .with_builtins(true)
            .with_move_budget(500);
        execute(&config, "tit-for-tat", "always-defect", Some(5)).unwrap();
        assert!(execute(&config, "tit-for-tat", "nobody", Some(5)).is_err());
    }

    #[test]
    fn test_replay_builtins_without_strategy_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = TournamentConfig::default()
            .with_strategy_dir(dir.path().join("missing"))
            .with_move_budget(500);
        assert!(!config.include_builtins);
        execute(&config, "tit-for-tat", "joss", Some(5)).unwrap();
    }
}
