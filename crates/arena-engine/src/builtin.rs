//! Strategies compiled into the engine

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::payoff;
use crate::strategy::{Decision, Instance, Strategy, StrategyUnit};

/// Built-in strategy table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Builtin {
    /// Always cooperate, never defect.
    AlwaysCooperate,
    /// Always defect, never cooperate.
    AlwaysDefect,
    /// Copy opponent's last move. Start with cooperate.
    TitForTat,
    /// Cooperate unless the opponent defected on both of its last two moves.
    ForgivingTitForTat,
    /// Cooperate until the opponent defects once, then always defect.
    GrimTrigger,
    /// Tit-for-Tat with a 10% chance of a sneaky defection.
    Joss,
    /// Probe with C, D, C, C; exploit opponents that never retaliate.
    Detective,
    /// Win-stay, lose-switch.
    Simpleton,
    /// Tit-for-Tat but start with defect.
    SuspiciousTitForTat,
    /// Defect only if opponent defected twice in a row.
    TitForTwoTats,
    /// Retaliate with increasing defection streaks, then forgive.
    Gradual,
    /// Coin flip each turn.
    Random,
}

const DETECTIVE_PROBE: [Decision; 4] = [
    Decision::Cooperate,
    Decision::Defect,
    Decision::Cooperate,
    Decision::Cooperate,
];

const JOSS_DEFECT_CHANCE: f64 = 0.10;

impl Builtin {
    pub const ALL: [Builtin; 12] = [
        Builtin::AlwaysCooperate,
        Builtin::AlwaysDefect,
        Builtin::TitForTat,
        Builtin::ForgivingTitForTat,
        Builtin::GrimTrigger,
        Builtin::Joss,
        Builtin::Detective,
        Builtin::Simpleton,
        Builtin::SuspiciousTitForTat,
        Builtin::TitForTwoTats,
        Builtin::Gradual,
        Builtin::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::AlwaysCooperate => "always-cooperate",
            Builtin::AlwaysDefect => "always-defect",
            Builtin::TitForTat => "tit-for-tat",
            Builtin::ForgivingTitForTat => "forgiving-tit-for-tat",
            Builtin::GrimTrigger => "grim-trigger",
            Builtin::Joss => "joss",
            Builtin::Detective => "detective",
            Builtin::Simpleton => "simpleton",
            Builtin::SuspiciousTitForTat => "suspicious-tit-for-tat",
            Builtin::TitForTwoTats => "tit-for-two-tats",
            Builtin::Gradual => "gradual",
            Builtin::Random => "random",
        }
    }

    /// Accepts kebab-case or snake_case names
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|b| b.name() == wanted)
    }

    pub fn describe(self) -> &'static str {
        match self {
            Builtin::AlwaysCooperate => "Never defects. Always cooperates.",
            Builtin::AlwaysDefect => "Never cooperates. Always defects.",
            Builtin::TitForTat => "Copies opponent's last move. Starts by cooperating.",
            Builtin::ForgivingTitForTat => "Only retaliates when both of the opponent's last two moves were defections.",
            Builtin::GrimTrigger => "Cooperates until betrayed, then always defects.",
            Builtin::Joss => "Like Tit-for-Tat, but defects at random 10% of the time.",
            Builtin::Detective => "Opens C, D, C, C; exploits you if you never hit back, otherwise plays Tit-for-Tat.",
            Builtin::Simpleton => "Repeats its move if the outcome was good, switches if bad.",
            Builtin::SuspiciousTitForTat => "Like Tit-for-Tat, but starts with defect.",
            Builtin::TitForTwoTats => "Only retaliates after two consecutive defections.",
            Builtin::Gradual => "Retaliates with increasing severity, then forgives.",
            Builtin::Random => "Randomly cooperates or defects each round.",
        }
    }

    pub fn instantiate(self) -> Instance {
        match self {
            Builtin::AlwaysCooperate => Box::new(Rule::AlwaysCooperate),
            Builtin::AlwaysDefect => Box::new(Rule::AlwaysDefect),
            Builtin::TitForTat => Box::new(Rule::TitForTat),
            Builtin::SuspiciousTitForTat => Box::new(Rule::SuspiciousTitForTat),
            Builtin::ForgivingTitForTat => Box::new(Rule::ForgivingTitForTat),
            Builtin::Simpleton => Box::new(Rule::Simpleton),
            Builtin::TitForTwoTats => Box::new(Rule::TitForTwoTats),
            Builtin::Gradual => Box::new(Rule::Gradual),
            Builtin::GrimTrigger => Box::new(GrimTrigger { grudge: false }),
            Builtin::Detective => Box::new(Detective { take_advantage: false }),
            Builtin::Joss => Box::new(Joss { rng: StdRng::from_entropy() }),
            Builtin::Random => Box::new(CoinFlip { rng: StdRng::from_entropy() }),
        }
    }

    /// Register-ready unit named after the built-in
    pub fn unit(self) -> StrategyUnit {
        let factory = move || -> anyhow::Result<Instance> { Ok(self.instantiate()) };
        StrategyUnit::new(self.name(), "built-in", Arc::new(factory))
    }
}

/// Strategies that are a pure function of the two histories
#[derive(Clone, Copy, Debug)]
enum Rule {
    AlwaysCooperate,
    AlwaysDefect,
    TitForTat,
    SuspiciousTitForTat,
    ForgivingTitForTat,
    Simpleton,
    TitForTwoTats,
    Gradual,
}

impl Strategy for Rule {
    fn decide(&mut self, own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        let decision = match self {
            Rule::AlwaysCooperate => Decision::Cooperate,
            Rule::AlwaysDefect => Decision::Defect,
            Rule::TitForTat => opponent.last().copied().unwrap_or(Decision::Cooperate),
            Rule::SuspiciousTitForTat => opponent.last().copied().unwrap_or(Decision::Defect),
            Rule::ForgivingTitForTat => forgiving_tit_for_tat(own, opponent),
            Rule::Simpleton => simpleton(own, opponent),
            Rule::TitForTwoTats => tit_for_two_tats(opponent),
            Rule::Gradual => gradual(own, opponent),
        };
        Ok(decision)
    }
}

/// Wait for two opponent moves, then cooperate if either of the last two cooperated
fn forgiving_tit_for_tat(own: &[Decision], opponent: &[Decision]) -> Decision {
    if own.len() < 2 || opponent.len() < 2 {
        return Decision::Cooperate;
    }
    let last_two = &opponent[opponent.len() - 2..];
    if last_two.contains(&Decision::Cooperate) {
        Decision::Cooperate
    } else {
        Decision::Defect
    }
}

/// Win-stay, lose-switch: keep the last move after 3+ points, flip it otherwise
fn simpleton(own: &[Decision], opponent: &[Decision]) -> Decision {
    let (Some(&mine), Some(&theirs)) = (own.last(), opponent.last()) else {
        return Decision::Cooperate;
    };
    let (points, _) = payoff(mine, theirs);
    if points >= 3 {
        mine
    } else {
        mine.flip()
    }
}

fn tit_for_two_tats(opponent: &[Decision]) -> Decision {
    match opponent {
        [.., Decision::Defect, Decision::Defect] => Decision::Defect,
        _ => Decision::Cooperate,
    }
}

/// After N opponent defections we owe N(N+1)/2 defections in total
fn gradual(own: &[Decision], opponent: &[Decision]) -> Decision {
    let theirs = opponent.iter().filter(|d| **d == Decision::Defect).count();
    let ours = own.iter().filter(|d| **d == Decision::Defect).count();
    if ours < theirs * (theirs + 1) / 2 {
        Decision::Defect
    } else {
        Decision::Cooperate
    }
}

struct GrimTrigger {
    grudge: bool,
}

impl Strategy for GrimTrigger {
    fn decide(&mut self, _own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        if opponent.last() == Some(&Decision::Defect) {
            self.grudge = true;
        }
        Ok(if self.grudge { Decision::Defect } else { Decision::Cooperate })
    }
}

struct Detective {
    take_advantage: bool,
}

impl Strategy for Detective {
    fn decide(&mut self, own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        if let Some(&probe) = DETECTIVE_PROBE.get(own.len()) {
            return Ok(probe);
        }
        if own.len() == DETECTIVE_PROBE.len() {
            self.take_advantage = opponent.iter().all(|d| *d == Decision::Cooperate);
        }
        if self.take_advantage {
            return Ok(Decision::Defect);
        }
        Ok(opponent.last().copied().unwrap_or(Decision::Cooperate))
    }
}

struct Joss {
    rng: StdRng,
}

impl Strategy for Joss {
    fn decide(&mut self, _own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision> {
        if self.rng.gen_bool(JOSS_DEFECT_CHANCE) {
            return Ok(Decision::Defect);
        }
        Ok(opponent.last().copied().unwrap_or(Decision::Cooperate))
    }
}

struct CoinFlip {
    rng: StdRng,
}

impl Strategy for CoinFlip {
    fn decide(&mut self, _own: &[Decision], _opponent: &[Decision]) -> anyhow::Result<Decision> {
        Ok(Decision::from(self.rng.gen_bool(0.5)))
    }
}
