//! Strategy contract and units

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Cooperate,
    Defect,
}

impl Decision {
    /// Result-file digit: `1` for cooperate, `0` for defect
    pub fn bit(self) -> char {
        match self {
            Decision::Cooperate => '1',
            Decision::Defect => '0',
        }
    }

    pub fn from_bit(bit: char) -> Option<Self> {
        match bit {
            '1' => Some(Decision::Cooperate),
            '0' => Some(Decision::Defect),
            _ => None,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Decision::Cooperate => Decision::Defect,
            Decision::Defect => Decision::Cooperate,
        }
    }
}

impl From<bool> for Decision {
    fn from(cooperate: bool) -> Self {
        if cooperate {
            Decision::Cooperate
        } else {
            Decision::Defect
        }
    }
}

/// Encode a history as one binary digit per turn, oldest first
pub fn encode_history(history: &[Decision]) -> String {
    history.iter().map(|d| d.bit()).collect()
}

/// A match-scoped decision maker.
///
/// One instance is created per match and fed both histories every turn.
/// Only instance-local state survives between calls. Returning an error is
/// treated exactly like a crash: the owning strategy is disqualified.
pub trait Strategy {
    fn decide(&mut self, own: &[Decision], opponent: &[Decision]) -> anyhow::Result<Decision>;

    /// Runs once on the worker before the first turn, under the startup
    /// budget rather than the move budget.
    fn prepare(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Hook the arbiter fires when it abandons this instance mid-call.
    fn kill_switch(&self) -> Option<KillSwitch> {
        None
    }
}

/// A strategy instance that can be handed to a worker thread
pub type Instance = Box<dyn Strategy + Send>;

/// Out-of-band termination for an instance that stopped answering
#[derive(Clone)]
pub struct KillSwitch(Arc<dyn Fn() + Send + Sync>);

impl KillSwitch {
    pub fn new(kill: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(kill))
    }

    pub fn fire(&self) {
        (self.0)()
    }
}

impl fmt::Debug for KillSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KillSwitch")
    }
}

/// Builds a fresh instance for every match
pub trait StrategyFactory: Send + Sync {
    fn instantiate(&self) -> anyhow::Result<Instance>;
}

impl<F> StrategyFactory for F
where
    F: Fn() -> anyhow::Result<Instance> + Send + Sync,
{
    fn instantiate(&self) -> anyhow::Result<Instance> {
        self()
    }
}

/// A named, registered strategy. Lives for the whole run.
#[derive(Clone)]
pub struct StrategyUnit {
    name: String,
    origin: String,
    factory: Arc<dyn StrategyFactory>,
}

impl StrategyUnit {
    pub fn new(name: impl Into<String>, origin: impl Into<String>, factory: Arc<dyn StrategyFactory>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            factory,
        }
    }

    /// Wrap a constructor closure; handy for embedding and tests
    pub fn from_fn<S, F>(name: impl Into<String>, make: F) -> Self
    where
        S: Strategy + Send + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let factory = move || -> anyhow::Result<Instance> { Ok(Box::new(make())) };
        Self::new(name, "inline", Arc::new(factory))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description of where this unit came from
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn instantiate(&self) -> anyhow::Result<Instance> {
        self.factory.instantiate()
    }
}

impl fmt::Debug for StrategyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyUnit")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}
