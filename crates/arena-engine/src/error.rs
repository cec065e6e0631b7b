//! Error types for the tournament engine

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::script::ScriptError;

/// Result type alias using [`TournamentError`].
pub type Result<T> = std::result::Result<T, TournamentError>;

/// A strategy misbehaved during a match. Always disqualifies the strategy.
#[derive(Debug, Error)]
pub enum Fault {
    /// Decision call did not answer within the move budget.
    #[error("{strategy} timed out (took {elapsed:.2?}, budget {budget:?})")]
    Timeout {
        strategy: String,
        elapsed: Duration,
        budget: Duration,
    },

    /// Decision call returned an error or panicked.
    #[error("{strategy} raised an error: {cause:#}")]
    Execution { strategy: String, cause: anyhow::Error },

    /// A fresh instance could not be built for the match.
    #[error("{strategy} could not be instantiated: {cause:#}")]
    Construction { strategy: String, cause: anyhow::Error },
}

impl Fault {
    /// Name of the strategy at fault
    pub fn strategy(&self) -> &str {
        match self {
            Fault::Timeout { strategy, .. }
            | Fault::Execution { strategy, .. }
            | Fault::Construction { strategy, .. } => strategy,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Fault::Timeout { .. })
    }
}

/// A strategy definition could not be turned into a unit.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Parsed fine but exposes no decision capability. Never fatal.
    #[error("no strategy capability in {}; ignoring", .path.display())]
    MissingCapability { path: PathBuf },

    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} names more than one capability", .path.display())]
    Ambiguous { path: PathBuf },

    #[error("unknown built-in strategy '{name}' in {}", .path.display())]
    UnknownBuiltin { path: PathBuf, name: String },

    #[error("empty command in {}", .path.display())]
    EmptyCommand { path: PathBuf },

    #[error("invalid bytecode in {}: {source}", .path.display())]
    Bytecode {
        path: PathBuf,
        #[source]
        source: ScriptError,
    },

    #[error("strategy directory {} not found", .path.display())]
    DirectoryNotFound { path: PathBuf },
}

impl LoadError {
    /// Whether strict mode should abort on this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LoadError::MissingCapability { .. })
    }
}

/// Top-level error type for a tournament run.
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("run aborted: {0}")]
    Fault(#[from] Fault),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no strategies loaded")]
    NoStrategies,

    #[error("failed to write results to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}
