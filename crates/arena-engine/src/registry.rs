//! Strategy registry
//!
//! Discovers strategy definitions on disk and turns them into named units.
//! Every `*.json` file in the strategy directory is one candidate, named
//! after its file stem:
//!
//! ```json
//! {"builtin": "tit-for-tat"}
//! {"bytecode": [2, 24]}
//! {"command": ["python3", "bot.py"]}
//! ```
//!
//! Files are visited in sorted order so discovery order, which drives both
//! pairing order and leaderboard tie-breaks, does not depend on the
//! filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::builtin::Builtin;
use crate::config::TournamentConfig;
use crate::error::{LoadError, Result, TournamentError};
use crate::process::{CommandSpec, ProcessStrategy};
use crate::script::{Script, ScriptStrategy};
use crate::strategy::{Instance, StrategyFactory, StrategyUnit};

#[derive(Debug, Default, Deserialize)]
struct DefinitionFile {
    builtin: Option<String>,
    bytecode: Option<Vec<u8>>,
    command: Option<Vec<String>>,
}

/// A loaded strategy definition. Builds one fresh instance per match.
#[derive(Clone, Debug)]
pub enum Definition {
    Builtin(Builtin),
    Script(Arc<Script>),
    Command(CommandSpec),
}

impl Definition {
    pub fn from_file(path: &Path) -> std::result::Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse definition text; `path` is used for error context and to
    /// resolve relative command paths
    pub fn parse(path: &Path, text: &str) -> std::result::Result<Self, LoadError> {
        let file: DefinitionFile = serde_json::from_str(text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let named = [
            file.builtin.is_some(),
            file.bytecode.is_some(),
            file.command.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        match named {
            0 => {
                return Err(LoadError::MissingCapability {
                    path: path.to_path_buf(),
                })
            }
            1 => {}
            _ => {
                return Err(LoadError::Ambiguous {
                    path: path.to_path_buf(),
                })
            }
        }

        if let Some(name) = file.builtin {
            return Builtin::from_name(&name)
                .map(Definition::Builtin)
                .ok_or_else(|| LoadError::UnknownBuiltin {
                    path: path.to_path_buf(),
                    name,
                });
        }

        if let Some(code) = file.bytecode {
            let script = Script::compile(&code).map_err(|source| LoadError::Bytecode {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(Definition::Script(Arc::new(script)));
        }

        let argv = file.command.unwrap_or_default();
        let dir = path.parent().map(Path::to_path_buf);
        let mut spec = CommandSpec::from_argv(&argv, dir.clone()).ok_or_else(|| LoadError::EmptyCommand {
            path: path.to_path_buf(),
        })?;
        // `./bot.py` means next to the definition, not next to the runner
        if let Some(dir) = dir {
            let program = Path::new(&spec.program);
            if program.is_relative() && program.components().count() > 1 {
                spec.program = dir.join(program).to_string_lossy().into_owned();
            }
        }
        Ok(Definition::Command(spec))
    }

    /// Short human-readable source description
    pub fn origin(&self) -> String {
        match self {
            Definition::Builtin(builtin) => format!("built-in {}", builtin.name()),
            Definition::Script(script) => format!("bytecode ({} bytes)", script.len()),
            Definition::Command(spec) => format!("command `{}`", spec.display()),
        }
    }
}

impl StrategyFactory for Definition {
    fn instantiate(&self) -> anyhow::Result<Instance> {
        match self {
            Definition::Builtin(builtin) => Ok(builtin.instantiate()),
            Definition::Script(script) => Ok(Box::new(ScriptStrategy::new(Arc::clone(script)))),
            Definition::Command(spec) => Ok(Box::new(ProcessStrategy::spawn(spec)?)),
        }
    }
}

/// Ordered collection of strategy units, unique by name
#[derive(Debug, Default)]
pub struct Registry {
    units: Vec<StrategyUnit>,
    strict: bool,
}

impl Registry {
    /// In strict mode the first fatal load error aborts discovery
    pub fn new(strict: bool) -> Self {
        Self {
            units: Vec::new(),
            strict,
        }
    }

    /// Add a unit. A name collision replaces the earlier unit in place.
    pub fn register(&mut self, unit: StrategyUnit) {
        match self.units.iter_mut().find(|u| u.name() == unit.name()) {
            Some(slot) => {
                warn!(
                    strategy = unit.name(),
                    "{} replaces {} of the same name",
                    unit.origin(),
                    slot.origin()
                );
                *slot = unit;
            }
            None => {
                debug!(strategy = unit.name(), origin = unit.origin(), "registered strategy");
                self.units.push(unit);
            }
        }
    }

    /// Register the whole built-in table
    pub fn register_builtins(&mut self) {
        for builtin in Builtin::ALL {
            self.register(builtin.unit());
        }
    }

    /// Load one definition file and register it under its file stem
    pub fn load_file(&mut self, path: &Path) -> std::result::Result<(), LoadError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let definition = Definition::from_file(path)?;
        let origin = definition.origin();
        self.register(StrategyUnit::new(name, origin, Arc::new(definition)));
        Ok(())
    }

    /// Load every `*.json` definition in `dir`, in file-name order.
    ///
    /// Returns the number of files that loaded. Outside strict mode bad files
    /// are logged and skipped.
    pub fn discover(&mut self, dir: &Path) -> std::result::Result<usize, LoadError> {
        if !dir.is_dir() {
            return Err(LoadError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let io_error = |source: std::io::Error| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(()) => loaded += 1,
                Err(e) if self.strict && e.is_fatal() => return Err(e),
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    pub fn units(&self) -> &[StrategyUnit] {
        &self.units
    }

    pub fn get(&self, name: &str) -> Option<&StrategyUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<StrategyUnit> {
        self.units
    }
}

/// Build the unit collection a run will use
pub fn load_units(config: &TournamentConfig) -> Result<Vec<StrategyUnit>> {
    let mut registry = Registry::new(config.strict);
    if config.include_builtins {
        registry.register_builtins();
    }

    match registry.discover(&config.strategy_dir) {
        Ok(loaded) => debug!(
            "loaded {} definitions from {}",
            loaded,
            config.strategy_dir.display()
        ),
        // Built-ins alone are a valid field
        Err(e @ LoadError::DirectoryNotFound { .. }) if config.include_builtins => {
            warn!("{}", e)
        }
        Err(e) => return Err(e.into()),
    }

    if registry.is_empty() {
        return Err(TournamentError::NoStrategies);
    }
    info!("{} strategies imported in total", registry.len());
    Ok(registry.into_units())
}
