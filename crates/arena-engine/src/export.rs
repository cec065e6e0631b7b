//! Result file export

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{Result, TournamentError};
use crate::game::{MatchRecord, Playthrough};
use crate::leaderboard::Leaderboard;
use crate::strategy::encode_history;

/// One side of an exported match
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SideSummary {
    pub name: String,
    /// One digit per turn, oldest first: `1` cooperate, `0` defect
    pub history: String,
    pub score: f64,
}

impl From<&Playthrough> for SideSummary {
    fn from(side: &Playthrough) -> Self {
        Self {
            name: side.name.clone(),
            history: encode_history(&side.history),
            score: side.score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchSummary {
    pub s1: SideSummary,
    pub s2: SideSummary,
}

/// The document written at the end of a run
#[derive(Clone, Debug, Serialize)]
pub struct ResultFile<'a> {
    pub leaderboard: &'a Leaderboard,
    pub matches: Vec<MatchSummary>,
}

impl<'a> ResultFile<'a> {
    /// Keep the first record of each unordered pair of names.
    ///
    /// Later repeats were already counted by the leaderboard; they are only
    /// dropped from the export.
    pub fn new(leaderboard: &'a Leaderboard, matches: &[MatchRecord]) -> Self {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let matches = matches
            .iter()
            .filter(|record| {
                let (a, b) = (record.s1.name.as_str(), record.s2.name.as_str());
                let key = if a <= b { (a, b) } else { (b, a) };
                seen.insert(key)
            })
            .map(|record| MatchSummary {
                s1: SideSummary::from(&record.s1),
                s2: SideSummary::from(&record.s2),
            })
            .collect();

        Self {
            leaderboard,
            matches,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| TournamentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            matches = self.matches.len(),
            "results written to {}",
            path.display()
        );
        Ok(())
    }
}
