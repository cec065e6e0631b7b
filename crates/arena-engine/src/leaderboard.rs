//! Score aggregation and ranking

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::game::MatchRecord;

/// One strategy's place on the leaderboard
#[derive(Clone, Debug, PartialEq)]
pub struct Standing {
    pub name: String,
    /// Sum of match scores over every completed match
    pub total: f64,
    /// `total / (loaded strategies * iterations)`
    pub score: f64,
}

/// Strategies ranked by normalized score, best first
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Leaderboard {
    standings: Vec<Standing>,
    iterations: u32,
}

impl Leaderboard {
    /// Sum match scores per strategy and normalize.
    ///
    /// `names` is every loaded strategy in discovery order; each one gets a
    /// standing even without a completed match. The divisor counts the
    /// strategy itself among the loaded ones. Ties keep discovery order.
    pub fn aggregate<'a>(
        names: impl IntoIterator<Item = &'a str>,
        matches: &[MatchRecord],
        iterations: u32,
    ) -> Self {
        let mut standings: Vec<Standing> = names
            .into_iter()
            .map(|name| Standing {
                name: name.to_string(),
                total: 0.0,
                score: 0.0,
            })
            .collect();
        let index: HashMap<String, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        for record in matches {
            for side in record.sides() {
                if let Some(&i) = index.get(&side.name) {
                    standings[i].total += side.score;
                }
            }
        }

        let divisor = standings.len() as f64 * iterations as f64;
        for standing in &mut standings {
            standing.score = if divisor > 0.0 {
                standing.total / divisor
            } else {
                0.0
            };
        }

        // Stable: equal scores stay in discovery order
        standings.sort_by(|a, b| b.score.total_cmp(&a.score));

        Self {
            standings,
            iterations,
        }
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn get(&self, name: &str) -> Option<&Standing> {
        self.standings.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.standings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }

    /// Console table, one line per strategy
    pub fn render(&self) -> Vec<String> {
        let per_iteration = self.iterations.max(1) as f64;
        self.standings
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "  #{:<3}  {}: {:.3} ({:.3} total)",
                    i + 1,
                    s.name,
                    s.score,
                    s.total / per_iteration
                )
            })
            .collect()
    }
}

/// Serializes as a `name -> score` map in rank order
impl Serialize for Leaderboard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.standings.len()))?;
        for standing in &self.standings {
            map.serialize_entry(&standing.name, &standing.score)?;
        }
        map.end()
    }
}
