use crate::error::{Result, ScoreError};
use crate::model::MatchRecord;
use std::collections::HashMap;

/// Which rows a statistics query looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every stored row (each match counted from both sides)
    All,
    /// Rows where the name is the `player`
    Player(String),
    /// Rows with exactly this `player` and `opponent`, in that order
    Pair(String, String),
}

impl Filter {
    /// Build a filter from command arguments (zero to two names)
    pub fn from_args(args: &[String]) -> Result<Filter> {
        match args {
            [] => Ok(Filter::All),
            [player] => Ok(Filter::Player(player.to_lowercase())),
            [player, opponent] => Ok(Filter::Pair(player.to_lowercase(), opponent.to_lowercase())),
            _ => Err(ScoreError::InvalidQuery(format!("/stats {}", args.join(" ")))),
        }
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::Player(player) => record.player == *player,
            Filter::Pair(player, opponent) => {
                record.player == *player && record.opponent == *opponent
            }
        }
    }
}

/// Summed points for one (player, opponent) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStats {
    pub player: String,
    pub opponent: String,
    pub player_points: u64,
    pub opponent_points: u64,
}

impl GroupStats {
    /// Percentage of all points in this group won by `player`.
    ///
    /// `None` when no points were scored at all. Halves round to even.
    pub fn ratio(&self) -> Option<u32> {
        let total = self.player_points + self.opponent_points;
        if total == 0 {
            return None;
        }
        let pct = 100.0 * self.player_points as f64 / total as f64;
        Some(pct.round_ties_even() as u32)
    }
}

/// Filter rows and sum points per (player, opponent) pair.
///
/// Groups come out in the order their first row appears in the store.
pub fn aggregate(records: &[MatchRecord], filter: &Filter) -> Result<Vec<GroupStats>> {
    if records.is_empty() {
        return Err(ScoreError::NoData);
    }

    let mut groups: Vec<GroupStats> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for record in records.iter().filter(|r| filter.matches(r)) {
        let key = (record.player.as_str(), record.opponent.as_str());
        let idx = *index.entry(key).or_insert_with(|| {
            groups.push(GroupStats {
                player: record.player.clone(),
                opponent: record.opponent.clone(),
                player_points: 0,
                opponent_points: 0,
            });
            groups.len() - 1
        });
        groups[idx].player_points += u64::from(record.player_points);
        groups[idx].opponent_points += u64::from(record.opponent_points);
    }

    Ok(groups)
}
