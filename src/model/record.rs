use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Column names of the stored table, in order
pub const HEADER: [&str; 5] = ["time", "player", "opponent", "player_points", "opponent_points"];

/// One stored row: a match seen from `player`'s side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(deserialize_with = "unix_seconds")]
    pub time: i64,
    pub player: String,
    pub opponent: String,
    pub player_points: u32,
    pub opponent_points: u32,
}

impl MatchRecord {
    /// The same match from the opponent's side
    pub fn mirrored(&self) -> MatchRecord {
        MatchRecord {
            time: self.time,
            player: self.opponent.clone(),
            opponent: self.player.clone(),
            player_points: self.opponent_points,
            opponent_points: self.player_points,
        }
    }

    /// Cell values in column order, as written to a spreadsheet
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.time.to_string(),
            self.player.clone(),
            self.opponent.clone(),
            self.player_points.to_string(),
            self.opponent_points.to_string(),
        ]
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.player, self.opponent, self.player_points, self.opponent_points
        )
    }
}

/// Older tables carry fractional timestamps; keep whole seconds
fn unix_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let seconds = f64::deserialize(deserializer)?;
    Ok(seconds as i64)
}

/// A validated match line: two distinct names and their points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMatch {
    pub name_a: String,
    pub name_b: String,
    pub points_a: u32,
    pub points_b: u32,
}

/// Build the forward row and its mirror for one match.
///
/// Names are stored exactly as given; both directions are written so that
/// filtering on `player` alone finds every match of a participant.
pub fn build_records(parsed: &ParsedMatch, time: i64) -> [MatchRecord; 2] {
    let forward = MatchRecord {
        time,
        player: parsed.name_a.clone(),
        opponent: parsed.name_b.clone(),
        player_points: parsed.points_a,
        opponent_points: parsed.points_b,
    };
    let mirror = forward.mirrored();
    [forward, mirror]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(a: &str, b: &str, pa: u32, pb: u32) -> ParsedMatch {
        ParsedMatch {
            name_a: a.to_string(),
            name_b: b.to_string(),
            points_a: pa,
            points_b: pb,
        }
    }

    #[test]
    fn test_build_mirrored_pair() {
        let [fwd, back] = build_records(&parsed("lu", "linus", 9, 10), 42);
        assert_eq!(fwd.player, "lu");
        assert_eq!(fwd.opponent, "linus");
        assert_eq!((fwd.player_points, fwd.opponent_points), (9, 10));
        assert_eq!(back.player, "linus");
        assert_eq!(back.opponent, "lu");
        assert_eq!((back.player_points, back.opponent_points), (10, 9));
        assert_eq!(fwd.time, back.time);
    }

    #[test]
    fn test_names_not_sorted() {
        let [fwd, _] = build_records(&parsed("zed", "amy", 1, 2), 0);
        assert_eq!(fwd.player, "zed");
    }

    #[test]
    fn test_mirror_twice_is_identity() {
        let [fwd, _] = build_records(&parsed("max", "lu", 4, 10), 7);
        assert_eq!(fwd.mirrored().mirrored(), fwd);
    }

    #[test]
    fn test_fractional_time_is_truncated() {
        let mut reader = csv::Reader::from_reader(
            "time,player,opponent,player_points,opponent_points\n1590000000.75,lu,max,10,4\n"
                .as_bytes(),
        );
        let record: MatchRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(record.time, 1590000000);
        assert_eq!(record.player, "lu");
    }

    #[test]
    fn test_cells_follow_header_order() {
        let [fwd, _] = build_records(&parsed("max", "lu", 4, 10), 7);
        assert_eq!(fwd.to_cells(), vec!["7", "max", "lu", "4", "10"]);
        assert_eq!(fwd.to_string(), "max lu 4:10");
    }
}
