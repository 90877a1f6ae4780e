use super::aggregate::GroupStats;

/// One fixed-width line: names padded to 10, points to 2, then the ratio
pub fn format_group(group: &GroupStats) -> String {
    let ratio = match group.ratio() {
        Some(r) => r.to_string(),
        None => "-".to_string(),
    };
    format!(
        "{:<10}{:<10}{:>2}:{:>2}\t{}%",
        group.player, group.opponent, group.player_points, group.opponent_points, ratio
    )
}

/// All groups, one per line, in aggregation order
pub fn format_table(groups: &[GroupStats]) -> String {
    groups.iter().map(format_group).collect::<Vec<_>>().join("\n")
}
