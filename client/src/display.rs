//! Text rendering of the leaderboard shown before each balloon.

use shared::{LeaderboardEntry, PlayerTag};
use std::fmt::Write;

const RULE_WIDTH: usize = 32;

/// Label shown in the Player column. Numeric identifiers read as
/// "Player N"; names typed into the setup dialog are shown as-is.
pub fn player_label(tag: &PlayerTag) -> String {
    match tag {
        PlayerTag::Number(n) => format!("Player {}", n),
        PlayerTag::Text(text) if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            format!("Player {}", text)
        }
        PlayerTag::Text(text) => text.clone(),
    }
}

// "1" and 1 name the same participant; compare the way they are displayed.
fn is_same_player(a: &PlayerTag, b: &PlayerTag) -> bool {
    a.to_string() == b.to_string()
}

/// Formats the ranking as a fixed-width table, marking the local player's
/// rows with "(You)".
pub fn format_leaderboard(entries: &[LeaderboardEntry], me: Option<&PlayerTag>) -> String {
    let mut text = String::from("Leaderboard\n\n");

    if entries.is_empty() {
        text.push_str("Waiting for scores...\n");
        return text;
    }

    let _ = writeln!(text, "{:<5}{:<16}{:>7}", "Rank", "Player", "Pumps");
    text.push_str(&"-".repeat(RULE_WIDTH));
    text.push('\n');

    for (rank, entry) in entries.iter().enumerate() {
        let mut label = player_label(&entry.id);
        if me.is_some_and(|me| is_same_player(me, &entry.id)) {
            label.push_str(" (You)");
        }
        let _ = writeln!(text, "{:<5}{:<16}{:>7}", rank + 1, label, entry.pumps);
    }

    text
}
