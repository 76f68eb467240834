//! Parsing of the terminal player's input lines.

/// What a line typed by the player asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// A finished trial with this many pumps
    Report(u64),
    ShowLeaderboard,
    Quit,
    Unknown(String),
}

/// Accepts only plain decimal digits, surrounding whitespace ignored.
pub fn parse_pump_count(line: &str) -> Option<u64> {
    let digits = line.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn parse_command(line: &str) -> PlayerCommand {
    if let Some(pumps) = parse_pump_count(line) {
        return PlayerCommand::Report(pumps);
    }

    match line.trim().to_ascii_lowercase().as_str() {
        "" | "l" | "board" | "leaderboard" => PlayerCommand::ShowLeaderboard,
        "q" | "quit" | "exit" => PlayerCommand::Quit,
        _ => PlayerCommand::Unknown(line.trim().to_string()),
    }
}
