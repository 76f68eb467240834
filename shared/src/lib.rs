//! Wire protocol shared by the leaderboard relay server and its clients.
//!
//! Players send [`ScoreUpdate`] objects after every completed balloon trial and
//! receive the full ranked [`Snapshot`] back whenever anyone scores. All
//! messages travel as newline-delimited JSON, see [`framing`].

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod framing;

pub use framing::ProtocolError;

pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_MAX_PLAYERS: usize = 5;
pub const DEFAULT_MAX_LEADERBOARD: usize = 8;

/// Plain-text notice written to a connection the server has no room for.
pub const REJECTION_MESSAGE: &str = "Server is full. Try again later.";

/// Server-assigned handle for one connection lifetime.
///
/// Identifiers start at 1 and are never reused while the server runs; a
/// reconnecting player gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `id` value carried on the wire: either a number or a free-form string
/// typed into the experiment's setup dialog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerTag {
    Number(u64),
    Text(String),
}

impl From<PlayerId> for PlayerTag {
    fn from(id: PlayerId) -> Self {
        PlayerTag::Number(u64::from(id.0))
    }
}

impl From<u64> for PlayerTag {
    fn from(value: u64) -> Self {
        PlayerTag::Number(value)
    }
}

impl From<&str> for PlayerTag {
    fn from(value: &str) -> Self {
        PlayerTag::Text(value.to_string())
    }
}

impl From<String> for PlayerTag {
    fn from(value: String) -> Self {
        PlayerTag::Text(value)
    }
}

impl fmt::Display for PlayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerTag::Number(n) => write!(f, "{}", n),
            PlayerTag::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Client → server message sent once per completed trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    /// Missing ids are replaced by the sender's [`PlayerId`] on the server.
    #[serde(default, alias = "player_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<PlayerTag>,
    #[serde(deserialize_with = "deserialize_pumps")]
    pub pumps: u64,
}

impl ScoreUpdate {
    pub fn new(id: Option<PlayerTag>, pumps: u64) -> Self {
        Self { id, pumps }
    }

    /// Resolves the update into a ranked entry, falling back to the
    /// connection's own identifier when the client sent none.
    pub fn into_entry(self, sender: PlayerId) -> LeaderboardEntry {
        LeaderboardEntry {
            id: self.id.unwrap_or_else(|| sender.into()),
            pumps: self.pumps,
        }
    }
}

/// One row of the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: PlayerTag,
    pub pumps: u64,
}

impl LeaderboardEntry {
    pub fn new(id: impl Into<PlayerTag>, pumps: u64) -> Self {
        Self {
            id: id.into(),
            pumps,
        }
    }
}

/// Server → client message: the ranking, highest pump count first.
pub type Snapshot = Vec<LeaderboardEntry>;

// Older player scripts send the pressed key ("7") instead of a number.
fn deserialize_pumps<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPumps {
        Count(u64),
        Text(String),
    }

    match RawPumps::deserialize(deserializer)? {
        RawPumps::Count(count) => Ok(count),
        RawPumps::Text(text) => {
            let digits = text.trim();
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(de::Error::custom(format!("invalid pump count {:?}", text)));
            }
            digits
                .parse::<u64>()
                .map_err(|e| de::Error::custom(format!("invalid pump count {:?}: {}", text, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "7");
        assert_eq!(PlayerTag::from(PlayerId(3)), PlayerTag::Number(3));
    }

    #[test]
    fn test_update_with_string_id() {
        let update: ScoreUpdate = serde_json::from_str(r#"{"id":"1","pumps":5}"#).unwrap();
        assert_eq!(update.id, Some(PlayerTag::Text("1".to_string())));
        assert_eq!(update.pumps, 5);
    }

    #[test]
    fn test_update_with_numeric_id() {
        let update: ScoreUpdate = serde_json::from_str(r#"{"id":4,"pumps":12}"#).unwrap();
        assert_eq!(update.id, Some(PlayerTag::Number(4)));
        assert_eq!(update.pumps, 12);
    }

    #[test]
    fn test_update_without_id_uses_sender() {
        let update: ScoreUpdate = serde_json::from_str(r#"{"pumps":3}"#).unwrap();
        assert_eq!(update.id, None);

        let entry = update.into_entry(PlayerId(9));
        assert_eq!(entry, LeaderboardEntry::new(9u64, 3));
    }

    #[test]
    fn test_update_accepts_legacy_field_and_string_pumps() {
        let update: ScoreUpdate =
            serde_json::from_str(r#"{"player_id":2,"pumps":"7"}"#).unwrap();
        assert_eq!(update.id, Some(PlayerTag::Number(2)));
        assert_eq!(update.pumps, 7);
    }

    #[test]
    fn test_update_rejects_bad_pumps() {
        for raw in [
            r#"{"id":"1","pumps":-1}"#,
            r#"{"id":"1","pumps":2.5}"#,
            r#"{"id":"1","pumps":"lots"}"#,
            r#"{"id":"1","pumps":""}"#,
            r#"{"id":"1"}"#,
        ] {
            assert!(
                serde_json::from_str::<ScoreUpdate>(raw).is_err(),
                "should reject {}",
                raw
            );
        }
    }

    #[test]
    fn test_update_serializes_pumps_as_integer() {
        let update = ScoreUpdate::new(Some("alice".into()), 11);
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"id":"alice","pumps":11}"#);

        let anonymous = ScoreUpdate::new(None, 4);
        assert_eq!(serde_json::to_string(&anonymous).unwrap(), r#"{"pumps":4}"#);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot: Snapshot = vec![
            LeaderboardEntry::new("2", 9),
            LeaderboardEntry::new("1", 5),
        ];
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"[{"id":"2","pumps":9},{"id":"1","pumps":5}]"#);
    }
}
