//! Bounded, descending-sorted leaderboard kept by the relay server.
//!
//! The store is a plain data structure with no locking of its own. The relay
//! wraps it in a mutex and holds that lock across `record_update` and the
//! broadcast of the resulting snapshot, which is what gives every connection
//! the same ordering of leaderboard pushes.

use shared::{LeaderboardEntry, Snapshot};

/// Ranked score list, highest pump count first.
///
/// Every update becomes a new entry, even when the same player already has
/// one on the board. Entries with equal pump counts keep their arrival order.
#[derive(Debug, Clone)]
pub struct RankingStore {
    entries: Vec<LeaderboardEntry>,
    capacity: usize,
}

impl RankingStore {
    /// Creates an empty board that keeps at most `capacity` entries
    ///
    /// A capacity of zero is accepted but keeps nothing; the relay rejects
    /// that value during configuration validation.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts `entry` at its rank and drops whatever falls off the end.
    ///
    /// Returns false when the entry ranked too low to stay on a full board.
    pub fn record_update(&mut self, entry: LeaderboardEntry) -> bool {
        // Ties go after existing entries with the same count.
        let position = self
            .entries
            .iter()
            .position(|existing| existing.pumps < entry.pumps)
            .unwrap_or(self.entries.len());

        if position >= self.capacity {
            return false;
        }

        self.entries.insert(position, entry);
        self.entries.truncate(self.capacity);
        true
    }

    /// Owned copy of the current ranking.
    pub fn snapshot(&self) -> Snapshot {
        self.entries.clone()
    }

    /// Number of entries currently on the board, never above `capacity`
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True until the first update is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries the board keeps
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
