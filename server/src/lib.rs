//! # Leaderboard Relay Server
//!
//! This library implements the relay that adds social comparison to the
//! balloon task: every player connection reports its pump count after each
//! trial, and every connected player gets the updated ranking pushed back.
//!
//! ## Core Responsibilities
//!
//! ### Connection Management
//! Accepts player connections up to a fixed limit, assigns each one an
//! increasing [`shared::PlayerId`], and turns away extra players with a short
//! plain-text notice. A rejected connection is never registered and never
//! receives a broadcast.
//!
//! ### Ranking
//! Keeps a bounded leaderboard sorted by pump count, highest first. Every
//! update is a new entry; ties keep arrival order and the lowest entries fall
//! off once the board is full.
//!
//! ### Broadcasting
//! After each accepted update the full ranking is queued for every registered
//! connection, including the one that sent the update. A player whose
//! socket stops draining falls behind a bounded outbox and is disconnected.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Each connection runs a reader task and a writer task on the tokio runtime.
//! Readers share one [`network::RelayState`], whose ranking lock is held
//! across snapshot and enqueue so every player sees pushes in the order the
//! updates were applied. Failures on one connection only end that connection.
//!
//! ### Newline-Delimited JSON
//! Messages are single JSON lines (see [`shared::framing`]). A malformed line
//! is logged and dropped; the connection stays open.
//!
//! ## Module Organization
//!
//! - `config`: listening address and limits
//! - `discovery`: the LAN address announced to players
//! - `ranking`: the bounded, sorted leaderboard
//! - `registry`: connected players and their outboxes
//! - `network`: accept loop, per-connection tasks and the run handle
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::RelayConfig;
//! use server::network::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 0.0.0.0:5555, 5 players, 8 leaderboard slots
//!     let server = RelayServer::bind(RelayConfig::default()).await?;
//!
//!     // Accept players until Ctrl+C
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod ranking;
pub mod registry;

pub use config::RelayConfig;
pub use error::ServerError;
pub use network::{start, RelayHandle, RelayServer, RelayState};
