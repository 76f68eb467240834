//! # Leaderboard Relay Client
//!
//! Client side of the balloon task's social-comparison leaderboard. The
//! experiment reports one pump count per finished trial and, before showing
//! the next balloon, draws whatever ranking the relay pushed most recently.
//!
//! ## Architecture Overview
//!
//! ### Fire-and-Forget Updates
//! [`network::RelayClient::send_update`] writes one JSON line and returns.
//! Network failures are logged instead of returned: losing the relay must
//! never end a running experiment session.
//!
//! ### Background Listener
//! A tokio task owns the read half of the connection and replaces the cached
//! leaderboard on every push. Reading the cache with
//! [`network::RelayClient::get_leaderboard`] never blocks. When the relay
//! goes away the last ranking stays cached and
//! [`network::RelayClient::is_stopped`] turns true.
//!
//! ## Module Organization
//!
//! - `network`: connection, update sending and the listener task
//! - `display`: fixed-width leaderboard table
//! - `input`: parsing of pump counts typed by a terminal player
//! - `error`: client error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::display::format_leaderboard;
//! use client::network::RelayClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RelayClient::connect_as("127.0.0.1:5555", Some("3".into())).await?;
//!
//!     // After a trial with 14 pumps
//!     client.send_update(14).await;
//!
//!     // Before the next balloon
//!     let board = client.get_leaderboard();
//!     println!("{}", format_leaderboard(&board, client.tag()));
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod error;
pub mod input;
pub mod network;

pub use error::ClientError;
pub use network::RelayClient;
