//! # Controller Input Server Library
//!
//! This library aggregates live input from physical controller devices for a
//! game loop running at its own cadence. Devices connect over a reliable byte
//! stream, are assigned one of a fixed number of player slots, and then stream
//! single-byte control messages that are decoded into per-slot input state.
//!
//! ## Core Responsibilities
//!
//! ### Slot Assignment
//! Each accepted connection is mapped to a player slot, keyed by the device's
//! transport identity. A device reconnecting under the same identity takes
//! its previous slot back; a device arriving when every slot is taken is told
//! so with a reject byte and disconnected.
//!
//! ### Input Decoding
//! Every connection gets its own decoder task that translates bytes into
//! direction, action and pause updates on the shared slot table.
//!
//! ### Non-Blocking Queries
//! The game loop polls the table through [`query::InputQuery`]. Queries only
//! take a short in-memory lock, so the game loop never waits on the network.
//!
//! ## Architecture Design
//!
//! ```text
//! ListenLoop ──spawns──► ConnectionDecoder ──writes──► SlotTable ◄──reads── InputQuery ◄── game loop
//! ```
//!
//! ### Task Model
//! The listen loop and every decoder run as detached tokio tasks. A single
//! shutdown signal owned by [`lifecycle::InputServer`] unblocks pending
//! accepts and reads, so no task outlives `stop()` for long.
//!
//! ### Lease Fencing
//! Slot writes carry a lease ticket. After a takeover or a restart the old
//! ticket is dead, and writes from the connection that lost the slot are
//! ignored rather than corrupting the new owner's input.
//!
//! ## Module Organization
//!
//! - `slot_table`: the lock-protected player table and pause flag
//! - `decoder`: per-connection byte stream decoder
//! - `listener`: accept loop, slot assignment and assignment reply
//! - `advertiser`: UDP discovery responder for the stream endpoint
//! - `lifecycle`: `InputServer` start/stop state machine
//! - `query`: read-only queries for the game loop
//! - `config`: injected server configuration
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::lifecycle::InputServer;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = InputServer::new(ServerConfig::default());
//!     server.start(4).await?;
//!
//!     let input = server.query();
//!     loop {
//!         for player in 0..4 {
//!             let _direction = input.direction(player);
//!             let _firing = input.action_pressed(player);
//!         }
//!         if input.paused() {
//!             break;
//!         }
//!         tokio::time::sleep(Duration::from_millis(16)).await;
//!     }
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod advertiser;
pub mod config;
pub mod decoder;
pub mod lifecycle;
pub mod listener;
pub mod query;
pub mod slot_table;

pub use config::{AdvertiseConfig, IdentityMode, ServerConfig};
pub use lifecycle::{InputServer, ServerError};
pub use query::{InputQuery, PlayerInput};
