//! # Star Sync Server Library
//!
//! This library provides the authoritative server for the team star-collection
//! game. It owns the canonical game state, applies the intents clients send,
//! and fans the resulting changes out to every connected session.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server holds the only writable copy of the player roster, the star's
//! position and the team scores. Clients render from what the server tells
//! them about everyone but themselves.
//!
//! ### Session Management
//! Each TCP connection becomes a session with an id that is never reused.
//! Joining sessions receive a full snapshot; everyone else receives deltas.
//!
//! ### Trust Model
//! Clients are authoritative for their own ship's pose and for claiming the
//! star. The server stores reported poses verbatim and honors every claim;
//! it only refuses payloads that fail to decode or carry non-finite numbers.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! One task owns the game state and the session registry and handles one
//! message at a time: accepted connection, decoded client event, or closed
//! connection. Reader and writer tasks per session only exchange messages
//! with that loop, so no locks guard game state.
//!
//! ## Module Organization
//!
//! - `game`: the state store and its event handlers, which return the
//!   events to deliver instead of sending them
//! - `client_manager`: session ids, capacity, per-session outbound queues
//!   and broadcast routing
//! - `network`: the TCP listener, per-session tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameState;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> server::ServerResult<()> {
//!     let server = Server::new("127.0.0.1:3000", 32)
//!         .await?
//!         .with_game_state(GameState::with_seed(42));
//!
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;

/// Result type used at the server's I/O boundaries.
pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
