//! # Star Sync Client Library
//!
//! Client side of the star-collection game: it simulates the local ship,
//! mirrors everyone else from server broadcasts, and draws the result.
//!
//! ## Architecture Overview
//!
//! The server is authoritative for rosters, the star and the scores. The
//! client is authoritative only for its own ship's movement, which it
//! integrates locally and reports as movement intents whenever the pose
//! changes. Remote ships are never simulated; they snap to each
//! `PlayerMoved` broadcast as it arrives.
//!
//! ### Star Claims
//! Overlap with the star is detected locally. Each star placement is claimed
//! at most once, so a ship parked on the star does not flood the server.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - Local ship physics (turning, thrust, drag, speed cap, world wrap)
//! - Remote player views keyed by session id
//! - Application of server events and generation of intents
//!
//! ### Input Module (`input`)
//! - Arrow key (or A/D/W) sampling into a per-frame `ShipInput`
//!
//! ### Network Module (`network`)
//! - TCP connection on a background thread
//! - Non-blocking send and poll for the render loop
//! - Optional simulated latency
//!
//! ### Rendering Module (`rendering`)
//! - Team-tinted ships, the star, scores and connection status
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::game::ClientGameState;
//! use client::input::ShipInput;
//! use client::network::{NetworkClient, NetworkEvent};
//!
//! let mut network = NetworkClient::connect("127.0.0.1:3000", 0)?;
//! let mut game = ClientGameState::new();
//!
//! loop {
//!     for event in network.poll() {
//!         if let NetworkEvent::Received(event) = event {
//!             game.apply_server_event(event);
//!         }
//!     }
//!     for intent in game.update(&ShipInput::default(), 1.0 / 60.0) {
//!         network.send(intent);
//!     }
//! #   break;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
