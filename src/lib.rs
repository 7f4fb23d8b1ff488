//! # Block Party Server
//!
//! Central coordinator for Block Party, a multiplayer reaction game played on
//! networked "block" devices and watched from a live dashboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BLOCK PARTY SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Seeded Xorshift128+ entropy source        │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── command.rs  - Round commands and selection              │
//! │  ├── timer.rs    - Round window and deadlines                │
//! │  ├── player.rs   - Player registry                           │
//! │  ├── client.rs   - Connection registry                       │
//! │  ├── state.rs    - Game state machine                        │
//! │  ├── broadcast.rs- Snapshots and round announcements         │
//! │  └── tick.rs     - Round-boundary driver                     │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server and tick loop            │
//! │  ├── dispatch.rs - Inbound message handling                  │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or the network. Time is passed
//! in as milliseconds and randomness comes from a seeded generator, so a
//! game replays identically from the same seed and the same calls.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::{DeterministicRng, EntropySource};
pub use crate::game::state::{Game, GameError, Phase};
pub use crate::game::player::{BlockId, Player};
pub use crate::game::command::Command;
pub use crate::game::timer::TimingParams;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
