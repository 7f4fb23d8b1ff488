//! Game Logic Module
//!
//! The authoritative game core. Deterministic: no I/O, no system time, all
//! randomness from a seeded source.
//!
//! ## Module Structure
//!
//! - `command`: Round commands and the command selector
//! - `timer`: Round window, decay schedule, start/deadline
//! - `player`: Player entity and registry
//! - `client`: Connection registry and roles
//! - `state`: Game state machine
//! - `broadcast`: Snapshots, round announcements, outbox
//! - `tick`: Round-boundary driver

pub mod command;
pub mod timer;
pub mod player;
pub mod client;
pub mod state;
pub mod broadcast;
pub mod tick;

// Re-export key types
pub use command::{Command, CommandSelector};
pub use timer::{RoundTimer, TimingParams, TRANSMISSION_BUFFER_MS};
pub use player::{BlockId, Player, PlayerRegistry};
pub use client::{ClientMeta, ClientRegistry, ClientRole, ConnectionId};
pub use state::{Game, GameError, Phase, RoundOutcome, RoundSummary};
pub use broadcast::{Broadcast, Outbound, RoundAnnouncement, StateSnapshot};
pub use tick::{tick, TickConfig, TickResult};
