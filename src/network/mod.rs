//! Network Layer
//!
//! WebSocket server for dashboards and block devices.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod dispatch;
pub mod server;

pub use protocol::{AdminAction, ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError, Hub, ServerConfig};
