//! Protocol Messages
//!
//! Wire format for dashboard and block-device connections. Every message is
//! a JSON text frame tagged by a `type` field.

use serde::{Deserialize, Serialize};

use crate::game::broadcast::{Broadcast, RoundAnnouncement, StateSnapshot};
use crate::game::player::BlockId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from a connection to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Identify as a spectator dashboard.
    WebHello {
        /// Sent by the dashboard page; informational only.
        #[serde(default, rename = "clientType", skip_serializing_if = "Option::is_none")]
        client_type: Option<String>,
    },

    /// Identify as a block device.
    #[serde(rename_all = "camelCase")]
    BlockHello { block_id: BlockId },

    /// Block device's attempt at the current round.
    Report { round: u32, success: bool },

    /// Dashboard admin command.
    Admin(AdminAction),
}

/// Admin commands, tagged by an `action` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AdminAction {
    /// Start a game from the lobby.
    #[serde(rename_all = "camelCase")]
    Start {
        round0_ms: u32,
        decay_ms: u32,
        min_ms: u32,
    },
    /// Pause at the next round boundary.
    Pause,
    /// Withdraw a pause.
    Resume,
    /// Back to the lobby.
    Reset,
    /// Rename a player (lobby only).
    #[serde(rename_all = "camelCase")]
    Rename { block_id: BlockId, name: String },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from the server to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full game state (dashboards).
    State(StateSnapshot),

    /// Round start (in-game block devices).
    Round(RoundAnnouncement),

    /// Request could not be handled.
    Error(ServerError),
}

impl From<Broadcast> for ServerMessage {
    fn from(broadcast: Broadcast) -> Self {
        match broadcast {
            Broadcast::State(snapshot) => ServerMessage::State(snapshot),
            Broadcast::Round(announcement) => ServerMessage::Round(announcement),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame was not a recognised message.
    InvalidMessage,
    /// Admin command from a connection that is not a dashboard.
    NotAuthorized,
    /// Device message from a connection that has not identified as a block.
    NotIdentified,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
