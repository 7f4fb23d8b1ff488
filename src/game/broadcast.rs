//! Broadcasting
//!
//! Renders state snapshots and round announcements and addresses them to the
//! right connections. Nothing here touches the network: messages are queued
//! in the game's outbox and the transport drains them with
//! [`Game::take_outbound`] after each operation.

use serde::{Deserialize, Serialize};

use crate::game::client::ConnectionId;
use crate::game::command::Command;
use crate::game::player::{BlockId, Player};
use crate::game::state::{Game, Phase};

/// Full game state, as shown on dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub phase: Phase,
    pub round: u32,
    pub current_cmd: Command,
    /// In registration order.
    pub players: Vec<PlayerSnapshot>,
}

/// One player's row in a [`StateSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub block_id: BlockId,
    pub name: String,
    pub in_game: bool,
    pub score: u32,
    pub connected: bool,
    pub reported: bool,
    pub successful: bool,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            block_id: p.id().clone(),
            name: p.name().to_string(),
            in_game: p.is_in_game(),
            score: p.score(),
            connected: p.is_connected(),
            reported: p.has_reported(),
            successful: p.succeeded(),
        }
    }
}

/// Start-of-round notice for block devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundAnnouncement {
    pub round: u32,
    pub cmd: Command,
    pub round_start_ms: u64,
    /// Window length for this round.
    pub game_time_ms: u32,
    pub deadline_ms: u64,
}

/// Payload queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Broadcast {
    State(StateSnapshot),
    Round(RoundAnnouncement),
}

/// A payload addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: ConnectionId,
    pub message: Broadcast,
}

impl Game {
    /// Render the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase(),
            round: self.round(),
            current_cmd: self.current_cmd(),
            players: self.players().iter().map(PlayerSnapshot::from).collect(),
        }
    }

    /// Render the live round's announcement.
    pub fn round_announcement(&self) -> RoundAnnouncement {
        RoundAnnouncement {
            round: self.round(),
            cmd: self.current_cmd(),
            round_start_ms: self.round_start_ms(),
            game_time_ms: self.window_ms(),
            deadline_ms: self.deadline_ms(),
        }
    }

    /// Queue a snapshot for every dashboard.
    pub fn broadcast_state_to_web(&mut self) {
        let recipients: Vec<ConnectionId> = self.clients().dashboards().map(|c| c.id).collect();
        if recipients.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.outbox.extend(recipients.into_iter().map(|to| Outbound {
            to,
            message: Broadcast::State(snapshot.clone()),
        }));
    }

    /// Queue a snapshot for one connection, if it is a dashboard.
    ///
    /// Used to bring a late-joining dashboard up to date.
    pub fn broadcast_state_to(&mut self, to: ConnectionId) -> bool {
        if !self.get_client(to).is_some_and(|c| c.is_dashboard()) {
            return false;
        }
        let message = Broadcast::State(self.snapshot());
        self.outbox.push(Outbound { to, message });
        true
    }

    /// Queue the round announcement for every block connection whose player
    /// is still in the game.
    pub fn broadcast_round_to_blocks(&mut self) {
        let recipients: Vec<ConnectionId> = self
            .clients()
            .blocks()
            .filter(|(_, block)| self.get_player(block).is_some_and(|p| p.is_in_game()))
            .map(|(conn, _)| conn)
            .collect();
        let announcement = self.round_announcement();
        self.outbox.extend(recipients.into_iter().map(|to| Outbound {
            to,
            message: Broadcast::Round(announcement),
        }));
    }

    /// Drain everything queued since the last call.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }
}
