//! Connection Registry
//!
//! Every open connection and the role it has declared. Records are created
//! unbound; the message handler assigns the role once the peer identifies
//! itself.

use std::collections::BTreeMap;

use crate::game::player::BlockId;

/// Transport-assigned connection identifier, unique while open.
pub type ConnectionId = u32;

/// Role a connection has declared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClientRole {
    /// Connected, not yet identified.
    #[default]
    Unbound,
    /// Spectator dashboard; receives state snapshots.
    Dashboard,
    /// Block device bound to a player identifier.
    ///
    /// The player record may not exist yet.
    Block(BlockId),
}

/// Metadata for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientMeta {
    pub id: ConnectionId,
    pub role: ClientRole,
}

impl ClientMeta {
    /// Whether this connection is a dashboard.
    pub fn is_dashboard(&self) -> bool {
        self.role == ClientRole::Dashboard
    }

    /// Bound block identifier, for block connections.
    pub fn block_id(&self) -> Option<&BlockId> {
        match &self.role {
            ClientRole::Block(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<ConnectionId, ClientMeta>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, unbound connection. Re-adding an id resets its role.
    pub fn add(&mut self, id: ConnectionId) {
        self.clients.insert(id, ClientMeta { id, role: ClientRole::Unbound });
    }

    /// Drop a connection, returning its last record.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ClientMeta> {
        self.clients.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ClientMeta> {
        self.clients.get(&id)
    }

    /// Mutable record, for role assignment.
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ClientMeta> {
        self.clients.get_mut(&id)
    }

    /// Dashboard connections.
    pub fn dashboards(&self) -> impl Iterator<Item = &ClientMeta> {
        self.clients.values().filter(|c| c.is_dashboard())
    }

    /// Block connections with their bound identifiers.
    pub fn blocks(&self) -> impl Iterator<Item = (ConnectionId, &BlockId)> {
        self.clients
            .values()
            .filter_map(|c| c.block_id().map(|block| (c.id, block)))
    }

    /// Whether any open connection is bound to `block`.
    pub fn is_bound(&self, block: &BlockId) -> bool {
        self.blocks().any(|(_, b)| b == block)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
