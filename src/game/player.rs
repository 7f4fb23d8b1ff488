//! Player Registry
//!
//! Players are keyed by the stable identifier of their block device and are
//! kept in registration order, which is also snapshot order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a physical block device.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A player, bound to one block device.
///
/// Setters return `true` when the stored value actually changed so the
/// owning game can decide whether observers need a new snapshot.
#[derive(Clone, Debug)]
pub struct Player {
    id: BlockId,
    name: String,
    connected: bool,
    in_game: bool,
    score: u32,
    last_seen_ms: u64,

    // Cleared at the start of every round
    reported: bool,
    succeeded: bool,
}

impl Player {
    /// Create a player named after its block.
    pub fn new(id: BlockId) -> Self {
        Self {
            name: id.as_str().to_string(),
            id,
            connected: false,
            in_game: false,
            score: 0,
            last_seen_ms: 0,
            reported: false,
            succeeded: false,
        }
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_in_game(&self) -> bool {
        self.in_game
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms
    }

    pub fn has_reported(&self) -> bool {
        self.reported
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        if self.name == name {
            return false;
        }
        self.name = name.to_string();
        true
    }

    pub fn set_connected(&mut self, connected: bool) -> bool {
        replace_flag(&mut self.connected, connected)
    }

    pub fn set_in_game(&mut self, in_game: bool) -> bool {
        replace_flag(&mut self.in_game, in_game)
    }

    pub fn set_score(&mut self, score: u32) -> bool {
        if self.score == score {
            return false;
        }
        self.score = score;
        true
    }

    pub fn increment_score(&mut self) {
        self.score = self.score.saturating_add(1);
    }

    pub fn set_reported(&mut self, reported: bool) -> bool {
        replace_flag(&mut self.reported, reported)
    }

    pub fn set_succeeded(&mut self, succeeded: bool) -> bool {
        replace_flag(&mut self.succeeded, succeeded)
    }

    /// Record activity from the device. Not part of any snapshot.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_seen_ms = now_ms;
    }

    /// Clear the per-round flags.
    pub fn reset_round_flags(&mut self) -> bool {
        let changed = self.reported || self.succeeded;
        self.reported = false;
        self.succeeded = false;
        changed
    }
}

fn replace_flag(slot: &mut bool, value: bool) -> bool {
    let changed = *slot != value;
    *slot = value;
    changed
}

/// Ordered set of players, unique by [`BlockId`].
#[derive(Clone, Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a player by block identifier.
    pub fn get(&self, id: &BlockId) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id)
    }

    /// Mutable lookup by block identifier.
    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id() == id)
    }

    /// Return the player for `id`, creating it first if needed.
    ///
    /// The flag is `true` when a new player was created.
    pub fn add(&mut self, id: BlockId) -> (&mut Player, bool) {
        match self.players.iter().position(|p| p.id() == &id) {
            Some(index) => (&mut self.players[index], false),
            None => {
                self.players.push(Player::new(id));
                let index = self.players.len() - 1;
                (&mut self.players[index], true)
            }
        }
    }

    /// Number of players still in the game.
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_in_game()).count()
    }

    /// Clear per-round flags on every player.
    pub fn reset_round_flags(&mut self) -> bool {
        self.players
            .iter_mut()
            .fold(false, |changed, p| p.reset_round_flags() | changed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_player_defaults() {
        let player = Player::new(BlockId::new("blk-1"));

        assert_eq!(player.name(), "blk-1");
        assert!(!player.is_connected());
        assert!(!player.is_in_game());
        assert_eq!(player.score(), 0);
        assert!(!player.has_reported());
        assert!(!player.succeeded());
    }

    #[test]
    fn test_setters_report_changes() {
        let mut player = Player::new(BlockId::new("blk-1"));

        assert!(player.set_connected(true));
        assert!(!player.set_connected(true));
        assert!(player.set_name("Ada"));
        assert!(!player.set_name("Ada"));
        assert!(!player.set_score(0));
        assert!(player.set_score(3));
    }

    #[test]
    fn test_reset_round_flags() {
        let mut player = Player::new(BlockId::new("blk-1"));
        assert!(!player.reset_round_flags());

        player.set_reported(true);
        player.set_succeeded(true);
        assert!(player.reset_round_flags());
        assert!(!player.has_reported());
        assert!(!player.succeeded());
    }

    #[test]
    fn test_registry_keeps_insertion_order() {
        let mut registry = PlayerRegistry::new();
        for id in ["c", "a", "b"] {
            registry.add(BlockId::new(id));
        }
        let order: Vec<_> = registry.iter().map(|p| p.id().as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn test_lookup_miss() {
        let registry = PlayerRegistry::new();
        assert!(registry.get(&BlockId::new("nope")).is_none());
    }

    #[test]
    fn test_alive_count() {
        let mut registry = PlayerRegistry::new();
        registry.add(BlockId::new("a")).0.set_in_game(true);
        registry.add(BlockId::new("b"));
        registry.add(BlockId::new("c")).0.set_in_game(true);
        assert_eq!(registry.alive_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_add_is_idempotent(ids in proptest::collection::vec("[a-d]", 1..20)) {
            let mut registry = PlayerRegistry::new();
            for id in &ids {
                let (player, _) = registry.add(BlockId::new(id.as_str()));
                player.increment_score();
            }
            let mut distinct = ids.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(registry.len(), distinct.len());

            // Re-adding hands back the same record, score intact
            for id in &distinct {
                let expected = ids.iter().filter(|i| *i == id).count() as u32;
                let (player, created) = registry.add(BlockId::new(id.as_str()));
                prop_assert!(!created);
                prop_assert_eq!(player.score(), expected);
            }
            prop_assert_eq!(registry.len(), distinct.len());
        }
    }
}
