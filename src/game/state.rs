//! Game State Machine
//!
//! The single authoritative game: phase, round, command and timing, plus the
//! player and connection registries. Every game-altering operation goes
//! through [`Game`].
//!
//! Operations are synchronous and deterministic. Time arrives as an explicit
//! `now_ms` argument; observers are notified through the outbox (see
//! `broadcast.rs`), never through callbacks from inside a mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::rng::DeterministicRng;
use crate::game::broadcast::Outbound;
use crate::game::client::{ClientMeta, ClientRegistry, ConnectionId};
use crate::game::command::{Command, CommandSelector};
use crate::game::player::{BlockId, Player, PlayerRegistry};
use crate::game::timer::{RoundTimer, TimingParams};

// =============================================================================
// PHASE
// =============================================================================

/// Lifecycle stage of the game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Players register; settings can be changed.
    #[default]
    Lobby,
    /// A round is live.
    Running,
    /// Between rounds.
    WaitingNextRound,
    /// Held at a round boundary until resumed.
    Paused,
    /// One or no players left.
    Done,
}

impl Phase {
    /// Wire name of this phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "LOBBY",
            Phase::Running => "RUNNING",
            Phase::WaitingNextRound => "WAITING_NEXT_ROUND",
            Phase::Paused => "PAUSED",
            Phase::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERRORS AND OUTCOMES
// =============================================================================

/// Why an operation was not applied. State is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Operation not allowed in the current phase.
    #[error("expected phase {expected}, game is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    /// Rename with an empty name.
    #[error("name must not be empty")]
    EmptyName,

    /// No player with this identifier.
    #[error("unknown player {0}")]
    UnknownPlayer(BlockId),

    /// Player was eliminated or never joined this game.
    #[error("player {0} is not in the game")]
    NotInGame(BlockId),

    /// Report for a round other than the live one.
    #[error("report for round {got}, current round is {expected}")]
    StaleReport { expected: u32, got: u32 },

    /// Second report in the same round.
    #[error("player {0} already reported this round")]
    AlreadyReported(BlockId),

    /// Report arrived after the deadline.
    #[error("player {0} reported after the deadline")]
    LateReport(BlockId),
}

/// Result of advancing to the next round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A new round was announced.
    Started { round: u32, command: Command },
    /// One or no players left; the game is over.
    GameOver { winner: Option<BlockId> },
}

/// Result of closing a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Players knocked out this round.
    pub eliminated: Vec<BlockId>,
    /// Window for the next round.
    pub window_ms: u32,
}

// =============================================================================
// GAME
// =============================================================================

/// The game state machine.
pub struct Game {
    phase: Phase,
    round: u32,
    current_cmd: Command,
    timer: RoundTimer,
    pause_requested: bool,
    /// When the tick driver should leave `WAITING_NEXT_ROUND`.
    next_round_at_ms: Option<u64>,

    players: PlayerRegistry,
    clients: ClientRegistry,
    rng: DeterministicRng,

    /// Snapshot-visible state changed since the last publish.
    pub(super) dirty: bool,
    pub(super) outbox: Vec<Outbound>,
}

impl Game {
    /// Create a game in the lobby with default timing.
    pub fn new(seed: u64) -> Self {
        Self {
            phase: Phase::Lobby,
            round: 0,
            current_cmd: Command::Shake,
            timer: RoundTimer::default(),
            pause_requested: false,
            next_round_at_ms: None,
            players: PlayerRegistry::new(),
            clients: ClientRegistry::new(),
            rng: DeterministicRng::new(seed),
            dirty: false,
            outbox: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_cmd(&self) -> Command {
        self.current_cmd
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn window_ms(&self) -> u32 {
        self.timer.window_ms()
    }

    pub fn round_start_ms(&self) -> u64 {
        self.timer.round_start_ms()
    }

    pub fn deadline_ms(&self) -> u64 {
        self.timer.deadline_ms()
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause_requested
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub(crate) fn next_round_at_ms(&self) -> Option<u64> {
        self.next_round_at_ms
    }

    pub(crate) fn schedule_next_round(&mut self, at_ms: u64) {
        self.next_round_at_ms = Some(at_ms);
    }

    // -------------------------------------------------------------------------
    // Change-tracked setters
    // -------------------------------------------------------------------------

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty = true;
        }
    }

    fn set_round(&mut self, round: u32) {
        if self.round != round {
            self.round = round;
            self.dirty = true;
        }
    }

    fn set_current_cmd(&mut self, cmd: Command) {
        if self.current_cmd != cmd {
            self.current_cmd = cmd;
            self.dirty = true;
        }
    }

    /// Push a state snapshot to dashboards if anything visible changed.
    pub(crate) fn publish(&mut self) {
        if std::mem::take(&mut self.dirty) {
            self.broadcast_state_to_web();
        }
    }

    // -------------------------------------------------------------------------
    // Players
    // -------------------------------------------------------------------------

    pub fn get_player(&self, id: &BlockId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Return the player for `id`, registering it if it is new.
    ///
    /// Registration is announced to dashboards; an existing player is
    /// returned unchanged.
    pub fn add_player(&mut self, id: BlockId) -> &Player {
        if self.players.add(id.clone()).1 {
            self.dirty = true;
            self.publish();
        }
        self.players.add(id).0
    }

    /// Update a player's connected flag.
    pub fn set_player_connected(&mut self, id: &BlockId, connected: bool) -> Result<(), GameError> {
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
        self.dirty |= player.set_connected(connected);
        self.publish();
        Ok(())
    }

    /// Stamp device activity. Returns `false` for an unknown player.
    pub fn touch_player(&mut self, id: &BlockId, now_ms: u64) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.touch(now_ms);
                true
            }
            None => false,
        }
    }

    /// Number of players still in the game.
    pub fn alive_count(&self) -> usize {
        self.players.alive_count()
    }

    /// Clear every player's per-round flags.
    pub fn reset_round_flags(&mut self) {
        self.dirty |= self.players.reset_round_flags();
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Connections
    // -------------------------------------------------------------------------

    pub fn add_client(&mut self, id: ConnectionId) {
        self.clients.add(id);
    }

    pub fn remove_client(&mut self, id: ConnectionId) -> Option<ClientMeta> {
        self.clients.remove(id)
    }

    pub fn get_client(&self, id: ConnectionId) -> Option<&ClientMeta> {
        self.clients.get(id)
    }

    /// Mutable connection record, for role assignment.
    pub fn get_client_mut(&mut self, id: ConnectionId) -> Option<&mut ClientMeta> {
        self.clients.get_mut(id)
    }

    // -------------------------------------------------------------------------
    // Rounds
    // -------------------------------------------------------------------------

    /// Advance to the next round, or end the game if one or no players remain.
    pub fn next_round(&mut self, now_ms: u64) -> RoundOutcome {
        self.next_round_at_ms = None;

        if self.players.alive_count() <= 1 {
            self.set_phase(Phase::Done);
            self.publish();
            let winner = self.players.iter().find(|p| p.is_in_game()).map(|p| p.id().clone());
            return RoundOutcome::GameOver { winner };
        }

        let cmd = CommandSelector::draw(&mut self.rng);
        self.set_current_cmd(cmd);
        self.dirty |= self.players.reset_round_flags();
        self.set_round(self.round + 1);
        self.set_phase(Phase::Running);
        self.timer.mark_round(now_ms);

        self.publish();
        self.broadcast_round_to_blocks();

        RoundOutcome::Started {
            round: self.round,
            command: cmd,
        }
    }

    /// Close the live round: eliminate in-game players who did not succeed,
    /// then shrink the window.
    pub fn end_round(&mut self) -> RoundSummary {
        let mut eliminated = Vec::new();
        for player in self.players.iter_mut() {
            if player.is_in_game() && !player.succeeded() {
                player.set_in_game(false);
                eliminated.push(player.id().clone());
            }
        }
        self.dirty |= !eliminated.is_empty();

        let window_ms = self.timer.shrink();
        self.publish();

        RoundSummary { eliminated, window_ms }
    }

    /// Record a device's attempt at the live round's command.
    pub fn record_report(
        &mut self,
        id: &BlockId,
        round: u32,
        success: bool,
        now_ms: u64,
    ) -> Result<(), GameError> {
        self.expect_phase(Phase::Running)?;
        if round != self.round {
            return Err(GameError::StaleReport {
                expected: self.round,
                got: round,
            });
        }
        let deadline = self.timer.deadline_ms();
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
        if !player.is_in_game() {
            return Err(GameError::NotInGame(id.clone()));
        }
        if player.has_reported() {
            return Err(GameError::AlreadyReported(id.clone()));
        }
        if now_ms > deadline {
            return Err(GameError::LateReport(id.clone()));
        }

        player.set_reported(true);
        if success {
            player.set_succeeded(true);
            player.increment_score();
        }
        self.dirty = true;
        self.publish();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Admin actions
    // -------------------------------------------------------------------------

    /// Start a game from the lobby with every connected player, and announce
    /// the first round.
    pub fn start_game(&mut self, params: TimingParams, now_ms: u64) -> Result<RoundOutcome, GameError> {
        self.expect_phase(Phase::Lobby)?;

        self.set_phase(Phase::Running);
        self.set_round(0);
        self.timer.configure(params);
        self.pause_requested = false;

        for player in self.players.iter_mut() {
            let connected = player.is_connected();
            self.dirty |= player.set_in_game(connected);
            self.dirty |= player.set_score(0);
        }

        Ok(self.next_round(now_ms))
    }

    /// Ask the tick driver to pause at the next round boundary.
    pub fn pause_game(&mut self) {
        self.pause_requested = true;
    }

    /// Withdraw a pause request and leave `PAUSED` if the game is held there.
    pub fn resume_game(&mut self) {
        self.pause_requested = false;
        if self.phase == Phase::Paused {
            self.next_round_at_ms = None;
            self.set_phase(Phase::WaitingNextRound);
        }
        self.publish();
    }

    /// Return to the lobby from any phase, keeping registered players.
    pub fn reset_game(&mut self) {
        self.set_phase(Phase::Lobby);
        self.set_round(0);
        self.timer.restore();
        self.pause_requested = false;
        self.next_round_at_ms = None;

        for player in self.players.iter_mut() {
            self.dirty |= player.set_in_game(false);
            self.dirty |= player.set_score(0);
            self.dirty |= player.reset_round_flags();
        }
        self.publish();
    }

    /// Rename a player. Lobby only.
    pub fn rename_player(&mut self, id: &BlockId, name: &str) -> Result<(), GameError> {
        self.expect_phase(Phase::Lobby)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.clone()))?;
        self.dirty |= player.set_name(name);
        self.publish();
        Ok(())
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
