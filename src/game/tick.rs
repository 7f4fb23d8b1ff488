//! Round Driver
//!
//! Detects passed deadlines and moves the game across round boundaries. The
//! server calls [`tick`] on a fixed interval; like the rest of `game/` it is
//! deterministic given the `now_ms` it is handed.

use crate::game::player::BlockId;
use crate::game::state::{Game, Phase, RoundOutcome};

/// Configuration for the round driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    /// Pause between the end of one round and the announcement of the next.
    pub intermission_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { intermission_ms: 2000 }
    }
}

/// What a tick did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickResult {
    /// Players eliminated, if a round closed this tick.
    pub round_ended: Option<Vec<BlockId>>,
    /// Round number, if a round was announced this tick.
    pub round_started: Option<u32>,
    /// Game entered `PAUSED` this tick.
    pub paused: bool,
    /// Game entered `DONE` this tick.
    pub game_over: bool,
}

/// Advance the game to `now_ms`.
///
/// A live round whose deadline has passed is closed and the game waits one
/// intermission. When the intermission is over the game pauses if a pause
/// was requested, otherwise the next round starts.
pub fn tick(game: &mut Game, now_ms: u64, config: &TickConfig) -> TickResult {
    let mut result = TickResult::default();

    match game.phase() {
        Phase::Running => {
            if game.timer().expired(now_ms) {
                let summary = game.end_round();
                game.set_phase(Phase::WaitingNextRound);
                game.schedule_next_round(now_ms.saturating_add(config.intermission_ms));
                game.publish();
                result.round_ended = Some(summary.eliminated);
            }
        }
        Phase::WaitingNextRound => match game.next_round_at_ms() {
            None => game.schedule_next_round(now_ms.saturating_add(config.intermission_ms)),
            Some(at) if now_ms >= at => {
                if game.is_pause_requested() {
                    game.set_phase(Phase::Paused);
                    game.publish();
                    result.paused = true;
                } else {
                    match game.next_round(now_ms) {
                        RoundOutcome::Started { round, .. } => result.round_started = Some(round),
                        RoundOutcome::GameOver { .. } => result.game_over = true,
                    }
                }
            }
            Some(_) => {}
        },
        Phase::Lobby | Phase::Paused | Phase::Done => {}
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::timer::TimingParams;

    const CONFIG: TickConfig = TickConfig { intermission_ms: 1000 };

    fn running_game(players: usize) -> Game {
        let mut game = Game::new(5);
        for i in 0..players {
            let id = BlockId::new(format!("p{i}"));
            game.add_player(id.clone());
            game.set_player_connected(&id, true).unwrap();
        }
        game.start_game(TimingParams::default(), 0).unwrap();
        game
    }

    fn succeed_all(game: &mut Game, now_ms: u64) {
        let round = game.round();
        let ids: Vec<_> = game
            .players()
            .iter()
            .filter(|p| p.is_in_game())
            .map(|p| p.id().clone())
            .collect();
        for id in ids {
            game.record_report(&id, round, true, now_ms).unwrap();
        }
    }

    #[test]
    fn test_nothing_before_deadline() {
        let mut game = running_game(3);
        let deadline = game.deadline_ms();

        assert_eq!(tick(&mut game, deadline - 1, &CONFIG), TickResult::default());
        assert_eq!(game.phase(), Phase::Running);
    }

    #[test]
    fn test_full_round_cycle() {
        let mut game = running_game(3);
        succeed_all(&mut game, 100);
        let deadline = game.deadline_ms();

        let ended = tick(&mut game, deadline, &CONFIG);
        assert_eq!(ended.round_ended, Some(vec![]));
        assert_eq!(game.phase(), Phase::WaitingNextRound);
        assert_eq!(game.window_ms(), 2350);

        // Intermission still running
        assert_eq!(tick(&mut game, deadline + 999, &CONFIG), TickResult::default());

        let started = tick(&mut game, deadline + 1000, &CONFIG);
        assert_eq!(started.round_started, Some(2));
        assert_eq!(game.phase(), Phase::Running);
        assert_eq!(game.deadline_ms(), deadline + 1000 + 500 + 2350);
    }

    #[test]
    fn test_pause_applies_at_boundary() {
        let mut game = running_game(2);
        succeed_all(&mut game, 100);
        game.pause_game();
        let deadline = game.deadline_ms();

        tick(&mut game, deadline, &CONFIG);
        assert_eq!(game.phase(), Phase::WaitingNextRound);

        let paused = tick(&mut game, deadline + 1000, &CONFIG);
        assert!(paused.paused);
        assert_eq!(game.phase(), Phase::Paused);
        assert_eq!(game.round(), 1);

        // Held until resumed
        assert_eq!(tick(&mut game, deadline + 60_000, &CONFIG), TickResult::default());

        game.resume_game();
        assert_eq!(game.phase(), Phase::WaitingNextRound);
        tick(&mut game, deadline + 61_000, &CONFIG);
        let resumed = tick(&mut game, deadline + 62_000, &CONFIG);
        assert_eq!(resumed.round_started, Some(2));
    }

    #[test]
    fn test_last_survivor_ends_game() {
        let mut game = running_game(3);
        let round = game.round();
        game.record_report(&BlockId::new("p0"), round, true, 10).unwrap();
        let deadline = game.deadline_ms();

        let ended = tick(&mut game, deadline, &CONFIG);
        assert_eq!(ended.round_ended, Some(vec![BlockId::new("p1"), BlockId::new("p2")]));

        let over = tick(&mut game, deadline + 1000, &CONFIG);
        assert!(over.game_over);
        assert_eq!(game.phase(), Phase::Done);
        assert_eq!(tick(&mut game, deadline + 5000, &CONFIG), TickResult::default());
    }

    #[test]
    fn test_huge_intermission_saturates() {
        let config = TickConfig { intermission_ms: u64::MAX };
        let mut game = running_game(2);
        succeed_all(&mut game, 100);
        let deadline = game.deadline_ms();

        let ended = tick(&mut game, deadline, &config);
        assert_eq!(ended.round_ended, Some(vec![]));
        assert_eq!(game.next_round_at_ms(), Some(u64::MAX));

        // Never reached, but never overflows either
        assert_eq!(tick(&mut game, deadline + 60_000, &config), TickResult::default());
        assert_eq!(game.phase(), Phase::WaitingNextRound);

        game.set_phase(Phase::Paused);
        game.resume_game();
        tick(&mut game, deadline + 70_000, &config);
        assert_eq!(game.next_round_at_ms(), Some(u64::MAX));
    }

    #[test]
    fn test_idle_phases() {
        let mut game = Game::new(1);
        assert_eq!(tick(&mut game, 1_000_000, &CONFIG), TickResult::default());
        assert_eq!(game.phase(), Phase::Lobby);
    }
}
