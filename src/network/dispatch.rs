//! Message Dispatch
//!
//! Applies inbound messages to the game on behalf of one connection: role
//! binding, device reports, and role-gated admin commands. Runs with the game
//! lock held, so each message is applied atomically.

use tracing::{debug, info};

use crate::game::client::{ClientRole, ConnectionId};
use crate::game::player::BlockId;
use crate::game::state::{Game, GameError, RoundOutcome};
use crate::game::timer::TimingParams;
use crate::network::protocol::{AdminAction, ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Register a freshly opened connection.
pub fn connect(game: &mut Game, conn: ConnectionId) {
    game.add_client(conn);
}

/// Forget a closed connection. A block whose last connection closed is
/// marked disconnected; its player record stays.
pub fn disconnect(game: &mut Game, conn: ConnectionId) {
    let Some(meta) = game.remove_client(conn) else {
        return;
    };
    if let ClientRole::Block(block) = meta.role {
        release_block(game, &block);
    }
}

/// Apply one message. Returns a reply for the sender when the message could
/// not be accepted at the protocol level; game-rule rejections are logged
/// and otherwise dropped.
pub fn handle_client_message(
    game: &mut Game,
    conn: ConnectionId,
    msg: ClientMessage,
    now_ms: u64,
) -> Option<ServerMessage> {
    let role = game.get_client(conn)?.role.clone();

    if let ClientRole::Block(block) = &role {
        game.touch_player(block, now_ms);
    }

    match msg {
        ClientMessage::WebHello { .. } => {
            bind(game, conn, ClientRole::Dashboard);
            game.broadcast_state_to(conn);
            debug!("Connection {} is a dashboard", conn);
            None
        }
        ClientMessage::BlockHello { block_id } => {
            bind_block(game, conn, block_id, now_ms);
            None
        }
        ClientMessage::Report { round, success } => {
            let ClientRole::Block(block) = role else {
                return Some(reject(ErrorCode::NotIdentified, "identify as a block first"));
            };
            if let Err(e) = game.record_report(&block, round, success, now_ms) {
                debug!("Report from {} ignored: {}", block, e);
            }
            None
        }
        ClientMessage::Admin(action) => {
            if role != ClientRole::Dashboard {
                return Some(reject(ErrorCode::NotAuthorized, "admin commands are for dashboards"));
            }
            if let Err(e) = apply_admin(game, action, now_ms) {
                debug!("Admin command from {} ignored: {}", conn, e);
            }
            None
        }
    }
}

fn apply_admin(game: &mut Game, action: AdminAction, now_ms: u64) -> Result<(), GameError> {
    match action {
        AdminAction::Start { round0_ms, decay_ms, min_ms } => {
            let params = TimingParams {
                initial_window_ms: round0_ms,
                decay_ms,
                min_window_ms: min_ms,
            };
            match game.start_game(params, now_ms)? {
                RoundOutcome::Started { round, command } => {
                    info!("Game started: round {} is {}", round, command.as_str())
                }
                RoundOutcome::GameOver { .. } => {
                    info!("Game started with {} player(s), nothing to play", game.alive_count())
                }
            }
        }
        AdminAction::Pause => {
            game.pause_game();
            info!("Pause requested");
        }
        AdminAction::Resume => {
            game.resume_game();
            info!("Resumed");
        }
        AdminAction::Reset => {
            game.reset_game();
            info!("Game reset to lobby");
        }
        AdminAction::Rename { block_id, name } => game.rename_player(&block_id, &name)?,
    }
    Ok(())
}

fn bind(game: &mut Game, conn: ConnectionId, role: ClientRole) {
    let previous = match game.get_client_mut(conn) {
        Some(meta) => std::mem::replace(&mut meta.role, role),
        None => return,
    };
    if let ClientRole::Block(old) = previous {
        release_block(game, &old);
    }
}

fn bind_block(game: &mut Game, conn: ConnectionId, block: BlockId, now_ms: u64) {
    game.add_player(block.clone());
    bind(game, conn, ClientRole::Block(block.clone()));
    game.touch_player(&block, now_ms);
    // The player was registered above, so this cannot miss
    let _ = game.set_player_connected(&block, true);
    info!("Connection {} bound to block {}", conn, block);
}

fn release_block(game: &mut Game, block: &BlockId) {
    if game.clients().is_bound(block) {
        return;
    }
    if game.set_player_connected(block, false).is_ok() {
        info!("Block {} disconnected", block);
    }
}

fn reject(code: ErrorCode, message: &str) -> ServerMessage {
    ServerMessage::Error(ServerError::new(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::broadcast::Broadcast;
    use crate::game::state::Phase;

    fn admin(action: AdminAction) -> ClientMessage {
        ClientMessage::Admin(action)
    }

    fn block_hello(id: &str) -> ClientMessage {
        ClientMessage::BlockHello { block_id: BlockId::new(id) }
    }

    fn web_hello() -> ClientMessage {
        ClientMessage::WebHello { client_type: None }
    }

    /// Dashboard on 1, blocks "a" and "b" on 2 and 3.
    fn lobby() -> Game {
        let mut game = Game::new(8);
        for conn in 1..=3 {
            connect(&mut game, conn);
        }
        handle_client_message(&mut game, 1, web_hello(), 0);
        handle_client_message(&mut game, 2, block_hello("a"), 0);
        handle_client_message(&mut game, 3, block_hello("b"), 0);
        game.take_outbound();
        game
    }

    fn start() -> ClientMessage {
        admin(AdminAction::Start { round0_ms: 2500, decay_ms: 150, min_ms: 800 })
    }

    #[test]
    fn test_web_hello_gets_immediate_state() {
        let mut game = Game::new(1);
        connect(&mut game, 5);

        assert!(handle_client_message(&mut game, 5, web_hello(), 0).is_none());

        let out = game.take_outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, 5);
        assert!(matches!(out[0].message, Broadcast::State(_)));
    }

    #[test]
    fn test_block_hello_registers_and_connects() {
        let game = lobby();

        let a = game.get_player(&BlockId::new("a")).unwrap();
        assert!(a.is_connected());
        assert_eq!(game.get_client(2).unwrap().block_id(), Some(&BlockId::new("a")));
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn test_admin_requires_dashboard() {
        let mut game = lobby();

        let reply = handle_client_message(&mut game, 2, start(), 0);

        assert!(matches!(
            reply,
            Some(ServerMessage::Error(ServerError { code: ErrorCode::NotAuthorized, .. }))
        ));
        assert_eq!(game.phase(), Phase::Lobby);
    }

    #[test]
    fn test_start_then_report() {
        let mut game = lobby();
        handle_client_message(&mut game, 1, start(), 1_000);
        assert_eq!(game.phase(), Phase::Running);

        let round = game.round();
        handle_client_message(&mut game, 2, ClientMessage::Report { round, success: true }, 1_600);

        let a = game.get_player(&BlockId::new("a")).unwrap();
        assert!(a.succeeded());
        assert_eq!(a.score(), 1);
        assert_eq!(a.last_seen_ms(), 1_600);
    }

    #[test]
    fn test_start_uses_requested_timing() {
        let mut game = lobby();
        let start = admin(AdminAction::Start { round0_ms: 4000, decay_ms: 500, min_ms: 1000 });

        handle_client_message(&mut game, 1, start, 0);

        assert_eq!(game.window_ms(), 4000);
        assert_eq!(
            game.timer().params(),
            TimingParams { initial_window_ms: 4000, decay_ms: 500, min_window_ms: 1000 }
        );
        assert_eq!(game.end_round().window_ms, 3500);
    }

    #[test]
    fn test_report_from_unbound_connection() {
        let mut game = lobby();
        connect(&mut game, 9);

        let reply = handle_client_message(&mut game, 9, ClientMessage::Report { round: 1, success: true }, 0);

        assert!(matches!(
            reply,
            Some(ServerMessage::Error(ServerError { code: ErrorCode::NotIdentified, .. }))
        ));
    }

    #[test]
    fn test_rejected_admin_is_silent() {
        let mut game = lobby();
        handle_client_message(&mut game, 1, start(), 0);
        game.take_outbound();

        let reply = handle_client_message(&mut game, 1, start(), 10);

        assert!(reply.is_none());
        assert_eq!(game.round(), 1);
        assert!(game.take_outbound().is_empty());
    }

    #[test]
    fn test_rename_pause_resume_reset() {
        let mut game = lobby();
        let rename = AdminAction::Rename { block_id: BlockId::new("a"), name: "Ada".into() };
        handle_client_message(&mut game, 1, admin(rename), 0);
        assert_eq!(game.get_player(&BlockId::new("a")).unwrap().name(), "Ada");

        handle_client_message(&mut game, 1, start(), 0);
        handle_client_message(&mut game, 1, admin(AdminAction::Pause), 0);
        assert!(game.is_pause_requested());
        handle_client_message(&mut game, 1, admin(AdminAction::Resume), 0);
        assert!(!game.is_pause_requested());

        handle_client_message(&mut game, 1, admin(AdminAction::Reset), 0);
        assert_eq!(game.phase(), Phase::Lobby);
        assert_eq!(game.round(), 0);
    }

    #[test]
    fn test_disconnect_clears_connected_flag() {
        let mut game = lobby();

        disconnect(&mut game, 2);

        let a = game.get_player(&BlockId::new("a")).unwrap();
        assert!(!a.is_connected());
        assert!(game.get_client(2).is_none());
    }

    #[test]
    fn test_second_connection_keeps_block_connected() {
        let mut game = lobby();
        connect(&mut game, 4);
        handle_client_message(&mut game, 4, block_hello("a"), 0);

        disconnect(&mut game, 2);
        assert!(game.get_player(&BlockId::new("a")).unwrap().is_connected());

        disconnect(&mut game, 4);
        assert!(!game.get_player(&BlockId::new("a")).unwrap().is_connected());
    }

    #[test]
    fn test_rebinding_releases_old_block() {
        let mut game = lobby();

        handle_client_message(&mut game, 2, block_hello("z"), 0);

        assert!(!game.get_player(&BlockId::new("a")).unwrap().is_connected());
        assert!(game.get_player(&BlockId::new("z")).unwrap().is_connected());
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let mut game = lobby();
        assert!(handle_client_message(&mut game, 42, web_hello(), 0).is_none());
        assert!(game.get_client(42).is_none());
    }
}
