//! AI-only game driving.
//!
//! `play_out` advances a `GameState` in memory through the rules alone and is
//! what the arena and the benches use. `drive_ai` does the same against a
//! live server, so every move goes through the store.

use std::collections::HashMap;

use rand::Rng;

use crate::engine::bot_strategy::BotStrategy;
use crate::engine::config::EngineConfig;
use crate::engine::error::GameResult;
use crate::engine::store::GameStore;
use crate::games::coup::rules::{apply_command, legal_commands, validate_command};
use crate::games::coup::types::{Command, GameState};
use crate::games::coup::validator::validate_state;
use crate::games::coup::view::public_view;
use crate::server::GameServer;

/// How a playout ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Playout {
    pub winner: Option<String>,
    pub moves: usize,
    pub turns: u32,
    /// Decisions the rules rejected and that were replaced by a legal one.
    pub fallbacks: usize,
}

/// First seat with a strategy that owes a decision, and its legal commands.
pub fn next_mover(
    state: &GameState,
    strategies: &HashMap<String, Box<dyn BotStrategy>>,
    config: &EngineConfig,
) -> Option<(String, Vec<Command>)> {
    state
        .players
        .iter()
        .filter(|p| strategies.contains_key(&p.name))
        .find_map(|p| {
            let legal = legal_commands(state, &p.name, config);
            (!legal.is_empty()).then(|| (p.name.clone(), legal))
        })
}

/// Make one move. Returns whether the chosen command was a fallback, or
/// `None` if nobody could move.
pub fn step<R: Rng + ?Sized>(
    state: &mut GameState,
    strategies: &HashMap<String, Box<dyn BotStrategy>>,
    config: &EngineConfig,
    rng: &mut R,
) -> GameResult<Option<bool>> {
    let Some((name, legal)) = next_mover(state, strategies, config) else {
        return Ok(None);
    };
    let (Some(strategy), Some(me)) = (strategies.get(&name), state.player(&name)) else {
        return Ok(None);
    };
    let view = public_view(state, Some(&name));
    let chosen = strategy
        .choose_command(&view, me, &legal)
        .filter(|cmd| validate_command(state, &name, cmd, config).is_ok());
    let fallback = chosen.is_none();
    let command = match chosen {
        Some(cmd) => cmd,
        None => {
            tracing::debug!(player = %name, "strategy decision rejected, using first legal command");
            legal[0].clone()
        }
    };

    apply_command(state, &name, &command, config, rng)?;
    validate_state(state, config.max_players)?;
    Ok(Some(fallback))
}

/// Play until someone wins, nobody can move, or `max_moves` is reached.
pub fn play_out<R: Rng + ?Sized>(
    state: &mut GameState,
    strategies: &HashMap<String, Box<dyn BotStrategy>>,
    config: &EngineConfig,
    rng: &mut R,
    max_moves: usize,
) -> GameResult<Playout> {
    let mut moves = 0;
    let mut fallbacks = 0;
    while moves < max_moves && !state.is_game_over() {
        match step(state, strategies, config, rng)? {
            Some(fallback) => {
                moves += 1;
                fallbacks += usize::from(fallback);
            }
            None => break,
        }
    }
    Ok(Playout {
        winner: state.winner().map(|p| p.name.clone()),
        moves,
        turns: state.turn,
        fallbacks,
    })
}

/// Let the server's AI seats play `room_id` until they have nothing to do.
/// Returns the number of moves made.
pub async fn drive_ai<S: GameStore>(
    server: &GameServer<S>,
    room_id: &str,
    max_moves: usize,
) -> GameResult<usize> {
    let mut moves = 0;
    while moves < max_moves && server.check_ai_move(room_id).await? {
        moves += 1;
    }
    tracing::debug!(room_id, moves, "AI seats idle");
    Ok(moves)
}
