//! Structural invariants checked on every snapshot before it is persisted.

use std::collections::HashSet;

use super::deck::count_of;
use super::types::*;
use crate::engine::error::InvariantViolation;

pub fn validate_state(state: &GameState, max_players: usize) -> Result<(), InvariantViolation> {
    let count = state.players.len();
    if count == 0 || count > max_players {
        return Err(InvariantViolation::PlayerCount {
            count,
            max: max_players,
        });
    }

    let mut seen = HashSet::new();
    for player in &state.players {
        if !seen.insert(player.name.to_ascii_lowercase()) {
            return Err(InvariantViolation::DuplicatePlayer {
                name: player.name.clone(),
            });
        }
    }

    if state.is_started {
        check_turn_player(state)?;
        check_hand_sizes(state)?;
    }
    check_card_counts(state)?;
    check_pending_shape(state)?;
    Ok(())
}

fn check_turn_player(state: &GameState) -> Result<(), InvariantViolation> {
    let alive = state
        .turn_player
        .as_deref()
        .and_then(|name| state.player(name))
        .map_or(false, |p| p.is_alive());
    if !alive {
        return Err(InvariantViolation::TurnPlayer {
            name: state.turn_player.clone(),
        });
    }
    Ok(())
}

fn check_hand_sizes(state: &GameState) -> Result<(), InvariantViolation> {
    for player in &state.players {
        let held = player.influences.len();
        let dead = player.dead_influences.len();
        let returns = state.pending_returns(&player.name);
        if held + dead != STARTING_INFLUENCES + returns {
            return Err(InvariantViolation::InfluenceTotal {
                name: player.name.clone(),
                held,
                dead,
                returns,
            });
        }
    }
    Ok(())
}

fn check_card_counts(state: &GameState) -> Result<(), InvariantViolation> {
    let expected = copies_per_influence(state.players.len());
    for influence in ALL_INFLUENCES {
        let found = count_of(&state.deck, influence)
            + state
                .players
                .iter()
                .map(|p| count_of(&p.influences, influence) + count_of(&p.dead_influences, influence))
                .sum::<usize>();
        if found != expected {
            return Err(InvariantViolation::CardCount {
                influence,
                found,
                expected,
            });
        }
    }
    Ok(())
}

fn check_pending_shape(state: &GameState) -> Result<(), InvariantViolation> {
    if state.pending_action.is_none() {
        if state.pending_action_challenge.is_some() {
            return Err(InvariantViolation::OrphanedPending {
                phase: "action challenge",
            });
        }
        if state.pending_block.is_some() {
            return Err(InvariantViolation::OrphanedPending { phase: "block" });
        }
    }
    if state.pending_block.is_none() && state.pending_block_challenge.is_some() {
        return Err(InvariantViolation::OrphanedPending {
            phase: "block challenge",
        });
    }

    if let Some(action) = &state.pending_action {
        if action.pending_players.is_empty()
            && state.pending_action_challenge.is_none()
            && state.pending_block.is_none()
        {
            return Err(InvariantViolation::StalledPending { phase: "action" });
        }
    }
    if let Some(block) = &state.pending_block {
        if block.pending_players.is_empty() && state.pending_block_challenge.is_none() {
            return Err(InvariantViolation::StalledPending { phase: "block" });
        }
    }

    for name in state.pending_influence_loss.keys() {
        if state.player(name).is_none() {
            return Err(InvariantViolation::UnknownLossPlayer { name: name.clone() });
        }
    }
    Ok(())
}
