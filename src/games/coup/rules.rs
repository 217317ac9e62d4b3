//! Coup rules: command validation and state transitions.
//!
//! `validate_command` checks a command against a snapshot without touching
//! it; `apply_command` re-validates against the state it is handed and then
//! mutates it. Both are pure with respect to I/O, the server wraps
//! `apply_command` in a mutation against the store.

use rand::Rng;
use serde_json::json;

use super::deck;
use super::state::now_millis;
use super::types::*;
use crate::engine::config::EngineConfig;
use crate::engine::error::{GameError, GameResult, InvariantViolation, Rejection, TargetProblem};

const MAX_NAME_LEN: usize = 24;
const MAX_CHAT_LEN: usize = 500;

/// Check whether `player` may issue `command` against `state`.
pub fn validate_command(
    state: &GameState,
    player: &str,
    command: &Command,
    config: &EngineConfig,
) -> GameResult<()> {
    match command {
        Command::JoinGame => validate_new_seat(state, player, config),
        Command::AddAiPlayer { name, .. } => {
            state.require_player(player)?;
            validate_new_seat(state, name, config)
        }
        Command::RemovePlayer { target } => {
            state.require_player(player)?;
            state.require_player(target)?;
            if state.is_started {
                return Err(Rejection::GameAlreadyStarted.into());
            }
            if state.players.len() <= 1 {
                return Err(Rejection::LastPlayer.into());
            }
            Ok(())
        }
        Command::StartGame => {
            state.require_player(player)?;
            if state.is_started {
                return Err(Rejection::GameAlreadyStarted.into());
            }
            if state.players.len() < config.min_players.max(2) {
                return Err(Rejection::NotEnoughPlayers.into());
            }
            Ok(())
        }
        Command::ChooseAction { action, target } => {
            validate_choose_action(state, player, *action, target.as_deref())
        }
        Command::ActionResponse(response) => validate_action_response(state, player, *response),
        Command::ActionChallengeResponse(influence) => {
            require_in_game(state, player)?;
            if state.pending_action.is_none() || state.pending_action_challenge.is_none() {
                return Err(Rejection::NoPendingChallenge.into());
            }
            if !state.is_turn_player(player) {
                return Err(Rejection::NotYourTurn.into());
            }
            require_holds(state, player, *influence)
        }
        Command::BlockResponse(_) => {
            require_in_game(state, player)?;
            let block = state
                .pending_block
                .as_ref()
                .ok_or(Rejection::NoPendingBlock)?;
            if state.pending_block_challenge.is_some() || !block.pending_players.contains(player) {
                return Err(Rejection::NotAwaitingResponse.into());
            }
            Ok(())
        }
        Command::BlockChallengeResponse(influence) => {
            require_in_game(state, player)?;
            let block = state
                .pending_block
                .as_ref()
                .ok_or(Rejection::NoPendingBlock)?;
            if state.pending_block_challenge.is_none() {
                return Err(Rejection::NoPendingChallenge.into());
            }
            if block.source_player != player {
                return Err(Rejection::NotAwaitingResponse.into());
            }
            require_holds(state, player, *influence)
        }
        Command::LoseInfluences(influences) => {
            require_in_game(state, player)?;
            let owed = state.pending_losses(player);
            if owed == 0 || influences.is_empty() {
                return Err(Rejection::NotAwaitingResponse.into());
            }
            if influences.len() > owed {
                return Err(Rejection::TooManyInfluences.into());
            }
            let mut hand = state.require_player(player)?.influences.clone();
            for &influence in influences {
                if !deck::take_card(&mut hand, influence) {
                    return Err(GameError::MissingInfluence {
                        player: player.to_string(),
                        influence,
                    });
                }
            }
            Ok(())
        }
        Command::RequestReset => {
            require_in_game(state, player)?;
            if state.reset_game_request.is_some() {
                return Err(Rejection::ResetAlreadyRequested.into());
            }
            Ok(())
        }
        Command::CancelReset => {
            state.require_player(player)?;
            match &state.reset_game_request {
                Some(req) if req.player == player => Ok(()),
                _ => Err(Rejection::NoResetRequest.into()),
            }
        }
        Command::ResetGame => {
            let requester = state.require_player(player)?;
            if !state.is_started {
                return Err(Rejection::GameNotStarted.into());
            }
            if state.is_game_over() || is_sole_human(state, requester) {
                return Ok(());
            }
            if state.has_pending_phase() {
                return Err(Rejection::GameInProgress.into());
            }
            match &state.reset_game_request {
                Some(req) if req.player != player => Ok(()),
                _ => Err(Rejection::NoResetRequest.into()),
            }
        }
        Command::Forfeit { .. } => {
            let requester = require_in_game(state, player)?;
            if state.is_game_over() {
                return Err(Rejection::GameOver.into());
            }
            if !requester.is_alive() {
                return Err(Rejection::PlayerDead.into());
            }
            if state.has_pending_phase() && !is_sole_human(state, requester) {
                return Err(Rejection::GameInProgress.into());
            }
            Ok(())
        }
        Command::UpdateSettings(_) => {
            state.require_player(player)?;
            if state.is_started {
                return Err(Rejection::GameAlreadyStarted.into());
            }
            Ok(())
        }
        Command::SendChatMessage { text, .. } => {
            state.require_player(player)?;
            if text.trim().is_empty() || text.len() > MAX_CHAT_LEN {
                return Err(Rejection::EmptyMessage.into());
            }
            Ok(())
        }
    }
}

/// Validate, then apply, `command` on `state`.
pub fn apply_command<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    command: &Command,
    config: &EngineConfig,
    rng: &mut R,
) -> GameResult<()> {
    validate_command(state, player, command, config)?;

    match command {
        Command::JoinGame => {
            let color = state.next_color();
            state.players.push(Player::new(player, color));
            state.redeal(rng);
            state.log(EventType::PlayerJoined, Some(player), json!({ "ai": false }));
            Ok(())
        }
        Command::AddAiPlayer {
            name,
            personality,
            personality_hidden,
        } => {
            let mut ai = Player::new(name.as_str(), state.next_color());
            ai.ai = true;
            ai.personality = Some(*personality);
            ai.personality_hidden = *personality_hidden;
            state.players.push(ai);
            state.redeal(rng);
            state.log(EventType::PlayerJoined, Some(name), json!({ "ai": true, "added_by": player }));
            Ok(())
        }
        Command::RemovePlayer { target } => {
            state.players.retain(|p| &p.name != target);
            if state.reset_game_request.as_ref().map_or(false, |r| &r.player == target) {
                state.reset_game_request = None;
            }
            state.redeal(rng);
            state.log(EventType::PlayerRemoved, Some(target), json!({ "removed_by": player }));
            Ok(())
        }
        Command::StartGame => {
            state.redeal(rng);
            let first = state.players[rng.gen_range(0..state.players.len())].name.clone();
            state.turn_player = Some(first.clone());
            state.turn = 1;
            state.is_started = true;
            state.event_logs.clear();
            state.log(EventType::GameStarted, Some(&first), json!({}));
            Ok(())
        }
        Command::ChooseAction { action, target } => {
            choose_action(state, player, *action, target.as_deref(), rng)
        }
        Command::ActionResponse(response) => action_response(state, player, *response, rng),
        Command::ActionChallengeResponse(influence) => {
            action_challenge_response(state, player, *influence, rng)
        }
        Command::BlockResponse(response) => block_response(state, player, *response),
        Command::BlockChallengeResponse(influence) => {
            block_challenge_response(state, player, *influence, rng)
        }
        Command::LoseInfluences(influences) => lose_influences(state, player, influences, rng),
        Command::RequestReset => {
            state.reset_game_request = Some(ResetGameRequest {
                player: player.to_string(),
            });
            state.log(EventType::ResetRequested, Some(player), json!({}));
            Ok(())
        }
        Command::CancelReset => {
            state.reset_game_request = None;
            state.log(EventType::ResetCancelled, Some(player), json!({}));
            Ok(())
        }
        Command::ResetGame => {
            reset_game(state, rng);
            state.log(EventType::GameReset, Some(player), json!({}));
            Ok(())
        }
        Command::Forfeit { replace_with_ai } => forfeit(state, player, *replace_with_ai, rng),
        Command::UpdateSettings(settings) => {
            let mut settings = settings.clone();
            settings.event_log_retention_turns = settings.event_log_retention_turns.max(1);
            state.settings = settings;
            state.log(EventType::SettingsUpdated, Some(player), json!({}));
            Ok(())
        }
        Command::SendChatMessage { id, text } => {
            state.chat_messages.push(ChatMessage {
                id: id.clone(),
                from: player.to_string(),
                text: text.trim().to_string(),
                timestamp: now_millis(),
                deleted: false,
                emojis: Default::default(),
            });
            Ok(())
        }
    }
}

/// Every in-game command `player` could legally issue right now.
///
/// Administrative commands are not listed.
pub fn legal_commands(state: &GameState, player: &str, config: &EngineConfig) -> Vec<Command> {
    let me = match state.player(player) {
        Some(p) => p,
        None => return Vec::new(),
    };
    let mut candidates = Vec::new();

    for action in ALL_ACTIONS {
        if action.rule().requires_target {
            for other in state.living_players().filter(|p| p.name != player) {
                candidates.push(Command::ChooseAction {
                    action,
                    target: Some(other.name.clone()),
                });
            }
        } else {
            candidates.push(Command::ChooseAction { action, target: None });
        }
    }

    candidates.push(Command::ActionResponse(ActionResponse::Pass));
    candidates.push(Command::ActionResponse(ActionResponse::Challenge));
    for influence in ALL_INFLUENCES {
        candidates.push(Command::ActionResponse(ActionResponse::Block(influence)));
    }
    candidates.push(Command::BlockResponse(BlockResponse::Pass));
    candidates.push(Command::BlockResponse(BlockResponse::Challenge));

    let mut held = me.influences.clone();
    held.sort();
    held.dedup();
    for &influence in &held {
        candidates.push(Command::ActionChallengeResponse(influence));
        candidates.push(Command::BlockChallengeResponse(influence));
    }

    let owed = state.pending_losses(player).min(me.influences.len());
    for size in 1..=owed {
        for combo in combinations(&me.influences, size) {
            candidates.push(Command::LoseInfluences(combo));
        }
    }

    let mut legal: Vec<Command> = candidates
        .into_iter()
        .filter(|cmd| validate_command(state, player, cmd, config).is_ok())
        .collect();
    legal.dedup();
    legal
}

/// The move a speed round makes for `player` when their timer runs out.
///
/// Responses pass, challenged players reveal their first card, losses take
/// the first cards held, and an idle turn takes Income (or a forced Coup on
/// the next living player).
pub fn default_move(state: &GameState, player: &str) -> Option<Command> {
    let me = state.player(player)?;
    if !state.is_started {
        return None;
    }
    let owed = state.pending_losses(player).min(me.influences.len());
    if owed > 0 {
        return Some(Command::LoseInfluences(me.influences[..owed].to_vec()));
    }
    let first = *me.influences.first()?;

    match state.phase() {
        TurnPhase::Lobby | TurnPhase::GameOver | TurnPhase::InfluenceLossPending => None,
        TurnPhase::BlockChallengePending => {
            let block = state.pending_block.as_ref()?;
            (block.source_player == player).then_some(Command::BlockChallengeResponse(first))
        }
        TurnPhase::ActionChallengePending => state
            .is_turn_player(player)
            .then_some(Command::ActionChallengeResponse(first)),
        TurnPhase::BlockPending => state
            .pending_block
            .as_ref()?
            .pending_players
            .contains(player)
            .then_some(Command::BlockResponse(BlockResponse::Pass)),
        TurnPhase::ActionPending => state
            .pending_action
            .as_ref()?
            .pending_players
            .contains(player)
            .then_some(Command::ActionResponse(ActionResponse::Pass)),
        TurnPhase::Idle if !state.is_turn_player(player) => None,
        TurnPhase::Idle if me.coins >= FORCED_COUP_COINS => {
            let idx = state.player_index(player)?;
            let count = state.players.len();
            let victim = (1..count)
                .map(|offset| &state.players[(idx + offset) % count])
                .find(|p| p.is_alive())?;
            Some(Command::ChooseAction {
                action: ActionKind::Coup,
                target: Some(victim.name.clone()),
            })
        }
        TurnPhase::Idle => Some(Command::ChooseAction {
            action: ActionKind::Income,
            target: None,
        }),
    }
}

/// Distinct sorted multisets of `size` cards drawn from `hand`.
fn combinations(hand: &[Influence], size: usize) -> Vec<Vec<Influence>> {
    let mut sorted = hand.to_vec();
    sorted.sort();
    let mut out: Vec<Vec<Influence>> = Vec::new();
    let n = sorted.len();
    for mask in 0u32..(1 << n) {
        if mask.count_ones() as usize != size {
            continue;
        }
        let combo: Vec<Influence> = (0..n)
            .filter(|i| mask & (1 << i) != 0)
            .map(|i| sorted[i])
            .collect();
        if !out.contains(&combo) {
            out.push(combo);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Names are non-empty, untrimmed-whitespace-free and short.
pub fn validate_name(name: &str) -> GameResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name || name.chars().count() > MAX_NAME_LEN {
        return Err(Rejection::InvalidName.into());
    }
    Ok(())
}

fn validate_new_seat(state: &GameState, name: &str, config: &EngineConfig) -> GameResult<()> {
    if state.is_started {
        return Err(Rejection::GameAlreadyStarted.into());
    }
    validate_name(name)?;
    if state.name_taken(name) {
        return Err(Rejection::NameTaken.into());
    }
    if state.players.len() >= config.max_players {
        return Err(Rejection::RoomFull.into());
    }
    Ok(())
}

fn require_in_game<'a>(state: &'a GameState, player: &str) -> GameResult<&'a Player> {
    let p = state.require_player(player)?;
    if !state.is_started {
        return Err(Rejection::GameNotStarted.into());
    }
    Ok(p)
}

fn require_holds(state: &GameState, player: &str, influence: Influence) -> GameResult<()> {
    if !state.require_player(player)?.holds(influence) {
        return Err(GameError::MissingInfluence {
            player: player.to_string(),
            influence,
        });
    }
    Ok(())
}

fn is_sole_human(state: &GameState, requester: &Player) -> bool {
    !requester.ai && state.players.iter().filter(|p| !p.ai).count() == 1
}

fn validate_choose_action(
    state: &GameState,
    player: &str,
    action: ActionKind,
    target: Option<&str>,
) -> GameResult<()> {
    let actor = require_in_game(state, player)?;
    if state.is_game_over() {
        return Err(Rejection::GameOver.into());
    }
    if !state.is_turn_player(player) {
        return Err(Rejection::NotYourTurn.into());
    }
    if !actor.is_alive() {
        return Err(Rejection::PlayerDead.into());
    }
    if state.pending_action.is_some() {
        return Err(Rejection::ActionPending.into());
    }
    if state.any_pending_loss() {
        return Err(Rejection::InfluenceLossPending.into());
    }

    let rule = action.rule();
    match (rule.requires_target, target) {
        (true, None) => return Err(TargetProblem::Missing.into()),
        (false, Some(_)) => return Err(TargetProblem::Forbidden.into()),
        (true, Some(t)) => {
            if t == player {
                return Err(TargetProblem::SelfTarget.into());
            }
            let target_player = state.player(t).ok_or(TargetProblem::Unknown)?;
            if !target_player.is_alive() {
                return Err(TargetProblem::Eliminated.into());
            }
        }
        (false, None) => {}
    }

    if actor.coins < rule.coins_required {
        return Err(GameError::InsufficientCoins {
            action,
            required: rule.coins_required,
            available: actor.coins,
        });
    }
    let revive_allowed = action == ActionKind::Revive && state.settings.allow_revive;
    if actor.coins >= FORCED_COUP_COINS && action != ActionKind::Coup && !revive_allowed {
        return Err(GameError::MustCoup { coins: actor.coins });
    }
    if action == ActionKind::Revive {
        if !state.settings.allow_revive {
            return Err(Rejection::ReviveDisabled.into());
        }
        if actor.dead_influences.is_empty() {
            return Err(Rejection::NothingToRevive.into());
        }
    }
    Ok(())
}

fn validate_action_response(
    state: &GameState,
    player: &str,
    response: ActionResponse,
) -> GameResult<()> {
    require_in_game(state, player)?;
    let pending = state
        .pending_action
        .as_ref()
        .ok_or(Rejection::NoPendingAction)?;
    if state.pending_action_challenge.is_some()
        || state.pending_block.is_some()
        || !pending.pending_players.contains(player)
    {
        return Err(Rejection::NotAwaitingResponse.into());
    }

    let rule = pending.action.rule();
    match response {
        ActionResponse::Pass => Ok(()),
        ActionResponse::Challenge => {
            if !rule.challengeable() {
                return Err(Rejection::NotChallengeable.into());
            }
            if pending.claim_confirmed {
                return Err(Rejection::ClaimAlreadyConfirmed.into());
            }
            Ok(())
        }
        ActionResponse::Block(influence) => {
            if !rule.blockable() {
                return Err(Rejection::NotBlockable.into());
            }
            if !rule.blocked_by.contains(&influence) {
                return Err(Rejection::InvalidBlockingInfluence.into());
            }
            if let Some(target) = &pending.target_player {
                if target != player {
                    return Err(Rejection::NotTheTarget.into());
                }
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

fn choose_action<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    action: ActionKind,
    target: Option<&str>,
    rng: &mut R,
) -> GameResult<()> {
    let rule = action.rule();
    state.log(
        EventType::ChoseAction,
        Some(player),
        json!({ "action": action, "target": target }),
    );

    if let Some(influence) = rule.influence {
        state.require_player_mut(player)?.claimed_influences.insert(influence);
    }
    if let Some(t) = target {
        add_grudge(state, t, player);
    }

    match action {
        ActionKind::Income => {
            state.require_player_mut(player)?.coins += 1;
            state.log(EventType::ResolvedAction, Some(player), json!({ "action": action }));
            advance_turn(state)
        }
        ActionKind::Coup => {
            let target = target.ok_or(TargetProblem::Missing)?;
            state.require_player_mut(player)?.coins -= rule.coins_required;
            queue_loss(state, target, false);
            state.log(
                EventType::ResolvedAction,
                Some(player),
                json!({ "action": action, "target": target }),
            );
            Ok(())
        }
        ActionKind::Revive => {
            let actor = state.require_player_mut(player)?;
            actor.coins -= rule.coins_required;
            let card = actor.dead_influences.pop().ok_or(Rejection::NothingToRevive)?;
            deck::return_to_deck(&mut state.deck, card, rng);
            let drawn = deck::draw(&mut state.deck).ok_or(InvariantViolation::CardCount {
                influence: card,
                found: 0,
                expected: 1,
            })?;
            state.require_player_mut(player)?.influences.push(drawn);
            state.log(EventType::ResolvedAction, Some(player), json!({ "action": action }));
            advance_turn(state)
        }
        _ => {
            state.pending_action = Some(PendingAction {
                action,
                target_player: target.map(str::to_string),
                pending_players: state.living_names_except(player),
                claim_confirmed: false,
            });
            Ok(())
        }
    }
}

fn action_response<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    response: ActionResponse,
    rng: &mut R,
) -> GameResult<()> {
    let pending = state
        .pending_action
        .clone()
        .ok_or(Rejection::NoPendingAction)?;
    let actor = state.turn_player.clone().unwrap_or_default();
    let rule = pending.action.rule();

    match response {
        ActionResponse::Pass => {
            let could_block = rule.blockable()
                && pending.target_player.as_deref().map_or(true, |t| t == player);
            if could_block {
                let responder = state.require_player_mut(player)?;
                responder.unclaimed_influences.extend(rule.blocked_by.iter().copied());
            }
            if let Some(pa) = state.pending_action.as_mut() {
                pa.pending_players.remove(player);
            }
            state.log(EventType::PassedAction, Some(player), json!({ "action": pending.action }));
            let everyone_passed = state
                .pending_action
                .as_ref()
                .map_or(false, |pa| pa.pending_players.is_empty());
            if everyone_passed {
                resolve_action(state, rng)?;
            }
            Ok(())
        }
        ActionResponse::Challenge => {
            state.pending_action_challenge = Some(PendingChallenge {
                source_player: player.to_string(),
            });
            add_grudge(state, &actor, player);
            state.log(
                EventType::ChallengedAction,
                Some(player),
                json!({ "action": pending.action, "actor": actor }),
            );
            Ok(())
        }
        ActionResponse::Block(influence) => {
            if let Some(pa) = state.pending_action.as_mut() {
                pa.pending_players.clear();
            }
            state.require_player_mut(player)?.claimed_influences.insert(influence);
            state.pending_block = Some(PendingBlock {
                source_player: player.to_string(),
                claimed_influence: influence,
                pending_players: state.living_names_except(player),
            });
            state.log(
                EventType::BlockedAction,
                Some(player),
                json!({ "action": pending.action, "influence": influence }),
            );
            Ok(())
        }
    }
}

fn action_challenge_response<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    influence: Influence,
    rng: &mut R,
) -> GameResult<()> {
    let challenger = state
        .pending_action_challenge
        .take()
        .ok_or(Rejection::NoPendingChallenge)?
        .source_player;
    let mut pending = state
        .pending_action
        .clone()
        .ok_or(Rejection::NoPendingAction)?;
    let rule = pending.action.rule();

    if rule.influence != Some(influence) {
        state.log(
            EventType::ChallengeSucceeded,
            Some(&challenger),
            json!({ "against": player, "influence": influence }),
        );
        state.clear_pending();
        destroy_influence(state, player, influence)?;
        return advance_turn(state);
    }

    state.log(
        EventType::ChallengeFailed,
        Some(&challenger),
        json!({ "against": player, "influence": influence }),
    );
    reveal_and_replace(state, player, influence, rng)?;
    queue_loss(state, &challenger, false);
    pending.claim_confirmed = true;

    let target_can_respond = pending
        .target_player
        .as_deref()
        .map_or(false, |t| can_still_respond(state, t));

    if rule.blockable() && target_can_respond {
        let target = pending.target_player.clone().unwrap_or_default();
        pending.pending_players = [target].into_iter().collect();
        state.pending_action = Some(pending);
        Ok(())
    } else if rule.blockable() && pending.target_player.is_none() {
        pending.pending_players = state.living_names_except(player);
        if pending.pending_players.is_empty() {
            state.pending_action = Some(pending);
            return resolve_action(state, rng);
        }
        state.pending_action = Some(pending);
        Ok(())
    } else {
        state.pending_action = Some(pending);
        resolve_action(state, rng)
    }
}

fn block_response(state: &mut GameState, player: &str, response: BlockResponse) -> GameResult<()> {
    let block = state.pending_block.clone().ok_or(Rejection::NoPendingBlock)?;
    match response {
        BlockResponse::Pass => {
            if let Some(pb) = state.pending_block.as_mut() {
                pb.pending_players.remove(player);
            }
            state.log(
                EventType::PassedBlock,
                Some(player),
                json!({ "blocker": block.source_player }),
            );
            let everyone_passed = state
                .pending_block
                .as_ref()
                .map_or(false, |pb| pb.pending_players.is_empty());
            if everyone_passed {
                block_succeeds(state)?;
            }
            Ok(())
        }
        BlockResponse::Challenge => {
            state.pending_block_challenge = Some(PendingChallenge {
                source_player: player.to_string(),
            });
            add_grudge(state, &block.source_player, player);
            state.log(
                EventType::ChallengedBlock,
                Some(player),
                json!({ "blocker": block.source_player, "influence": block.claimed_influence }),
            );
            Ok(())
        }
    }
}

fn block_challenge_response<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    influence: Influence,
    rng: &mut R,
) -> GameResult<()> {
    let challenger = state
        .pending_block_challenge
        .take()
        .ok_or(Rejection::NoPendingChallenge)?
        .source_player;
    let block = state.pending_block.take().ok_or(Rejection::NoPendingBlock)?;

    if influence == block.claimed_influence {
        state.log(
            EventType::ChallengeFailed,
            Some(&challenger),
            json!({ "against": player, "influence": influence }),
        );
        reveal_and_replace(state, player, influence, rng)?;
        queue_loss(state, &challenger, false);
        let cancelled = state.pending_action.take();
        state.clear_pending();
        if let Some(pa) = cancelled {
            charge_assassination(state, &pa)?;
        }
        state.log(EventType::BlockSucceeded, Some(player), json!({ "influence": influence }));
        return maybe_advance(state);
    }

    state.log(
        EventType::ChallengeSucceeded,
        Some(&challenger),
        json!({ "against": player, "influence": influence }),
    );
    destroy_influence(state, player, influence)?;
    resolve_action(state, rng)
}

fn lose_influences<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    influences: &[Influence],
    rng: &mut R,
) -> GameResult<()> {
    for &influence in influences {
        let entry = match state.pending_influence_loss.get_mut(player) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => break,
        };
        if entry.put_back_in_deck {
            let holder = state.require_player_mut(player)?;
            deck::take_card(&mut holder.influences, influence);
            holder.claimed_influences.clear();
            holder.unclaimed_influences.clear();
            deck::return_to_deck(&mut state.deck, influence, rng);
            state.log(EventType::ReturnedInfluence, Some(player), json!({}));
        } else if destroy_influence(state, player, influence)? {
            break;
        }
    }
    state.pending_influence_loss.retain(|_, queue| !queue.is_empty());
    settle(state, rng)
}

fn reset_game<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) {
    state.redeal(rng);
    state.clear_pending();
    state.pending_influence_loss.clear();
    state.reset_game_request = None;
    state.turn_advanced_early = false;
    state.is_started = false;
    state.turn_player = None;
    state.turn = 1;
    state.event_logs.clear();
}

fn forfeit<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    replace_with_ai: bool,
    rng: &mut R,
) -> GameResult<()> {
    if replace_with_ai {
        let p = state.require_player_mut(player)?;
        p.ai = true;
        if p.personality.is_none() {
            p.personality = Some(AiPersonality::default());
        }
        state.log(EventType::PlayerForfeited, Some(player), json!({ "replaced_with_ai": true }));
        return Ok(());
    }

    let mid_turn = state.has_pending_phase();
    let was_turn_player = state.is_turn_player(player);
    if was_turn_player {
        state.clear_pending();
    } else {
        abandon_phases(state, player);
    }

    // Cards drawn by an Exchange go back before the rest are turned over.
    for _ in 0..state.pending_returns(player) {
        let card = match state.require_player_mut(player)?.influences.pop() {
            Some(card) => card,
            None => break,
        };
        deck::return_to_deck(&mut state.deck, card, rng);
        state.log(EventType::ReturnedInfluence, Some(player), json!({}));
    }
    state.pending_influence_loss.remove(player);

    let held: Vec<Influence> = state.require_player(player)?.influences.clone();
    for influence in held {
        destroy_influence(state, player, influence)?;
    }
    state.log(EventType::PlayerForfeited, Some(player), json!({ "replaced_with_ai": false }));

    if was_turn_player {
        // The turn must sit with a living player, but losses other players
        // still owe from this turn stay owed.
        let owed_elsewhere = state.any_pending_loss();
        advance_turn(state)?;
        state.turn_advanced_early = owed_elsewhere;
        return Ok(());
    }
    if mid_turn {
        settle(state, rng)
    } else {
        Ok(())
    }
}

/// Withdraw whatever a departing non-turn player still owes the resolution.
///
/// A challenge they raised is dropped. A block they made fails, so the action
/// it stood against resolves once the caller settles.
fn abandon_phases(state: &mut GameState, player: &str) {
    let raised = |challenge: &Option<PendingChallenge>| {
        challenge.as_ref().map_or(false, |c| c.source_player == player)
    };
    if raised(&state.pending_action_challenge) {
        state.pending_action_challenge = None;
    }
    if raised(&state.pending_block_challenge) {
        state.pending_block_challenge = None;
    }
    if state.pending_block.as_ref().map_or(false, |b| b.source_player == player) {
        state.pending_block = None;
        state.pending_block_challenge = None;
    }
}

// ---------------------------------------------------------------------------
// Resolution primitives
// ---------------------------------------------------------------------------

/// Apply the pending action's effect and close it.
fn resolve_action<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) -> GameResult<()> {
    let pending = match state.pending_action.take() {
        Some(pa) => pa,
        None => return Ok(()),
    };
    state.clear_pending();
    let actor = state.turn_player.clone().unwrap_or_default();

    match pending.action {
        ActionKind::Income => state.require_player_mut(&actor)?.coins += 1,
        ActionKind::ForeignAid => state.require_player_mut(&actor)?.coins += 2,
        ActionKind::Tax => state.require_player_mut(&actor)?.coins += 3,
        ActionKind::Steal => {
            if let Some(target) = pending.target_player.as_deref() {
                let victim = state.require_player_mut(target)?;
                let stolen = victim.coins.min(STEAL_AMOUNT);
                victim.coins -= stolen;
                state.require_player_mut(&actor)?.coins += stolen;
            }
        }
        ActionKind::Exchange => {
            for _ in 0..EXCHANGE_DRAW {
                let card = deck::draw(&mut state.deck).ok_or(InvariantViolation::CardCount {
                    influence: Influence::Ambassador,
                    found: 0,
                    expected: EXCHANGE_DRAW,
                })?;
                state.require_player_mut(&actor)?.influences.push(card);
            }
            for _ in 0..EXCHANGE_DRAW {
                queue_loss(state, &actor, true);
            }
        }
        ActionKind::Assassinate => {
            charge_assassination(state, &pending)?;
            if let Some(target) = pending.target_player.as_deref() {
                if can_still_respond(state, target) {
                    queue_loss(state, target, false);
                }
            }
        }
        ActionKind::Coup | ActionKind::Revive => {}
    }

    state.log(
        EventType::ResolvedAction,
        Some(&actor),
        json!({ "action": pending.action, "target": pending.target_player }),
    );
    maybe_advance(state)
}

/// Block stood unchallenged: the action is cancelled.
fn block_succeeds(state: &mut GameState) -> GameResult<()> {
    let block = state.pending_block.take();
    let cancelled = state.pending_action.take();
    state.clear_pending();
    if let Some(pa) = &cancelled {
        charge_assassination(state, pa)?;
    }
    if let Some(block) = block {
        state.log(
            EventType::BlockSucceeded,
            Some(&block.source_player),
            json!({ "influence": block.claimed_influence }),
        );
    }
    maybe_advance(state)
}

/// A blocked or resolved assassination still costs the assassin.
fn charge_assassination(state: &mut GameState, pending: &PendingAction) -> GameResult<()> {
    if pending.action != ActionKind::Assassinate {
        return Ok(());
    }
    let actor = state.turn_player.clone().unwrap_or_default();
    let assassin = state.require_player_mut(&actor)?;
    assassin.coins = assassin
        .coins
        .saturating_sub(ActionKind::Assassinate.rule().coins_required);
    Ok(())
}

/// Close out stalled pending phases, then advance the turn if nothing is owed.
fn settle<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) -> GameResult<()> {
    if state.pending_action.is_some() {
        let action_stalled = state.pending_action_challenge.is_none()
            && state.pending_block.is_none()
            && state
                .pending_action
                .as_ref()
                .map_or(false, |pa| pa.pending_players.is_empty());
        let block_stalled = state.pending_block_challenge.is_none()
            && state
                .pending_block
                .as_ref()
                .map_or(false, |pb| pb.pending_players.is_empty());
        if action_stalled {
            return resolve_action(state, rng);
        }
        if block_stalled {
            return block_succeeds(state);
        }
        return Ok(());
    }
    maybe_advance(state)
}

fn maybe_advance(state: &mut GameState) -> GameResult<()> {
    if state.is_started && state.pending_action.is_none() && !state.any_pending_loss() {
        let turn_player_alive = state
            .turn_player
            .as_deref()
            .and_then(|name| state.player(name))
            .map_or(false, Player::is_alive);
        if state.turn_advanced_early && turn_player_alive {
            state.turn_advanced_early = false;
        } else {
            advance_turn(state)?;
        }
    }
    Ok(())
}

/// Hand the turn to the next living player in seat order.
pub fn advance_turn(state: &mut GameState) -> GameResult<()> {
    let count = state.players.len();
    let current = state
        .turn_player
        .as_deref()
        .and_then(|name| state.player_index(name))
        .unwrap_or(0);
    for offset in 1..=count {
        let candidate = &state.players[(current + offset) % count];
        if candidate.is_alive() {
            state.turn_player = Some(candidate.name.clone());
            state.turn += 1;
            state.turn_advanced_early = false;
            state.prune_events();
            let next = state.turn_player.clone();
            state.log(EventType::TurnAdvanced, next.as_deref(), json!({}));
            return Ok(());
        }
    }
    Err(InvariantViolation::NoLivingPlayer.into())
}

fn queue_loss(state: &mut GameState, player: &str, put_back_in_deck: bool) {
    if !state.player(player).map_or(false, Player::is_alive) {
        return;
    }
    state
        .pending_influence_loss
        .entry(player.to_string())
        .or_default()
        .push(PendingInfluenceLoss { put_back_in_deck });
}

/// A player may still answer if some held influence is not already owed.
fn can_still_respond(state: &GameState, player: &str) -> bool {
    state
        .player(player)
        .map_or(false, |p| p.influences.len() > state.pending_real_losses(player))
}

/// Move a held influence to the dead pile. Returns true if the player died.
fn destroy_influence(state: &mut GameState, player: &str, influence: Influence) -> GameResult<bool> {
    let holder = state.require_player_mut(player)?;
    if !deck::take_card(&mut holder.influences, influence) {
        return Err(GameError::MissingInfluence {
            player: player.to_string(),
            influence,
        });
    }
    holder.dead_influences.push(influence);
    holder.claimed_influences.remove(&influence);
    let eliminated = !holder.is_alive();
    state.log(EventType::LostInfluence, Some(player), json!({ "influence": influence }));

    if eliminated {
        state.pending_influence_loss.remove(player);
        if let Some(pa) = state.pending_action.as_mut() {
            pa.pending_players.remove(player);
        }
        if let Some(pb) = state.pending_block.as_mut() {
            pb.pending_players.remove(player);
        }
        if state.reset_game_request.as_ref().map_or(false, |r| r.player == player) {
            state.reset_game_request = None;
        }
        state.log(EventType::PlayerEliminated, Some(player), json!({}));
    }
    Ok(eliminated)
}

/// Prove a claim: shuffle the shown card back and draw a replacement.
fn reveal_and_replace<R: Rng + ?Sized>(
    state: &mut GameState,
    player: &str,
    influence: Influence,
    rng: &mut R,
) -> GameResult<()> {
    let holder = state.require_player_mut(player)?;
    if !deck::take_card(&mut holder.influences, influence) {
        return Err(GameError::MissingInfluence {
            player: player.to_string(),
            influence,
        });
    }
    holder.claimed_influences.clear();
    holder.unclaimed_influences.clear();
    deck::return_to_deck(&mut state.deck, influence, rng);
    let card = deck::draw(&mut state.deck).ok_or(InvariantViolation::CardCount {
        influence,
        found: 0,
        expected: 1,
    })?;
    state.require_player_mut(player)?.influences.push(card);
    state.log(EventType::RevealedInfluence, Some(player), json!({ "influence": influence }));
    Ok(())
}

fn add_grudge(state: &mut GameState, ai_name: &str, against: &str) {
    if let Some(ai) = state.player_mut(ai_name) {
        if ai.ai {
            *ai.grudges.entry(against.to_string()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::coup::validator::validate_state;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    /// Three seated players with fixed hands, David to act.
    fn fixed_game() -> GameState {
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        state.players.push(Player::new("Harper", "#3399dd"));
        state.players.push(Player::new("Hailey", "#FD6C33"));
        state.deck = deck::build_deck(3);
        let hands = [
            ("David", [Influence::Duke, Influence::Captain]),
            ("Harper", [Influence::Contessa, Influence::Assassin]),
            ("Hailey", [Influence::Captain, Influence::Ambassador]),
        ];
        for (name, cards) in hands {
            for card in cards {
                assert!(deck::take_card(&mut state.deck, card));
            }
            state.player_mut(name).unwrap().influences = cards.to_vec();
        }
        state.is_started = true;
        state.turn_player = Some("David".into());
        state
    }

    fn run(state: &mut GameState, player: &str, command: Command) -> GameResult<()> {
        let mut rng = StdRng::seed_from_u64(9);
        apply_command(state, player, &command, &config(), &mut rng)?;
        validate_state(state, config().max_players).map_err(GameError::from)
    }

    fn act(action: ActionKind, target: Option<&str>) -> Command {
        Command::ChooseAction {
            action,
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn test_income_resolves_immediately() {
        let mut state = fixed_game();
        run(&mut state, "David", act(ActionKind::Income, None)).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 3);
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn test_only_turn_player_may_act() {
        let mut state = fixed_game();
        let err = run(&mut state, "Harper", act(ActionKind::Income, None)).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NotYourTurn));
    }

    #[test]
    fn test_target_rules() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 7;
        assert_eq!(
            run(&mut state, "David", act(ActionKind::Coup, None)).unwrap_err(),
            GameError::InvalidTarget(TargetProblem::Missing)
        );
        assert_eq!(
            run(&mut state, "David", act(ActionKind::Tax, Some("Harper"))).unwrap_err(),
            GameError::InvalidTarget(TargetProblem::Forbidden)
        );
        assert_eq!(
            run(&mut state, "David", act(ActionKind::Steal, Some("David"))).unwrap_err(),
            GameError::InvalidTarget(TargetProblem::SelfTarget)
        );
    }

    #[test]
    fn test_forced_coup_at_ten_coins() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 10;
        let err = run(&mut state, "David", act(ActionKind::Tax, None)).unwrap_err();
        assert_eq!(err, GameError::MustCoup { coins: 10 });
        run(&mut state, "David", act(ActionKind::Coup, Some("Harper"))).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 3);
        assert_eq!(state.pending_losses("Harper"), 1);
    }

    #[test]
    fn test_assassinate_requires_coins() {
        let mut state = fixed_game();
        let err = run(&mut state, "David", act(ActionKind::Assassinate, Some("Harper"))).unwrap_err();
        assert!(matches!(err, GameError::InsufficientCoins { required: 3, available: 2, .. }));
    }

    #[test]
    fn test_failed_bluff_loses_named_influence_and_passes_turn() {
        let mut state = fixed_game();
        run(&mut state, "David", act(ActionKind::Exchange, None)).unwrap();
        run(&mut state, "Harper", Command::ActionResponse(ActionResponse::Challenge)).unwrap();
        run(&mut state, "David", Command::ActionChallengeResponse(Influence::Captain)).unwrap();
        let david = state.player("David").unwrap();
        assert_eq!(david.influences, vec![Influence::Duke]);
        assert_eq!(david.dead_influences, vec![Influence::Captain]);
        assert!(state.pending_action.is_none());
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
    }

    #[test]
    fn test_block_on_targeted_action_only_by_target() {
        let mut state = fixed_game();
        run(&mut state, "David", act(ActionKind::Steal, Some("Harper"))).unwrap();
        let err = run(
            &mut state,
            "Hailey",
            Command::ActionResponse(ActionResponse::Block(Influence::Captain)),
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NotTheTarget));
        let err = run(
            &mut state,
            "Harper",
            Command::ActionResponse(ActionResponse::Block(Influence::Duke)),
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::InvalidBlockingInfluence));
    }

    #[test]
    fn test_unchallenged_block_cancels_foreign_aid() {
        let mut state = fixed_game();
        run(&mut state, "David", act(ActionKind::ForeignAid, None)).unwrap();
        run(
            &mut state,
            "Hailey",
            Command::ActionResponse(ActionResponse::Block(Influence::Duke)),
        )
        .unwrap();
        run(&mut state, "David", Command::BlockResponse(BlockResponse::Pass)).unwrap();
        run(&mut state, "Harper", Command::BlockResponse(BlockResponse::Pass)).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 2);
        assert!(state.pending_action.is_none());
        assert!(state.pending_block.is_none());
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
        assert!(state.player("Hailey").unwrap().claimed_influences.contains(&Influence::Duke));
    }

    #[test]
    fn test_blocked_assassination_still_costs_coins() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 3;
        run(&mut state, "David", act(ActionKind::Assassinate, Some("Harper"))).unwrap();
        run(
            &mut state,
            "Harper",
            Command::ActionResponse(ActionResponse::Block(Influence::Contessa)),
        )
        .unwrap();
        run(&mut state, "David", Command::BlockResponse(BlockResponse::Pass)).unwrap();
        run(&mut state, "Hailey", Command::BlockResponse(BlockResponse::Pass)).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 0);
        assert_eq!(state.player("Harper").unwrap().influences.len(), 2);
    }

    #[test]
    fn test_proven_block_punishes_challenger() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 3;
        run(&mut state, "David", act(ActionKind::Assassinate, Some("Harper"))).unwrap();
        run(
            &mut state,
            "Harper",
            Command::ActionResponse(ActionResponse::Block(Influence::Contessa)),
        )
        .unwrap();
        run(&mut state, "David", Command::BlockResponse(BlockResponse::Challenge)).unwrap();
        run(&mut state, "Harper", Command::BlockChallengeResponse(Influence::Contessa)).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 0);
        assert_eq!(state.pending_losses("David"), 1);
        assert!(state.pending_action.is_none());
        run(&mut state, "David", Command::LoseInfluences(vec![Influence::Captain])).unwrap();
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
    }

    #[test]
    fn test_elimination_clears_outstanding_losses() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 7;
        {
            let harper = state.player_mut("Harper").unwrap();
            let card = harper.influences.pop().unwrap();
            harper.dead_influences.push(card);
        }
        run(&mut state, "David", act(ActionKind::Coup, Some("Harper"))).unwrap();
        state
            .pending_influence_loss
            .get_mut("Harper")
            .unwrap()
            .push(PendingInfluenceLoss { put_back_in_deck: false });
        run(&mut state, "Harper", Command::LoseInfluences(vec![Influence::Contessa])).unwrap();
        assert!(!state.player("Harper").unwrap().is_alive());
        assert_eq!(state.pending_losses("Harper"), 0);
        assert_eq!(state.turn_player.as_deref(), Some("Hailey"));
    }

    #[test]
    fn test_cannot_lose_more_than_owed() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 7;
        run(&mut state, "David", act(ActionKind::Coup, Some("Harper"))).unwrap();
        let err = run(
            &mut state,
            "Harper",
            Command::LoseInfluences(vec![Influence::Contessa, Influence::Assassin]),
        )
        .unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::TooManyInfluences));
        let err = run(&mut state, "Harper", Command::LoseInfluences(vec![Influence::Duke])).unwrap_err();
        assert!(matches!(err, GameError::MissingInfluence { .. }));
    }

    #[test]
    fn test_revive_returns_dead_card_to_play() {
        let mut state = fixed_game();
        state.settings.allow_revive = true;
        {
            let david = state.player_mut("David").unwrap();
            david.coins = 10;
            let card = david.influences.pop().unwrap();
            david.dead_influences.push(card);
        }
        run(&mut state, "David", act(ActionKind::Revive, None)).unwrap();
        let david = state.player("David").unwrap();
        assert_eq!(david.coins, 0);
        assert_eq!(david.influences.len(), 2);
        assert!(david.dead_influences.is_empty());
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
    }

    #[test]
    fn test_revive_disabled_by_default() {
        let mut state = fixed_game();
        state.player_mut("David").unwrap().coins = 10;
        let err = run(&mut state, "David", act(ActionKind::Revive, None)).unwrap_err();
        assert_eq!(err, GameError::MustCoup { coins: 10 });
    }

    #[test]
    fn test_reset_needs_consensus_mid_game() {
        let mut state = fixed_game();
        let err = run(&mut state, "David", Command::ResetGame).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NoResetRequest));
        run(&mut state, "Harper", Command::RequestReset).unwrap();
        let err = run(&mut state, "Harper", Command::ResetGame).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NoResetRequest));
        run(&mut state, "David", Command::ResetGame).unwrap();
        assert!(!state.is_started);
        assert!(state.players.iter().all(|p| p.coins == 2 && p.influences.len() == 2));
    }

    #[test]
    fn test_forfeit_refused_mid_resolution() {
        let mut state = fixed_game();
        run(&mut state, "David", act(ActionKind::Tax, None)).unwrap();
        let err = run(&mut state, "Harper", Command::Forfeit { replace_with_ai: false }).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::GameInProgress));
    }

    #[test]
    fn test_forfeit_by_turn_player_moves_turn() {
        let mut state = fixed_game();
        run(&mut state, "David", Command::Forfeit { replace_with_ai: false }).unwrap();
        assert!(!state.player("David").unwrap().is_alive());
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
    }

    fn make_sole_human(state: &mut GameState, human: &str) {
        for p in state.players.iter_mut().filter(|p| p.name != human) {
            p.ai = true;
            p.personality = Some(AiPersonality::default());
        }
    }

    #[test]
    fn test_forfeit_while_idle_keeps_the_turn() {
        let mut state = fixed_game();
        make_sole_human(&mut state, "Harper");
        run(&mut state, "Harper", Command::Forfeit { replace_with_ai: false }).unwrap();
        assert!(!state.player("Harper").unwrap().is_alive());
        assert_eq!(state.turn_player.as_deref(), Some("David"));
        assert_eq!(state.turn, 1);
    }

    #[test]
    fn test_forfeit_withdraws_a_raised_challenge() {
        let mut state = fixed_game();
        make_sole_human(&mut state, "Harper");
        run(&mut state, "David", act(ActionKind::Tax, None)).unwrap();
        run(&mut state, "Harper", Command::ActionResponse(ActionResponse::Challenge)).unwrap();
        run(&mut state, "Harper", Command::Forfeit { replace_with_ai: false }).unwrap();

        assert!(!state.player("Harper").unwrap().is_alive());
        assert!(state.pending_action_challenge.is_none());
        assert!(state.pending_influence_loss.is_empty());
        let pending = state.pending_action.as_ref().unwrap();
        assert_eq!(pending.pending_players.len(), 1);
        assert!(pending.pending_players.contains("Hailey"));
        assert!(!legal_commands(&state, "Hailey", &config()).is_empty());

        let err = run(&mut state, "David", Command::ActionChallengeResponse(Influence::Duke))
            .unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NoPendingChallenge));

        run(&mut state, "Hailey", Command::ActionResponse(ActionResponse::Pass)).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 5);
        assert_eq!(state.turn_player.as_deref(), Some("Hailey"));
    }

    #[test]
    fn test_forfeiting_blocker_lets_the_action_through() {
        let mut state = fixed_game();
        make_sole_human(&mut state, "Harper");
        run(&mut state, "David", act(ActionKind::Steal, Some("Harper"))).unwrap();
        run(
            &mut state,
            "Harper",
            Command::ActionResponse(ActionResponse::Block(Influence::Captain)),
        )
        .unwrap();
        run(&mut state, "David", Command::BlockResponse(BlockResponse::Challenge)).unwrap();
        run(&mut state, "Harper", Command::Forfeit { replace_with_ai: false }).unwrap();

        assert!(state.pending_action.is_none());
        assert!(state.pending_block.is_none());
        assert!(state.pending_block_challenge.is_none());
        assert!(state.pending_influence_loss.is_empty());
        assert_eq!(state.player("David").unwrap().coins, 4);
        assert_eq!(state.player("Harper").unwrap().coins, 0);
        assert_eq!(state.turn_player.as_deref(), Some("Hailey"));
    }

    #[test]
    fn test_forfeit_mid_exchange_returns_drawn_cards() {
        let mut state = fixed_game();
        make_sole_human(&mut state, "David");
        let deck_before = state.deck.len();
        run(&mut state, "David", act(ActionKind::Exchange, None)).unwrap();
        run(&mut state, "Harper", Command::ActionResponse(ActionResponse::Pass)).unwrap();
        run(&mut state, "Hailey", Command::ActionResponse(ActionResponse::Pass)).unwrap();
        assert_eq!(state.player("David").unwrap().influences.len(), 4);
        assert_eq!(state.pending_returns("David"), 2);

        run(&mut state, "David", Command::Forfeit { replace_with_ai: false }).unwrap();
        let david = state.player("David").unwrap();
        assert!(!david.is_alive());
        assert_eq!(david.dead_influences.len(), 2);
        assert_eq!(state.deck.len(), deck_before);
        assert!(state.pending_influence_loss.is_empty());
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
        assert!(!state.turn_advanced_early);
    }

    #[test]
    fn test_turn_player_forfeit_keeps_other_losses_owed() {
        let mut state = fixed_game();
        make_sole_human(&mut state, "David");
        state.player_mut("David").unwrap().coins = 7;
        run(&mut state, "David", act(ActionKind::Coup, Some("Hailey"))).unwrap();
        run(&mut state, "David", Command::Forfeit { replace_with_ai: false }).unwrap();

        assert_eq!(state.pending_losses("Hailey"), 1);
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
        assert!(state.turn_advanced_early);
        let err = run(&mut state, "Harper", act(ActionKind::Income, None)).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::InfluenceLossPending));

        run(&mut state, "Hailey", Command::LoseInfluences(vec![Influence::Captain])).unwrap();
        assert_eq!(state.player("Hailey").unwrap().influences, vec![Influence::Ambassador]);
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
        assert!(!state.turn_advanced_early);

        run(&mut state, "Harper", act(ActionKind::Income, None)).unwrap();
        assert_eq!(state.turn_player.as_deref(), Some("Hailey"));
    }

    #[test]
    fn test_queue_loss_skips_eliminated_players() {
        let mut state = fixed_game();
        let harper = state.player_mut("Harper").unwrap();
        let cards: Vec<Influence> = harper.influences.drain(..).collect();
        harper.dead_influences.extend(cards);
        queue_loss(&mut state, "Harper", false);
        queue_loss(&mut state, "Nobody", false);
        assert!(!state.any_pending_loss());
        queue_loss(&mut state, "Hailey", false);
        assert_eq!(state.pending_losses("Hailey"), 1);
    }

    #[test]
    fn test_lobby_roster_changes_keep_card_counts() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        for name in ["A", "B", "C", "D", "E", "F"] {
            apply_command(&mut state, name, &Command::JoinGame, &config(), &mut rng).unwrap();
        }
        assert_eq!(state.players.len(), 7);
        assert_eq!(validate_state(&state, 10), Ok(()));
        assert_eq!(state.deck.len(), 20 - 14);
        apply_command(
            &mut state,
            "David",
            &Command::RemovePlayer { target: "F".into() },
            &config(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(validate_state(&state, 10), Ok(()));
        assert_eq!(state.deck.len(), 15 - 12);
    }

    #[test]
    fn test_legal_commands_for_idle_turn() {
        let state = fixed_game();
        let legal = legal_commands(&state, "David", &config());
        assert!(legal.contains(&act(ActionKind::Income, None)));
        assert!(legal.contains(&act(ActionKind::Steal, Some("Hailey"))));
        assert!(!legal.contains(&act(ActionKind::Coup, Some("Harper"))));
        assert!(!legal.contains(&act(ActionKind::Revive, None)));
        assert!(legal_commands(&state, "Harper", &config()).is_empty());
    }

    #[test]
    fn test_legal_losses_are_distinct_subsets() {
        assert_eq!(
            combinations(&[Influence::Duke, Influence::Duke, Influence::Captain], 2),
            vec![
                vec![Influence::Captain, Influence::Duke],
                vec![Influence::Duke, Influence::Duke],
            ]
        );
    }

    #[test]
    fn test_default_moves_are_legal() {
        let mut state = fixed_game();
        assert_eq!(default_move(&state, "David"), Some(act(ActionKind::Income, None)));
        assert_eq!(default_move(&state, "Harper"), None);
        run(&mut state, "David", act(ActionKind::Tax, None)).unwrap();
        let pass = default_move(&state, "Harper").unwrap();
        assert_eq!(pass, Command::ActionResponse(ActionResponse::Pass));
        run(&mut state, "Harper", pass).unwrap();
        run(&mut state, "Hailey", Command::ActionResponse(ActionResponse::Challenge)).unwrap();
        let reveal = default_move(&state, "David").unwrap();
        assert_eq!(reveal, Command::ActionChallengeResponse(Influence::Duke));
        run(&mut state, "David", reveal).unwrap();
        let lose = default_move(&state, "Hailey").unwrap();
        assert_eq!(lose, Command::LoseInfluences(vec![Influence::Captain]));
        run(&mut state, "Hailey", lose).unwrap();
        assert_eq!(state.player("David").unwrap().coins, 5);
        assert_eq!(state.turn_player.as_deref(), Some("Harper"));
    }

    #[test]
    fn test_join_rejects_duplicate_names() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        let err = apply_command(&mut state, "david", &Command::JoinGame, &config(), &mut rng).unwrap_err();
        assert_eq!(err, GameError::NotAllowed(Rejection::NameTaken));
    }
}
