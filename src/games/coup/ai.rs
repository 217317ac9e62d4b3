//! Heuristic AI policy for Coup.
//!
//! Every decision reads only the public view plus the AI's own `Player`, and
//! returns a `Command` that goes through the normal rules path. The only
//! nondeterminism is the injected `BluffSource`.

use super::evaluator::*;
use super::types::*;
use super::view::PublicGameState;
use crate::engine::bot_strategy::BluffSource;

/// Below this chance of an honest claim a fully skeptical AI challenges.
const SUSPICION_SCALE: f64 = 0.25;

fn personality(me: &Player) -> AiPersonality {
    me.personality.unwrap_or_default()
}

fn is_suspicious(probability: f64, skepticism: u8) -> bool {
    probability < f64::from(skepticism) / 100.0 * SUSPICION_SCALE
}

fn choose(action: ActionKind, target: Option<&str>) -> Command {
    Command::ChooseAction {
        action,
        target: target.map(str::to_string),
    }
}

/// Pick the turn action.
pub fn decide_action(view: &PublicGameState, me: &Player, bluff: &dyn BluffSource) -> Command {
    let traits = personality(me);
    let target = pick_target(view, me, traits.vengefulness).map(|p| p.name.clone());
    let coup_cost = ActionKind::Coup.rule().coins_required;

    if me.coins >= FORCED_COUP_COINS {
        return choose(ActionKind::Coup, target.as_deref());
    }
    if me.coins >= coup_cost {
        let lethal = view
            .living_players()
            .filter(|p| p.name != me.name && p.influence_count == 1)
            .max_by_key(|p| (danger_factor(p), std::cmp::Reverse(p.name.clone())));
        if let Some(victim) = lethal {
            return choose(ActionKind::Coup, Some(&victim.name));
        }
    }

    let richest = view
        .living_players()
        .filter(|p| p.name != me.name && p.coins > 0)
        .filter(|p| {
            !p.claimed_influences.contains(&Influence::Captain)
                && !p.claimed_influences.contains(&Influence::Ambassador)
        })
        .max_by_key(|p| (p.coins, std::cmp::Reverse(p.name.clone())))
        .map(|p| p.name.clone());
    let assassin_cost = ActionKind::Assassinate.rule().coins_required;

    if me.holds(Influence::Duke) {
        return choose(ActionKind::Tax, None);
    }
    if me.holds(Influence::Assassin) && me.coins >= assassin_cost {
        if let Some(t) = &target {
            return choose(ActionKind::Assassinate, Some(t));
        }
    }
    if me.holds(Influence::Captain) {
        if let Some(t) = &richest {
            return choose(ActionKind::Steal, Some(t));
        }
    }
    if me.coins >= coup_cost {
        return choose(ActionKind::Coup, target.as_deref());
    }

    let can_claim = |influence: Influence| !all_copies_dead(view, influence);
    if can_claim(Influence::Duke) && bluff.decide_to_bluff(traits.honesty) {
        return choose(ActionKind::Tax, None);
    }
    if let Some(t) = &richest {
        if can_claim(Influence::Captain) && bluff.decide_to_bluff(traits.honesty) {
            return choose(ActionKind::Steal, Some(t));
        }
    }
    if me.holds(Influence::Ambassador) {
        return choose(ActionKind::Exchange, None);
    }

    let duke_claimed = view
        .living_players()
        .any(|p| p.name != me.name && p.claimed_influences.contains(&Influence::Duke));
    if duke_claimed {
        choose(ActionKind::Income, None)
    } else {
        choose(ActionKind::ForeignAid, None)
    }
}

/// Respond to the open action: pass, challenge or block.
pub fn decide_action_response(
    view: &PublicGameState,
    me: &Player,
    bluff: &dyn BluffSource,
) -> Command {
    let pending = match &view.pending_action {
        Some(pa) => pa,
        None => return Command::ActionResponse(ActionResponse::Pass),
    };
    let traits = personality(me);
    let rule = pending.action.rule();
    let targeted_at_me = pending.target_player.as_deref() == Some(me.name.as_str());
    let can_block = rule.blockable() && (pending.target_player.is_none() || targeted_at_me);
    let can_challenge = rule.challengeable() && !pending.claim_confirmed;
    let actor = view.turn_player.as_deref().and_then(|name| view.player(name));

    if can_challenge {
        if let Some(claimed) = rule.influence {
            if claim_impossible(view, me, claimed) {
                return Command::ActionResponse(ActionResponse::Challenge);
            }
        }
    }

    if can_block {
        if let Some(&honest) = rule.blocked_by.iter().find(|&&inf| me.holds(inf)) {
            return Command::ActionResponse(ActionResponse::Block(honest));
        }
    }

    let lethal = targeted_at_me
        && pending.action == ActionKind::Assassinate
        && me.influences.len() == 1;

    if can_block && (targeted_at_me || pending.action == ActionKind::ForeignAid) {
        let bluffable = rule
            .blocked_by
            .iter()
            .copied()
            .find(|&inf| !all_copies_dead(view, inf));
        if let Some(inf) = bluffable {
            if bluff.decide_to_bluff(traits.honesty) {
                return Command::ActionResponse(ActionResponse::Block(inf));
            }
        }
    }

    if can_challenge {
        if let Some(claimed) = rule.influence {
            let declined_before = actor.map_or(false, |a| a.unclaimed_influences.contains(&claimed));
            let probability = influence_probability(view, me, claimed);
            if lethal || declined_before || (targeted_at_me && is_suspicious(probability, traits.skepticism)) {
                return Command::ActionResponse(ActionResponse::Challenge);
            }
        }
    }

    Command::ActionResponse(ActionResponse::Pass)
}

/// Respond to the open block: pass or challenge.
pub fn decide_block_response(view: &PublicGameState, me: &Player) -> Command {
    let block = match &view.pending_block {
        Some(pb) => pb,
        None => return Command::BlockResponse(BlockResponse::Pass),
    };
    if claim_impossible(view, me, block.claimed_influence) {
        return Command::BlockResponse(BlockResponse::Challenge);
    }
    if !view.is_turn_player(&me.name) {
        return Command::BlockResponse(BlockResponse::Pass);
    }

    let blocker = view.player(&block.source_player);
    if blocker.map_or(false, |b| b.unclaimed_influences.contains(&block.claimed_influence)) {
        return Command::BlockResponse(BlockResponse::Challenge);
    }
    let probability = influence_probability(view, me, block.claimed_influence);
    if is_suspicious(probability, personality(me).skepticism) {
        return Command::BlockResponse(BlockResponse::Challenge);
    }
    Command::BlockResponse(BlockResponse::Pass)
}

/// Answer a challenge: reveal the claimed card if held, otherwise give up
/// the least valuable one.
pub fn decide_challenge_response(view: &PublicGameState, me: &Player) -> Option<Command> {
    let defending_block = view.pending_block_challenge.is_some()
        && view
            .pending_block
            .as_ref()
            .map_or(false, |pb| pb.source_player == me.name);

    let claimed = if defending_block {
        view.pending_block.as_ref().map(|pb| pb.claimed_influence)
    } else {
        view.pending_action
            .as_ref()
            .and_then(|pa| pa.action.rule().influence)
    };

    let reveal = match claimed {
        Some(c) if me.holds(c) => c,
        _ => *cards_by_value(&me.influences).first()?,
    };
    Some(if defending_block {
        Command::BlockChallengeResponse(reveal)
    } else {
        Command::ActionChallengeResponse(reveal)
    })
}

/// Settle queued losses: give up (or put back) the least valuable cards.
pub fn decide_influences_to_lose(view: &PublicGameState, me: &Player) -> Option<Command> {
    let owed = view.pending_losses(&me.name).min(me.influences.len());
    if owed == 0 {
        return None;
    }
    let cards: Vec<Influence> = cards_by_value(&me.influences).into_iter().take(owed).collect();
    Some(Command::LoseInfluences(cards))
}

/// Whatever this AI owes right now, or None if it is waiting on others.
pub fn next_ai_command(
    view: &PublicGameState,
    me: &Player,
    bluff: &dyn BluffSource,
) -> Option<Command> {
    if !view.is_started {
        return None;
    }
    if view.pending_losses(&me.name) > 0 {
        return decide_influences_to_lose(view, me);
    }
    if !me.is_alive() {
        return None;
    }

    if let (Some(block), Some(_)) = (&view.pending_block, &view.pending_block_challenge) {
        if block.source_player == me.name {
            return decide_challenge_response(view, me);
        }
        return None;
    }
    if view.pending_action.is_some() && view.pending_action_challenge.is_some() {
        if view.is_turn_player(&me.name) {
            return decide_challenge_response(view, me);
        }
        return None;
    }
    if let Some(block) = &view.pending_block {
        if block.pending_players.contains(&me.name) {
            return Some(decide_block_response(view, me));
        }
        return None;
    }
    if let Some(action) = &view.pending_action {
        if action.pending_players.contains(&me.name) {
            return Some(decide_action_response(view, me, bluff));
        }
        return None;
    }
    if view.is_turn_player(&me.name) && !view.any_pending_loss() && !view.is_game_over() {
        return Some(decide_action(view, me, bluff));
    }
    None
}
