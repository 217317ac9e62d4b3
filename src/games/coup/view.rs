//! What one seat is allowed to see of a room.
//!
//! Other players' held influences and the deck order are reduced to counts;
//! personalities flagged hidden are withheld. The viewer's own `Player` is
//! carried whole in `self_player`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub name: String,
    pub color: String,
    pub coins: u32,
    pub influence_count: usize,
    pub dead_influences: Vec<Influence>,
    pub claimed_influences: BTreeSet<Influence>,
    pub unclaimed_influences: BTreeSet<Influence>,
    pub ai: bool,
    pub personality: Option<AiPersonality>,
    pub grudges: BTreeMap<String, u32>,
}

impl PublicPlayer {
    pub fn is_alive(&self) -> bool {
        self.influence_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicGameState {
    pub room_id: String,
    pub players: Vec<PublicPlayer>,
    pub self_player: Option<Player>,
    pub deck_count: usize,
    pub turn_player: Option<String>,
    pub turn: u32,
    pub is_started: bool,
    pub pending_action: Option<PendingAction>,
    pub pending_action_challenge: Option<PendingChallenge>,
    pub pending_block: Option<PendingBlock>,
    pub pending_block_challenge: Option<PendingChallenge>,
    pub pending_influence_loss: BTreeMap<String, Vec<PendingInfluenceLoss>>,
    pub reset_game_request: Option<ResetGameRequest>,
    pub event_logs: Vec<Event>,
    pub chat_messages: Vec<ChatMessage>,
    pub last_event_timestamp: u64,
    pub settings: GameSettings,
}

fn public_player(player: &Player) -> PublicPlayer {
    PublicPlayer {
        name: player.name.clone(),
        color: player.color.clone(),
        coins: player.coins,
        influence_count: player.influences.len(),
        dead_influences: player.dead_influences.clone(),
        claimed_influences: player.claimed_influences.clone(),
        unclaimed_influences: player.unclaimed_influences.clone(),
        ai: player.ai,
        personality: if player.personality_hidden {
            None
        } else {
            player.personality
        },
        grudges: player.grudges.clone(),
    }
}

/// Project `state` for `viewer` (None for spectators).
pub fn public_view(state: &GameState, viewer: Option<&str>) -> PublicGameState {
    PublicGameState {
        room_id: state.room_id.clone(),
        players: state.players.iter().map(public_player).collect(),
        self_player: viewer.and_then(|name| state.player(name)).cloned(),
        deck_count: state.deck.len(),
        turn_player: state.turn_player.clone(),
        turn: state.turn,
        is_started: state.is_started,
        pending_action: state.pending_action.clone(),
        pending_action_challenge: state.pending_action_challenge.clone(),
        pending_block: state.pending_block.clone(),
        pending_block_challenge: state.pending_block_challenge.clone(),
        pending_influence_loss: state.pending_influence_loss.clone(),
        reset_game_request: state.reset_game_request.clone(),
        event_logs: state.event_logs.clone(),
        chat_messages: state.chat_messages.clone(),
        last_event_timestamp: state.last_event_timestamp,
        settings: state.settings.clone(),
    }
}

impl PublicGameState {
    pub fn player(&self, name: &str) -> Option<&PublicPlayer> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &PublicPlayer> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn is_game_over(&self) -> bool {
        self.is_started && self.living_players().count() <= 1
    }

    pub fn is_turn_player(&self, name: &str) -> bool {
        self.turn_player.as_deref() == Some(name)
    }

    pub fn pending_losses(&self, name: &str) -> usize {
        self.pending_influence_loss.get(name).map_or(0, |q| q.len())
    }

    pub fn any_pending_loss(&self) -> bool {
        self.pending_influence_loss.values().any(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_view_hides_other_hands() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        let mut bot = Player::new("Bot", "#3399dd");
        bot.ai = true;
        bot.personality = Some(AiPersonality::default());
        bot.personality_hidden = true;
        state.players.push(bot);
        state.redeal(&mut rng);

        let view = public_view(&state, Some("David"));
        assert_eq!(view.deck_count, state.deck.len());
        assert_eq!(view.self_player.as_ref().unwrap().influences, state.players[0].influences);
        assert_eq!(view.player("Bot").unwrap().influence_count, 2);
        assert!(view.player("Bot").unwrap().personality.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("deck").is_none());
        assert!(json["players"][1].get("influences").is_none());
    }

    #[test]
    fn test_spectator_has_no_self_player() {
        let mut rng = StdRng::seed_from_u64(4);
        let state = GameState::new("ROOM01", "David", GameSettings::default(), &mut rng);
        assert!(public_view(&state, None).self_player.is_none());
        assert!(public_view(&state, Some("Nobody")).self_player.is_none());
    }
}
