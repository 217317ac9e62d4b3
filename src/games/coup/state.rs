//! GameState construction, lookups and bookkeeping helpers.

use std::collections::BTreeSet;

use rand::Rng;

use super::deck;
use super::types::*;
use crate::engine::error::{GameError, GameResult};

impl GameState {
    /// New lobby with its creator seated and dealt in.
    pub fn new<R: Rng + ?Sized>(
        room_id: impl Into<String>,
        creator: &str,
        settings: GameSettings,
        rng: &mut R,
    ) -> Self {
        let mut state = Self {
            room_id: room_id.into(),
            deck: Vec::new(),
            players: vec![Player::new(creator, PLAYER_COLORS[0])],
            turn_player: None,
            turn: 1,
            is_started: false,
            pending_action: None,
            pending_action_challenge: None,
            pending_block: None,
            pending_block_challenge: None,
            pending_influence_loss: Default::default(),
            reset_game_request: None,
            turn_advanced_early: false,
            event_logs: Vec::new(),
            chat_messages: Vec::new(),
            last_event_timestamp: 0,
            settings,
        };
        state.redeal(rng);
        state
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    pub fn require_player(&self, name: &str) -> GameResult<&Player> {
        self.player(name).ok_or_else(|| GameError::PlayerNotFound {
            player: name.to_string(),
        })
    }

    pub fn require_player_mut(&mut self, name: &str) -> GameResult<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| GameError::PlayerNotFound {
                player: name.to_string(),
            })
    }

    pub fn player_index(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name == name)
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn living_count(&self) -> usize {
        self.living_players().count()
    }

    /// Names of every living player except `name`.
    pub fn living_names_except(&self, name: &str) -> BTreeSet<String> {
        self.living_players()
            .filter(|p| p.name != name)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn is_game_over(&self) -> bool {
        self.is_started && self.living_count() <= 1
    }

    pub fn winner(&self) -> Option<&Player> {
        if !self.is_game_over() {
            return None;
        }
        self.living_players().next()
    }

    pub fn is_turn_player(&self, name: &str) -> bool {
        self.turn_player.as_deref() == Some(name)
    }

    /// Queued losses still owed by a player.
    pub fn pending_losses(&self, name: &str) -> usize {
        self.pending_influence_loss.get(name).map_or(0, |q| q.len())
    }

    /// Queued losses that destroy the card rather than return it.
    pub fn pending_real_losses(&self, name: &str) -> usize {
        self.pending_influence_loss
            .get(name)
            .map_or(0, |q| q.iter().filter(|l| !l.put_back_in_deck).count())
    }

    pub fn pending_returns(&self, name: &str) -> usize {
        self.pending_losses(name) - self.pending_real_losses(name)
    }

    pub fn any_pending_loss(&self) -> bool {
        self.pending_influence_loss.values().any(|q| !q.is_empty())
    }

    pub fn has_pending_phase(&self) -> bool {
        self.pending_action.is_some()
            || self.pending_action_challenge.is_some()
            || self.pending_block.is_some()
            || self.pending_block_challenge.is_some()
            || self.any_pending_loss()
    }

    pub fn phase(&self) -> TurnPhase {
        if !self.is_started {
            return TurnPhase::Lobby;
        }
        if self.is_game_over() {
            return TurnPhase::GameOver;
        }
        if self.pending_block_challenge.is_some() {
            TurnPhase::BlockChallengePending
        } else if self.pending_block.is_some() {
            TurnPhase::BlockPending
        } else if self.pending_action_challenge.is_some() {
            TurnPhase::ActionChallengePending
        } else if self.pending_action.is_some() {
            TurnPhase::ActionPending
        } else if self.any_pending_loss() {
            TurnPhase::InfluenceLossPending
        } else {
            TurnPhase::Idle
        }
    }

    pub fn next_color(&self) -> String {
        PLAYER_COLORS
            .iter()
            .find(|c| !self.players.iter().any(|p| p.color == **c))
            .unwrap_or(&PLAYER_COLORS[self.players.len() % PLAYER_COLORS.len()])
            .to_string()
    }

    /// Rebuild the deck for the current roster and deal everyone a fresh hand.
    pub fn redeal<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.deck = deck::shuffled_deck(self.players.len(), rng);
        for player in &mut self.players {
            player.coins = STARTING_COINS;
            player.influences.clear();
            player.dead_influences.clear();
            player.claimed_influences.clear();
            player.unclaimed_influences.clear();
            player.grudges.clear();
            for _ in 0..STARTING_INFLUENCES {
                if let Some(card) = deck::draw(&mut self.deck) {
                    player.influences.push(card);
                }
            }
        }
    }

    pub fn clear_pending(&mut self) {
        self.pending_action = None;
        self.pending_action_challenge = None;
        self.pending_block = None;
        self.pending_block_challenge = None;
    }

    pub fn log(&mut self, event_type: EventType, player: Option<&str>, payload: serde_json::Value) {
        self.event_logs.push(Event {
            event_type,
            turn: self.turn,
            player: player.map(str::to_string),
            payload,
        });
    }

    /// Drop events that fell out of the retention window.
    pub fn prune_events(&mut self) {
        let retention = self.settings.event_log_retention_turns.max(1);
        let oldest = self.turn.saturating_sub(retention - 1);
        self.event_logs.retain(|e| e.turn >= oldest);
    }

    /// Canonical form for order-insensitive comparison.
    pub fn canonical(&self) -> GameState {
        let mut c = self.clone();
        c.deck.sort();
        for player in &mut c.players {
            player.influences.sort();
            player.dead_influences.sort();
        }
        c
    }

    /// Field-for-field equality with piles compared as multisets.
    pub fn same_state(&self, other: &GameState) -> bool {
        self.canonical() == other.canonical()
    }
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_game_deals_two_influences() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = GameState::new("ABC123", "David", GameSettings::default(), &mut rng);
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].influences.len(), 2);
        assert_eq!(state.players[0].coins, 2);
        assert_eq!(state.deck.len(), 13);
        assert_eq!(state.phase(), TurnPhase::Lobby);
    }

    #[test]
    fn test_same_state_ignores_pile_order() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = GameState::new("ABC123", "David", GameSettings::default(), &mut rng);
        let mut b = a.clone();
        b.deck.reverse();
        b.players[0].influences.reverse();
        assert!(a.same_state(&b));
        b.players[0].coins += 1;
        assert!(!a.same_state(&b));
    }

    #[test]
    fn test_prune_keeps_retention_window() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = GameState::new("ABC123", "David", GameSettings::default(), &mut rng);
        for turn in 1..=6 {
            state.turn = turn;
            state.log(EventType::TurnAdvanced, None, serde_json::json!({}));
        }
        state.prune_events();
        let turns: Vec<u32> = state.event_logs.iter().map(|e| e.turn).collect();
        assert_eq!(turns, vec![4, 5, 6]);
    }
}
