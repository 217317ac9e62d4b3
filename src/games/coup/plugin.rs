//! Coup as a stored room.

use super::types::GameState;
use super::validator::validate_state;
use crate::engine::config::EngineConfig;
use crate::engine::error::InvariantViolation;
use crate::engine::plugin::RoomState;

impl RoomState for GameState {
    fn room_id(&self) -> &str {
        &self.room_id
    }

    fn same_state(&self, other: &Self) -> bool {
        GameState::same_state(self, other)
    }

    fn check_invariants(&self, config: &EngineConfig) -> Result<(), InvariantViolation> {
        validate_state(self, config.max_players)
    }

    fn stamp(&mut self, now_millis: u64) {
        self.last_event_timestamp = now_millis;
    }

    fn last_event_timestamp(&self) -> u64 {
        self.last_event_timestamp
    }
}
