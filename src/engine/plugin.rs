//! RoomState trait: what the mutation engine needs from a stored game.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::config::EngineConfig;
use crate::engine::error::InvariantViolation;

/// A room-scoped aggregate that can be persisted and mutated optimistically.
///
/// `same_state` must ignore ordering that carries no meaning (card piles,
/// set-like collections) so that a re-serialized snapshot still compares
/// equal to the one a caller validated against.
pub trait RoomState:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn room_id(&self) -> &str;

    /// Order-insensitive equality used for the conflict check.
    fn same_state(&self, other: &Self) -> bool;

    /// Structural invariants that must hold before anything is persisted.
    fn check_invariants(&self, config: &EngineConfig) -> Result<(), InvariantViolation>;

    /// Record the time of the last committed change.
    fn stamp(&mut self, now_millis: u64);

    fn last_event_timestamp(&self) -> u64;
}
