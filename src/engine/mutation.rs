//! Optimistic-concurrency mutation engine.
//!
//! Every change to a room goes through [`RoomRepository::mutate`]: the caller
//! hands in the snapshot it validated its preconditions against, and the
//! change only commits if the stored state still matches it. There is no
//! retry here; a lost race surfaces as [`GameError::StateChanged`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::engine::codec::{dehydrate, rehydrate};
use crate::engine::config::EngineConfig;
use crate::engine::error::{GameError, GameResult};
use crate::engine::plugin::RoomState;
use crate::engine::store::{room_key, GameStore};
use crate::games::coup::state::now_millis;

/// Typed access to rooms of one state type in one store.
pub struct RoomRepository<S: GameStore, T: RoomState> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    _state: PhantomData<fn() -> T>,
}

impl<S: GameStore, T: RoomState> Clone for RoomRepository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            _state: PhantomData,
        }
    }
}

impl<S: GameStore, T: RoomState> RoomRepository<S, T> {
    pub fn new(store: Arc<S>, config: Arc<EngineConfig>) -> Self {
        Self {
            store,
            config,
            _state: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn exists(&self, room_id: &str) -> GameResult<bool> {
        Ok(self.store.get(&room_key(room_id)).await?.is_some())
    }

    /// Current snapshot, or `RoomNotFound`.
    pub async fn load(&self, room_id: &str) -> GameResult<T> {
        self.load_raw(room_id).await.map(|(state, _)| state)
    }

    async fn load_raw(&self, room_id: &str) -> GameResult<(T, Vec<u8>)> {
        let raw = self
            .store
            .get(&room_key(room_id))
            .await?
            .ok_or_else(|| GameError::RoomNotFound {
                room_id: room_id.to_ascii_uppercase(),
            })?;
        let state = rehydrate(&raw)?;
        Ok((state, raw))
    }

    /// First write of a new room. Returns false if the key is already taken.
    pub async fn create(&self, mut state: T) -> GameResult<Option<T>> {
        state.check_invariants(&self.config)?;
        state.stamp(now_millis());
        let bytes = dehydrate(&state)?;
        let key = room_key(state.room_id());
        let written = self
            .store
            .set_if_unchanged(&key, None, bytes, self.config.state_ttl())
            .await?;
        if !written {
            tracing::debug!(room_id = %state.room_id(), "room id already taken");
            return Ok(None);
        }
        tracing::info!(room_id = %state.room_id(), "room created");
        Ok(Some(state))
    }

    /// Apply `transform` to the current state if it still matches
    /// `known_good`, validate, stamp and persist.
    ///
    /// Returns the committed state, or the unchanged current state when the
    /// transform was a no-op.
    pub async fn mutate<F>(&self, known_good: &T, transform: F) -> GameResult<T>
    where
        F: FnOnce(&mut T) -> GameResult<()> + Send,
    {
        let room_id = known_good.room_id().to_string();
        let (current, raw) = self.load_raw(&room_id).await?;

        if !current.same_state(known_good) {
            tracing::debug!(room_id = %room_id, "snapshot is stale");
            return Err(GameError::StateChanged);
        }

        let mut next = current.clone();
        transform(&mut next)?;

        if next == current {
            tracing::trace!(room_id = %room_id, "no-op mutation");
            return Ok(current);
        }

        if let Err(violation) = next.check_invariants(&self.config) {
            tracing::error!(room_id = %room_id, error = %violation, "rejected invalid transition");
            return Err(violation.into());
        }

        next.stamp(now_millis());
        let bytes = dehydrate(&next)?;
        let committed = self
            .store
            .set_if_unchanged(&room_key(&room_id), Some(&raw), bytes, self.config.state_ttl())
            .await?;
        if !committed {
            tracing::debug!(room_id = %room_id, "lost race at commit");
            return Err(GameError::StateChanged);
        }
        Ok(next)
    }
}
