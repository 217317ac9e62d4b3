//! Room-level command handlers.
//!
//! Every handler loads a snapshot, validates the command against it and then
//! commits `apply_command` through [`RoomRepository::mutate`]. Writers racing
//! on the same snapshot get [`GameError::StateChanged`]; nothing here retries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::bot_strategy::{BotStrategy, HeuristicStrategy, RandomBluff};
use crate::engine::config::EngineConfig;
use crate::engine::error::{GameError, GameResult, Rejection};
use crate::engine::mutation::RoomRepository;
use crate::engine::plugin::RoomState;
use crate::engine::room_id::{generate_room_id, is_valid_room_id};
use crate::engine::store::GameStore;
use crate::games::coup::rules;
use crate::games::coup::state::now_millis;
use crate::games::coup::types::{
    ActionKind, ActionResponse, AiPersonality, BlockResponse, Command, GameSettings, GameState,
    Influence,
};
use crate::games::coup::view::{public_view, PublicGameState};

const CHAT_ID_LEN: usize = 12;

/// Command entry points for every room held in one store.
pub struct GameServer<S: GameStore> {
    rooms: RoomRepository<S, GameState>,
    bots: HashMap<String, Arc<dyn BotStrategy>>,
    default_bot: Arc<dyn BotStrategy>,
}

impl<S: GameStore> GameServer<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            rooms: RoomRepository::new(store, Arc::new(config.normalized())),
            bots: HashMap::new(),
            default_bot: Arc::new(HeuristicStrategy::new(Box::new(RandomBluff::from_entropy()))),
        }
    }

    /// Strategy for AI seats without a per-name override.
    pub fn with_default_bot(mut self, strategy: Arc<dyn BotStrategy>) -> Self {
        self.default_bot = strategy;
        self
    }

    /// Drive the AI seat called `player` with `strategy`, in any room.
    pub fn with_bot(mut self, player: impl Into<String>, strategy: Arc<dyn BotStrategy>) -> Self {
        self.bots.insert(player.into(), strategy);
        self
    }

    pub fn rooms(&self) -> &RoomRepository<S, GameState> {
        &self.rooms
    }

    pub fn config(&self) -> &EngineConfig {
        self.rooms.config()
    }

    fn strategy_for(&self, player: &str) -> &dyn BotStrategy {
        self.bots
            .get(player)
            .unwrap_or(&self.default_bot)
            .as_ref()
    }

    /// Open a lobby with `creator` seated, retrying on room id collisions.
    /// Without explicit settings the configured defaults apply.
    pub async fn create_game(
        &self,
        creator: &str,
        settings: Option<GameSettings>,
    ) -> GameResult<GameState> {
        rules::validate_name(creator)?;
        let settings = settings.unwrap_or_else(|| self.config().default_settings.clone());
        let attempts = self.config().room_id_attempts.max(1);
        for attempt in 1..=attempts {
            let state = {
                let mut rng = StdRng::from_entropy();
                let room_id = generate_room_id(&mut rng);
                GameState::new(room_id, creator, settings.clone(), &mut rng)
            };
            let room_id = state.room_id.clone();
            if let Some(created) = self.rooms.create(state).await? {
                tracing::info!(room_id = %created.room_id, creator, "game created");
                return Ok(created);
            }
            tracing::debug!(room_id = %room_id, attempt, "room id collision");
        }
        tracing::warn!(attempts, "could not allocate a room id");
        Err(GameError::RoomIdExhausted)
    }

    /// Malformed room codes are reported as missing without a store round trip.
    async fn load_room(&self, room_id: &str) -> GameResult<GameState> {
        if !is_valid_room_id(room_id) {
            return Err(GameError::RoomNotFound {
                room_id: room_id.to_ascii_uppercase(),
            });
        }
        self.rooms.load(room_id).await
    }

    /// Validate `command` against the stored room and commit it.
    pub async fn execute(
        &self,
        room_id: &str,
        player: &str,
        command: Command,
    ) -> GameResult<GameState> {
        let snapshot = self.load_room(room_id).await?;
        if let Err(e) = rules::validate_command(&snapshot, player, &command, self.config()) {
            tracing::debug!(
                room_id = %snapshot.room_id,
                player,
                command = command.name(),
                error = %e,
                "command rejected"
            );
            return Err(e);
        }

        let config = self.rooms.config();
        let mut rng = StdRng::from_entropy();
        let result = self
            .rooms
            .mutate(&snapshot, |state| {
                rules::apply_command(state, player, &command, config, &mut rng)
            })
            .await;

        match &result {
            Ok(state) => tracing::info!(
                room_id = %state.room_id,
                player,
                command = command.name(),
                turn = state.turn,
                "command applied"
            ),
            Err(e) if e.is_retryable() => tracing::debug!(
                room_id = %snapshot.room_id,
                player,
                command = command.name(),
                "command lost a race"
            ),
            Err(e) => tracing::warn!(
                room_id = %snapshot.room_id,
                player,
                command = command.name(),
                error = %e,
                "command failed"
            ),
        }
        result
    }

    pub async fn public_state(
        &self,
        room_id: &str,
        viewer: Option<&str>,
    ) -> GameResult<PublicGameState> {
        let state = self.load_room(room_id).await?;
        Ok(public_view(&state, viewer))
    }

    // --- Lobby ---

    pub async fn join_game(&self, room_id: &str, name: &str) -> GameResult<GameState> {
        self.execute(room_id, name, Command::JoinGame).await
    }

    pub async fn add_ai_player(
        &self,
        room_id: &str,
        requester: &str,
        name: &str,
        personality: AiPersonality,
        personality_hidden: bool,
    ) -> GameResult<GameState> {
        let command = Command::AddAiPlayer {
            name: name.to_string(),
            personality,
            personality_hidden,
        };
        self.execute(room_id, requester, command).await
    }

    pub async fn remove_player(
        &self,
        room_id: &str,
        requester: &str,
        target: &str,
    ) -> GameResult<GameState> {
        let command = Command::RemovePlayer {
            target: target.to_string(),
        };
        self.execute(room_id, requester, command).await
    }

    pub async fn start_game(&self, room_id: &str, player: &str) -> GameResult<GameState> {
        self.execute(room_id, player, Command::StartGame).await
    }

    pub async fn update_settings(
        &self,
        room_id: &str,
        player: &str,
        settings: GameSettings,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::UpdateSettings(settings))
            .await
    }

    // --- Turn flow ---

    pub async fn choose_action(
        &self,
        room_id: &str,
        player: &str,
        action: ActionKind,
        target: Option<&str>,
    ) -> GameResult<GameState> {
        let command = Command::ChooseAction {
            action,
            target: target.map(str::to_string),
        };
        self.execute(room_id, player, command).await
    }

    pub async fn action_response(
        &self,
        room_id: &str,
        player: &str,
        response: ActionResponse,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::ActionResponse(response))
            .await
    }

    pub async fn action_challenge_response(
        &self,
        room_id: &str,
        player: &str,
        revealed: Influence,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::ActionChallengeResponse(revealed))
            .await
    }

    pub async fn block_response(
        &self,
        room_id: &str,
        player: &str,
        response: BlockResponse,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::BlockResponse(response))
            .await
    }

    pub async fn block_challenge_response(
        &self,
        room_id: &str,
        player: &str,
        revealed: Influence,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::BlockChallengeResponse(revealed))
            .await
    }

    pub async fn lose_influences(
        &self,
        room_id: &str,
        player: &str,
        influences: Vec<Influence>,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::LoseInfluences(influences))
            .await
    }

    // --- Meta ---

    pub async fn request_reset(&self, room_id: &str, player: &str) -> GameResult<GameState> {
        self.execute(room_id, player, Command::RequestReset).await
    }

    pub async fn cancel_reset(&self, room_id: &str, player: &str) -> GameResult<GameState> {
        self.execute(room_id, player, Command::CancelReset).await
    }

    pub async fn reset_game(&self, room_id: &str, player: &str) -> GameResult<GameState> {
        self.execute(room_id, player, Command::ResetGame).await
    }

    pub async fn forfeit(
        &self,
        room_id: &str,
        player: &str,
        replace_with_ai: bool,
    ) -> GameResult<GameState> {
        self.execute(room_id, player, Command::Forfeit { replace_with_ai })
            .await
    }

    pub async fn send_chat_message(
        &self,
        room_id: &str,
        player: &str,
        text: &str,
    ) -> GameResult<GameState> {
        let id: String = StdRng::from_entropy()
            .sample_iter(&Alphanumeric)
            .take(CHAT_ID_LEN)
            .map(char::from)
            .collect();
        let command = Command::SendChatMessage {
            id,
            text: text.to_string(),
        };
        self.execute(room_id, player, command).await
    }

    // --- Automation ---

    /// Make one move for the first AI seat that owes a decision.
    ///
    /// Returns false when no AI has anything to do. A strategy answer the
    /// rules reject is logged and replaced by the first legal command.
    pub async fn check_ai_move(&self, room_id: &str) -> GameResult<bool> {
        let state = self.load_room(room_id).await?;
        if !state.is_started || state.is_game_over() {
            return Ok(false);
        }

        for player in state.players.iter().filter(|p| p.ai) {
            let legal = rules::legal_commands(&state, &player.name, self.config());
            let Some(fallback) = legal.first() else {
                continue;
            };
            let view = public_view(&state, Some(&player.name));
            let command = match self
                .strategy_for(&player.name)
                .choose_command(&view, player, &legal)
            {
                Some(cmd)
                    if rules::validate_command(&state, &player.name, &cmd, self.config())
                        .is_ok() =>
                {
                    cmd
                }
                Some(cmd) => {
                    tracing::warn!(
                        room_id = %state.room_id,
                        player = %player.name,
                        command = cmd.name(),
                        "AI chose an illegal command, falling back"
                    );
                    fallback.clone()
                }
                None => {
                    tracing::warn!(
                        room_id = %state.room_id,
                        player = %player.name,
                        "AI had no decision, falling back"
                    );
                    fallback.clone()
                }
            };
            self.execute(room_id, &player.name, command).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Speed round: once the timer has run out, make the default move for
    /// every player who owed a decision when it expired.
    ///
    /// Returns the number of moves made.
    pub async fn auto_move(&self, room_id: &str) -> GameResult<usize> {
        let state = self.load_room(room_id).await?;
        let speed = state
            .settings
            .speed_round
            .ok_or(GameError::from(Rejection::SpeedRoundDisabled))?;
        if !state.is_started || state.is_game_over() {
            return Ok(0);
        }
        let deadline = state.last_event_timestamp() + u64::from(speed.seconds) * 1000;
        if now_millis() < deadline {
            return Err(Rejection::SpeedRoundNotExpired.into());
        }

        let owing: Vec<String> = state
            .players
            .iter()
            .filter(|p| rules::default_move(&state, &p.name).is_some())
            .map(|p| p.name.clone())
            .collect();

        let mut moved = BTreeSet::new();
        for name in &owing {
            let current = self.load_room(room_id).await?;
            let Some(command) = rules::default_move(&current, name) else {
                continue;
            };
            if !moved.insert(name.clone()) {
                continue;
            }
            tracing::info!(
                room_id = %current.room_id,
                player = %name,
                command = command.name(),
                "speed round timed out"
            );
            self.execute(room_id, name, command).await?;
        }
        Ok(moved.len())
    }
}
