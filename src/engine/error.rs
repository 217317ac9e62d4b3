//! Error taxonomy shared by the mutation engine, the rules and the server.
//!
//! Every variant carries a stable `key()` plus structured fields so a
//! transport layer can render a localized message. `Display` output is for
//! logs only.

use crate::games::coup::types::{ActionKind, Influence};

/// Coarse error category. Transport layers branch on this, not on variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAllowed,
    InvalidTarget,
    InsufficientResource,
    MissingInfluence,
    Conflict,
    InvariantViolation,
    Infrastructure,
}

/// Reasons a command is illegal in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("game has not started")]
    GameNotStarted,
    #[error("game has already started")]
    GameAlreadyStarted,
    #[error("game is over")]
    GameOver,
    #[error("game is in progress")]
    GameInProgress,
    #[error("not your turn")]
    NotYourTurn,
    #[error("not enough players")]
    NotEnoughPlayers,
    #[error("room is full")]
    RoomFull,
    #[error("player name already taken")]
    NameTaken,
    #[error("player name is invalid")]
    InvalidName,
    #[error("cannot remove the last player")]
    LastPlayer,
    #[error("player has no influence left")]
    PlayerDead,
    #[error("an action is already pending")]
    ActionPending,
    #[error("no action is pending")]
    NoPendingAction,
    #[error("no block is pending")]
    NoPendingBlock,
    #[error("no challenge is pending")]
    NoPendingChallenge,
    #[error("influence losses are still pending")]
    InfluenceLossPending,
    #[error("player is not expected to respond")]
    NotAwaitingResponse,
    #[error("action cannot be challenged")]
    NotChallengeable,
    #[error("claim was already confirmed")]
    ClaimAlreadyConfirmed,
    #[error("action cannot be blocked")]
    NotBlockable,
    #[error("influence cannot block this action")]
    InvalidBlockingInfluence,
    #[error("only the target may block")]
    NotTheTarget,
    #[error("too many influences to lose")]
    TooManyInfluences,
    #[error("revive is disabled")]
    ReviveDisabled,
    #[error("no dead influence to revive")]
    NothingToRevive,
    #[error("no reset has been requested")]
    NoResetRequest,
    #[error("reset already requested")]
    ResetAlreadyRequested,
    #[error("speed round is not enabled")]
    SpeedRoundDisabled,
    #[error("speed round timer has not expired")]
    SpeedRoundNotExpired,
    #[error("message is empty")]
    EmptyMessage,
}

impl Rejection {
    pub fn key(&self) -> &'static str {
        match self {
            Rejection::GameNotStarted => "GAME_NOT_STARTED",
            Rejection::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Rejection::GameOver => "GAME_OVER",
            Rejection::GameInProgress => "GAME_IN_PROGRESS",
            Rejection::NotYourTurn => "NOT_YOUR_TURN",
            Rejection::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            Rejection::RoomFull => "ROOM_FULL",
            Rejection::NameTaken => "NAME_TAKEN",
            Rejection::InvalidName => "INVALID_NAME",
            Rejection::LastPlayer => "LAST_PLAYER",
            Rejection::PlayerDead => "PLAYER_DEAD",
            Rejection::ActionPending => "ACTION_PENDING",
            Rejection::NoPendingAction => "NO_PENDING_ACTION",
            Rejection::NoPendingBlock => "NO_PENDING_BLOCK",
            Rejection::NoPendingChallenge => "NO_PENDING_CHALLENGE",
            Rejection::InfluenceLossPending => "INFLUENCE_LOSS_PENDING",
            Rejection::NotAwaitingResponse => "NOT_AWAITING_RESPONSE",
            Rejection::NotChallengeable => "NOT_CHALLENGEABLE",
            Rejection::ClaimAlreadyConfirmed => "CLAIM_ALREADY_CONFIRMED",
            Rejection::NotBlockable => "NOT_BLOCKABLE",
            Rejection::InvalidBlockingInfluence => "INVALID_BLOCKING_INFLUENCE",
            Rejection::NotTheTarget => "NOT_THE_TARGET",
            Rejection::TooManyInfluences => "TOO_MANY_INFLUENCES",
            Rejection::ReviveDisabled => "REVIVE_DISABLED",
            Rejection::NothingToRevive => "NOTHING_TO_REVIVE",
            Rejection::NoResetRequest => "NO_RESET_REQUEST",
            Rejection::ResetAlreadyRequested => "RESET_ALREADY_REQUESTED",
            Rejection::SpeedRoundDisabled => "SPEED_ROUND_DISABLED",
            Rejection::SpeedRoundNotExpired => "SPEED_ROUND_NOT_EXPIRED",
            Rejection::EmptyMessage => "EMPTY_MESSAGE",
        }
    }
}

/// Targeting problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetProblem {
    #[error("action requires a target")]
    Missing,
    #[error("action does not take a target")]
    Forbidden,
    #[error("cannot target yourself")]
    SelfTarget,
    #[error("target has no influence left")]
    Eliminated,
    #[error("target is not in the game")]
    Unknown,
}

impl TargetProblem {
    pub fn key(&self) -> &'static str {
        match self {
            TargetProblem::Missing => "TARGET_REQUIRED",
            TargetProblem::Forbidden => "TARGET_FORBIDDEN",
            TargetProblem::SelfTarget => "TARGET_SELF",
            TargetProblem::Eliminated => "TARGET_ELIMINATED",
            TargetProblem::Unknown => "TARGET_UNKNOWN",
        }
    }
}

/// Structural problems found by the invariant validator. These indicate a
/// bug in the rules, never a bad request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("player count {count} outside 1..={max}")]
    PlayerCount { count: usize, max: usize },
    #[error("duplicate player name {name}")]
    DuplicatePlayer { name: String },
    #[error("turn player {name:?} is missing or has no influence")]
    TurnPlayer { name: Option<String> },
    #[error("player {name} holds {held} + {dead} dead - {returns} returns, expected 2")]
    InfluenceTotal {
        name: String,
        held: usize,
        dead: usize,
        returns: usize,
    },
    #[error("{influence:?} count {found}, expected {expected}")]
    CardCount {
        influence: Influence,
        found: usize,
        expected: usize,
    },
    #[error("pending {phase} has nobody left to respond")]
    StalledPending { phase: &'static str },
    #[error("pending {phase} without its parent phase")]
    OrphanedPending { phase: &'static str },
    #[error("pending influence loss for unknown player {name}")]
    UnknownLossPlayer { name: String },
    #[error("no living player to take the turn")]
    NoLivingPlayer,
}

/// Infrastructure failure from the key-value store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("room {room_id} not found")]
    RoomNotFound { room_id: String },
    #[error("player {player} not in game")]
    PlayerNotFound { player: String },
    #[error("not allowed: {0}")]
    NotAllowed(Rejection),
    #[error("invalid target: {0}")]
    InvalidTarget(TargetProblem),
    #[error("{action:?} needs {required} coins, have {available}")]
    InsufficientCoins {
        action: ActionKind,
        required: u32,
        available: u32,
    },
    #[error("must coup with {coins} coins")]
    MustCoup { coins: u32 },
    #[error("{player} does not hold {influence:?}")]
    MissingInfluence { player: String, influence: Influence },
    #[error("game state changed since it was read")]
    StateChanged,
    #[error("invariant violated: {0}")]
    Invariant(InvariantViolation),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("snapshot codec failure: {0}")]
    Codec(String),
    #[error("could not allocate a room id")]
    RoomIdExhausted,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::RoomNotFound { .. } => ErrorKind::NotFound,
            GameError::PlayerNotFound { .. } | GameError::NotAllowed(_) => ErrorKind::NotAllowed,
            GameError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            GameError::InsufficientCoins { .. } | GameError::MustCoup { .. } => {
                ErrorKind::InsufficientResource
            }
            GameError::MissingInfluence { .. } => ErrorKind::MissingInfluence,
            GameError::StateChanged => ErrorKind::Conflict,
            GameError::Invariant(_) => ErrorKind::InvariantViolation,
            GameError::Store(_) | GameError::Codec(_) | GameError::RoomIdExhausted => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Stable identifier for translation lookups.
    pub fn key(&self) -> &'static str {
        match self {
            GameError::RoomNotFound { .. } => "ROOM_NOT_FOUND",
            GameError::PlayerNotFound { .. } => "PLAYER_NOT_FOUND",
            GameError::NotAllowed(r) => r.key(),
            GameError::InvalidTarget(t) => t.key(),
            GameError::InsufficientCoins { .. } => "INSUFFICIENT_COINS",
            GameError::MustCoup { .. } => "MUST_COUP",
            GameError::MissingInfluence { .. } => "MISSING_INFLUENCE",
            GameError::StateChanged => "STATE_CHANGED",
            GameError::Invariant(_) => "INVARIANT_VIOLATION",
            GameError::Store(_) => "STORE_UNAVAILABLE",
            GameError::Codec(_) => "CODEC_FAILURE",
            GameError::RoomIdExhausted => "ROOM_ID_EXHAUSTED",
        }
    }

    /// Only lost races are worth resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::StateChanged)
    }
}

impl From<Rejection> for GameError {
    fn from(r: Rejection) -> Self {
        GameError::NotAllowed(r)
    }
}

impl From<TargetProblem> for GameError {
    fn from(t: TargetProblem) -> Self {
        GameError::InvalidTarget(t)
    }
}

impl From<InvariantViolation> for GameError {
    fn from(v: InvariantViolation) -> Self {
        GameError::Invariant(v)
    }
}

pub type GameResult<T> = Result<T, GameError>;
