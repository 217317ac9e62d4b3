//! Domain types for Coup.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const STARTING_COINS: u32 = 2;
pub const STARTING_INFLUENCES: usize = 2;
pub const FORCED_COUP_COINS: u32 = 10;
pub const EXCHANGE_DRAW: usize = 2;
pub const STEAL_AMOUNT: u32 = 2;

/// Character cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Influence {
    Assassin,
    Ambassador,
    Captain,
    Contessa,
    Duke,
}

pub const ALL_INFLUENCES: [Influence; 5] = [
    Influence::Assassin,
    Influence::Ambassador,
    Influence::Captain,
    Influence::Contessa,
    Influence::Duke,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    Assassinate,
    Coup,
    Exchange,
    ForeignAid,
    Income,
    Revive,
    Steal,
    Tax,
}

pub const ALL_ACTIONS: [ActionKind; 8] = [
    ActionKind::Assassinate,
    ActionKind::Coup,
    ActionKind::Exchange,
    ActionKind::ForeignAid,
    ActionKind::Income,
    ActionKind::Revive,
    ActionKind::Steal,
    ActionKind::Tax,
];

/// Static rules of one action.
#[derive(Debug, Clone)]
pub struct ActionRule {
    /// Influence the actor claims by choosing the action.
    pub influence: Option<Influence>,
    pub blocked_by: &'static [Influence],
    pub requires_target: bool,
    pub coins_required: u32,
}

impl ActionRule {
    pub fn challengeable(&self) -> bool {
        self.influence.is_some()
    }

    pub fn blockable(&self) -> bool {
        !self.blocked_by.is_empty()
    }
}

pub static ACTION_RULES: Lazy<HashMap<ActionKind, ActionRule>> = Lazy::new(|| {
    use Influence::*;
    let mut m = HashMap::new();
    m.insert(ActionKind::Assassinate, ActionRule {
        influence: Some(Assassin),
        blocked_by: &[Contessa],
        requires_target: true,
        coins_required: 3,
    });
    m.insert(ActionKind::Coup, ActionRule {
        influence: None,
        blocked_by: &[],
        requires_target: true,
        coins_required: 7,
    });
    m.insert(ActionKind::Exchange, ActionRule {
        influence: Some(Ambassador),
        blocked_by: &[],
        requires_target: false,
        coins_required: 0,
    });
    m.insert(ActionKind::ForeignAid, ActionRule {
        influence: None,
        blocked_by: &[Duke],
        requires_target: false,
        coins_required: 0,
    });
    m.insert(ActionKind::Income, ActionRule {
        influence: None,
        blocked_by: &[],
        requires_target: false,
        coins_required: 0,
    });
    m.insert(ActionKind::Revive, ActionRule {
        influence: None,
        blocked_by: &[],
        requires_target: false,
        coins_required: 10,
    });
    m.insert(ActionKind::Steal, ActionRule {
        influence: Some(Captain),
        blocked_by: &[Ambassador, Captain],
        requires_target: true,
        coins_required: 0,
    });
    m.insert(ActionKind::Tax, ActionRule {
        influence: Some(Duke),
        blocked_by: &[],
        requires_target: false,
        coins_required: 0,
    });
    m
});

impl ActionKind {
    pub fn rule(self) -> &'static ActionRule {
        &ACTION_RULES[&self]
    }
}

/// Copies of each influence in play for a roster size.
pub fn copies_per_influence(player_count: usize) -> usize {
    match player_count {
        0..=6 => 3,
        7..=8 => 4,
        _ => 5,
    }
}

pub const PLAYER_COLORS: [&str; 12] = [
    "#13CC63", "#3399dd", "#FD6C33", "#00CCDD", "#FFC303", "#FA0088",
    "#A36FFF", "#8B4513", "#FF4444", "#70A030", "#1E3A8A", "#C0C0C0",
];

/// AI temperament, each trait 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiPersonality {
    pub vengefulness: u8,
    pub honesty: u8,
    pub skepticism: u8,
}

impl Default for AiPersonality {
    fn default() -> Self {
        Self {
            vengefulness: 50,
            honesty: 50,
            skepticism: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub color: String,
    pub coins: u32,
    pub influences: Vec<Influence>,
    #[serde(default)]
    pub dead_influences: Vec<Influence>,
    /// Influences publicly claimed since the hand last changed.
    #[serde(default)]
    pub claimed_influences: BTreeSet<Influence>,
    /// Influences the player declined to claim when a claim would have helped.
    #[serde(default)]
    pub unclaimed_influences: BTreeSet<Influence>,
    #[serde(default)]
    pub ai: bool,
    #[serde(default)]
    pub personality: Option<AiPersonality>,
    #[serde(default)]
    pub personality_hidden: bool,
    #[serde(default)]
    pub grudges: BTreeMap<String, u32>,
}

impl Player {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            coins: STARTING_COINS,
            influences: Vec::new(),
            dead_influences: Vec::new(),
            claimed_influences: BTreeSet::new(),
            unclaimed_influences: BTreeSet::new(),
            ai: false,
            personality: None,
            personality_hidden: false,
            grudges: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.influences.is_empty()
    }

    pub fn holds(&self, influence: Influence) -> bool {
        self.influences.contains(&influence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub action: ActionKind,
    pub target_player: Option<String>,
    pub pending_players: BTreeSet<String>,
    #[serde(default)]
    pub claim_confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChallenge {
    pub source_player: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBlock {
    pub source_player: String,
    pub claimed_influence: Influence,
    pub pending_players: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfluenceLoss {
    /// Exchange returns cards to the deck instead of killing them.
    pub put_back_in_deck: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetGameRequest {
    pub player: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRound {
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub event_log_retention_turns: u32,
    pub allow_revive: bool,
    pub speed_round: Option<SpeedRound>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            event_log_retention_turns: 3,
            allow_revive: false,
            speed_round: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PlayerJoined,
    PlayerRemoved,
    GameStarted,
    ChoseAction,
    PassedAction,
    ChallengedAction,
    BlockedAction,
    RevealedInfluence,
    ChallengeFailed,
    ChallengeSucceeded,
    PassedBlock,
    ChallengedBlock,
    BlockSucceeded,
    ResolvedAction,
    LostInfluence,
    ReturnedInfluence,
    PlayerEliminated,
    PlayerForfeited,
    ResetRequested,
    ResetCancelled,
    GameReset,
    SettingsUpdated,
    TurnAdvanced,
}

/// Typed game event; the transport renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub turn: u32,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub from: String,
    pub text: String,
    pub timestamp: u64,
    #[serde(default)]
    pub deleted: bool,
    /// emoji -> players who reacted
    #[serde(default)]
    pub emojis: BTreeMap<String, BTreeSet<String>>,
}

/// Authoritative per-room aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub room_id: String,
    pub deck: Vec<Influence>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub turn_player: Option<String>,
    pub turn: u32,
    pub is_started: bool,
    #[serde(default)]
    pub pending_action: Option<PendingAction>,
    #[serde(default)]
    pub pending_action_challenge: Option<PendingChallenge>,
    #[serde(default)]
    pub pending_block: Option<PendingBlock>,
    #[serde(default)]
    pub pending_block_challenge: Option<PendingChallenge>,
    #[serde(default)]
    pub pending_influence_loss: BTreeMap<String, Vec<PendingInfluenceLoss>>,
    #[serde(default)]
    pub reset_game_request: Option<ResetGameRequest>,
    /// The turn already moved on while losses from the previous turn were
    /// still owed; paying them must not advance it again.
    #[serde(default)]
    pub turn_advanced_early: bool,
    #[serde(default)]
    pub event_logs: Vec<Event>,
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    #[serde(default)]
    pub last_event_timestamp: u64,
    #[serde(default)]
    pub settings: GameSettings,
}

/// Resolution phase derived from the pending fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Lobby,
    Idle,
    ActionPending,
    ActionChallengePending,
    BlockPending,
    BlockChallengePending,
    InfluenceLossPending,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResponse {
    Pass,
    Challenge,
    Block(Influence),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockResponse {
    Pass,
    Challenge,
}

/// A player-issued command. Humans and AI go through the same pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    JoinGame,
    AddAiPlayer {
        name: String,
        personality: AiPersonality,
        personality_hidden: bool,
    },
    RemovePlayer { target: String },
    StartGame,
    ChooseAction {
        action: ActionKind,
        target: Option<String>,
    },
    ActionResponse(ActionResponse),
    ActionChallengeResponse(Influence),
    BlockResponse(BlockResponse),
    BlockChallengeResponse(Influence),
    LoseInfluences(Vec<Influence>),
    RequestReset,
    CancelReset,
    ResetGame,
    Forfeit { replace_with_ai: bool },
    UpdateSettings(GameSettings),
    SendChatMessage { id: String, text: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::JoinGame => "join_game",
            Command::AddAiPlayer { .. } => "add_ai_player",
            Command::RemovePlayer { .. } => "remove_player",
            Command::StartGame => "start_game",
            Command::ChooseAction { .. } => "choose_action",
            Command::ActionResponse(_) => "action_response",
            Command::ActionChallengeResponse(_) => "action_challenge_response",
            Command::BlockResponse(_) => "block_response",
            Command::BlockChallengeResponse(_) => "block_challenge_response",
            Command::LoseInfluences(_) => "lose_influences",
            Command::RequestReset => "request_reset",
            Command::CancelReset => "cancel_reset",
            Command::ResetGame => "reset_game",
            Command::Forfeit { .. } => "forfeit",
            Command::UpdateSettings(_) => "update_settings",
            Command::SendChatMessage { .. } => "send_chat_message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table_covers_every_action() {
        for action in ALL_ACTIONS {
            let _ = action.rule();
        }
        assert_eq!(ActionKind::Assassinate.rule().coins_required, 3);
        assert_eq!(ActionKind::Coup.rule().coins_required, 7);
        assert_eq!(ActionKind::Revive.rule().coins_required, 10);
        assert!(!ActionKind::Income.rule().challengeable());
        assert!(!ActionKind::Coup.rule().blockable());
        assert!(ActionKind::Steal.rule().blocked_by.contains(&Influence::Ambassador));
        assert!(ActionKind::ForeignAid.rule().blockable());
        assert!(!ActionKind::ForeignAid.rule().challengeable());
    }

    #[test]
    fn test_copies_scale_with_players() {
        assert_eq!(copies_per_influence(2), 3);
        assert_eq!(copies_per_influence(6), 3);
        assert_eq!(copies_per_influence(7), 4);
        assert_eq!(copies_per_influence(8), 4);
        assert_eq!(copies_per_influence(9), 5);
        assert_eq!(copies_per_influence(12), 5);
    }
}
