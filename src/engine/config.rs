//! Engine configuration, loaded from TOML at startup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::games::coup::types::GameSettings;

/// Largest roster that still leaves two deck cards for an Exchange.
pub const HARD_MAX_PLAYERS: usize = 10;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub max_players: usize,
    pub min_players: usize,
    /// Room lifetime, renewed on every committed change.
    pub state_ttl_secs: u64,
    /// Attempts at finding an unused room code before giving up.
    pub room_id_attempts: usize,
    pub default_settings: GameSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_players: HARD_MAX_PLAYERS,
            min_players: 2,
            state_ttl_secs: 7 * 24 * 60 * 60,
            room_id_attempts: 10,
            default_settings: GameSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    /// Clamp values the rules cannot honour.
    pub fn normalized(mut self) -> Self {
        self.max_players = self.max_players.clamp(2, HARD_MAX_PLAYERS);
        self.min_players = self.min_players.clamp(2, self.max_players);
        self.room_id_attempts = self.room_id_attempts.max(1);
        self.default_settings.event_log_retention_turns =
            self.default_settings.event_log_retention_turns.max(1);
        self
    }
}

/// Load config from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<EngineConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let config: EngineConfig =
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    Ok(config.normalized())
}

/// Try well-known paths, falling back to defaults.
pub fn load_default_config() -> EngineConfig {
    let candidates = ["coup_engine.toml", "../coup_engine.toml", "/etc/coup/coup_engine.toml"];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), max_players = config.max_players, "loaded engine config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load engine config");
                }
            }
        }
    }
    tracing::info!("no coup_engine.toml found, using built-in defaults");
    EngineConfig::default()
}
