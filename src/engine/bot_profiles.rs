//! Named bot profiles: AI personalities plus the strategy that drives them.
//! Loaded from TOML at runtime for the arena CLI and the demo binary.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::engine::bot_strategy::{
    AlwaysBluff, BluffSource, BotStrategy, HeuristicStrategy, NeverBluff, RandomBluff,
    RandomStrategy,
};
use crate::games::coup::types::AiPersonality;

/// A named bot profile.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BotProfile {
    pub description: Option<String>,
    /// "heuristic" (default) or "random".
    #[serde(default = "default_strategy_type")]
    pub strategy_type: String,
    /// "random" (default), "never" or "always". Heuristic strategy only.
    #[serde(default = "default_bluff")]
    pub bluff: String,

    // Personality traits, 0..=100 (defaults from AiPersonality::default())
    pub vengefulness: Option<u8>,
    pub honesty: Option<u8>,
    pub skepticism: Option<u8>,
    #[serde(default)]
    pub personality_hidden: bool,
}

fn default_strategy_type() -> String {
    "heuristic".into()
}

fn default_bluff() -> String {
    "random".into()
}

/// Maps difficulty tiers to profile names.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ProductionConfig {
    pub easy: Option<String>,
    pub medium: Option<String>,
    pub hard: Option<String>,
    pub default: Option<String>,
}

/// Top-level TOML file structure.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BotProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, BotProfile>,
    #[serde(default)]
    pub production: ProductionConfig,
}

impl BotProfile {
    fn preset(description: &str, vengefulness: u8, honesty: u8, skepticism: u8) -> Self {
        Self {
            description: Some(description.into()),
            strategy_type: default_strategy_type(),
            bluff: default_bluff(),
            vengefulness: Some(vengefulness),
            honesty: Some(honesty),
            skepticism: Some(skepticism),
            personality_hidden: false,
        }
    }

    /// Personality with defaults for any unspecified trait.
    pub fn to_personality(&self) -> AiPersonality {
        let d = AiPersonality::default();
        AiPersonality {
            vengefulness: self.vengefulness.unwrap_or(d.vengefulness).min(100),
            honesty: self.honesty.unwrap_or(d.honesty).min(100),
            skepticism: self.skepticism.unwrap_or(d.skepticism).min(100),
        }
    }

    /// Instantiate the strategy this profile describes.
    pub fn build_strategy(&self, seed: u64) -> Box<dyn BotStrategy> {
        if self.strategy_type == "random" {
            return Box::new(RandomStrategy::new(seed));
        }
        let bluff: Box<dyn BluffSource> = match self.bluff.as_str() {
            "never" => Box::new(NeverBluff),
            "always" => Box::new(AlwaysBluff),
            _ => Box::new(RandomBluff::new(seed)),
        };
        Box::new(HeuristicStrategy::new(bluff))
    }
}

/// Presets used when no profiles file is found.
pub static BUILTIN_PROFILES: Lazy<BotProfilesFile> = Lazy::new(|| {
    let mut profiles = HashMap::new();
    profiles.insert("honest".to_string(), BotProfile::preset("Rarely bluffs, slow to anger", 20, 90, 30));
    profiles.insert("balanced".to_string(), BotProfile::preset("Default temperament", 50, 50, 50));
    profiles.insert("cunning".to_string(), BotProfile::preset("Bluffs often, challenges often", 60, 20, 80));
    profiles.insert("vengeful".to_string(), BotProfile::preset("Goes after whoever crossed it", 100, 50, 60));
    profiles.insert(
        "random".to_string(),
        BotProfile {
            strategy_type: "random".into(),
            ..BotProfile::preset("Uniformly random legal moves", 50, 50, 50)
        },
    );
    BotProfilesFile {
        profiles,
        production: ProductionConfig {
            easy: Some("honest".into()),
            medium: Some("balanced".into()),
            hard: Some("cunning".into()),
            default: Some("balanced".into()),
        },
    }
});

/// Load profiles from a TOML file at the given path.
pub fn load_profiles(path: &Path) -> Result<BotProfilesFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

/// Try to load profiles from well-known paths, returning the built-in presets
/// if none found.
pub fn load_default_profiles() -> BotProfilesFile {
    let candidates = [
        "bot_profiles.toml",
        "../bot_profiles.toml",
        "/etc/coup/bot_profiles.toml",
    ];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_profiles(p) {
                Ok(profiles) => {
                    tracing::info!(path = %p.display(), count = profiles.profiles.len(), "loaded bot profiles");
                    return profiles;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load bot profiles");
                }
            }
        }
    }
    tracing::info!("no bot_profiles.toml found, using built-in presets");
    (*BUILTIN_PROFILES).clone()
}

impl ProductionConfig {
    /// Resolve a production difficulty tier to a profile name.
    pub fn resolve(&self, difficulty: &str) -> Option<&str> {
        match difficulty {
            "easy" => self.easy.as_deref(),
            "medium" => self.medium.as_deref(),
            "hard" => self.hard.as_deref(),
            _ => self.default.as_deref(),
        }
    }
}

impl BotProfilesFile {
    /// Look up a profile by name or by difficulty tier.
    pub fn find(&self, name_or_tier: &str) -> Option<&BotProfile> {
        self.profiles.get(name_or_tier).or_else(|| {
            self.production
                .resolve(name_or_tier)
                .and_then(|name| self.profiles.get(name))
        })
    }
}
