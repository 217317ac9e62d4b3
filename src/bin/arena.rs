//! Arena CLI: run bot-vs-bot experiments from the command line.
//!
//! Usage:
//!   cargo run --release --bin arena -- --games 200 --seat honest --seat cunning --seat random
//!   cargo run --release --bin arena -- --games 50 --seat easy --seat hard --allow-revive

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use coup_game_engine::engine::arena::{run_arena, ArenaConfig};
use coup_game_engine::engine::bot_profiles::{
    load_default_profiles, load_profiles, BotProfile, BotProfilesFile,
};
use coup_game_engine::engine::config::{load_config, load_default_config, HARD_MAX_PLAYERS};
use coup_game_engine::games::coup::types::GameSettings;

#[derive(Parser)]
#[command(name = "arena", about = "Run bot-vs-bot arena experiments for Coup")]
struct Cli {
    /// Number of games to play
    #[arg(long, default_value = "100")]
    games: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Alternate seat positions between games
    #[arg(long, default_value = "true")]
    alternate_seats: bool,

    /// Moves before an unfinished game is scored as a draw
    #[arg(long, default_value = "2000")]
    max_moves: usize,

    /// Enable the Revive action
    #[arg(long)]
    allow_revive: bool,

    /// Path to bot_profiles.toml
    #[arg(long, env = "COUP_BOT_PROFILES")]
    profiles: Option<PathBuf>,

    /// Path to coup_engine.toml
    #[arg(long, env = "COUP_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Profile name or difficulty tier for each seat (repeatable)
    #[arg(long = "seat", default_values_t = vec!["honest".to_string(), "cunning".to_string()])]
    seats: Vec<String>,
}

/// Resolve seats to profiles, suffixing repeated names so every seat is unique.
fn build_seats(requested: &[String], profiles: &BotProfilesFile) -> Result<Vec<(String, BotProfile)>, String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut seats = Vec::with_capacity(requested.len());
    for name in requested {
        let profile = profiles.find(name).ok_or_else(|| {
            let mut available: Vec<&String> = profiles.profiles.keys().collect();
            available.sort();
            format!("profile '{}' not found; available: {:?}", name, available)
        })?;
        let count = seen.entry(name.as_str()).or_insert(0);
        *count += 1;
        let seat_name = if *count == 1 {
            name.clone()
        } else {
            format!("{}-{}", name, count)
        };
        seats.push((seat_name, profile.clone()));
    }
    Ok(seats)
}

fn print_seat(name: &str, profile: &BotProfile) {
    let traits = profile.to_personality();
    eprintln!(
        "  {}: type={}, bluff={}, vengefulness={}, honesty={}, skepticism={}",
        name,
        profile.strategy_type,
        profile.bluff,
        traits.vengefulness,
        traits.honesty,
        traits.skepticism,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let profiles = match &cli.profiles {
        Some(path) => load_profiles(path).map_err(|e| format!("Error loading profiles: {}", e))?,
        None => load_default_profiles(),
    };
    let config = match &cli.config {
        Some(path) => load_config(path).map_err(|e| format!("Error loading config: {}", e))?,
        None => load_default_config(),
    };

    if cli.seats.len() < 2 || cli.seats.len() > HARD_MAX_PLAYERS {
        return Err(format!("need between 2 and {} seats, got {}", HARD_MAX_PLAYERS, cli.seats.len()).into());
    }
    let seats = build_seats(&cli.seats, &profiles)?;

    eprintln!(
        "Arena: {} games, seed={}, alternate_seats={}, revive={}",
        cli.games, cli.seed, cli.alternate_seats, cli.allow_revive
    );
    for (name, profile) in &seats {
        print_seat(name, profile);
    }
    eprintln!();

    let arena = ArenaConfig {
        num_games: cli.games,
        base_seed: cli.seed,
        alternate_seats: cli.alternate_seats,
        max_moves: cli.max_moves,
        settings: GameSettings {
            allow_revive: cli.allow_revive,
            ..GameSettings::default()
        },
    };

    let total = cli.games;
    let progress: Arc<dyn Fn(usize, usize) + Send + Sync> = Arc::new(move |done: usize, _total: usize| {
        eprint!("\r  [{}/{}] games completed", done, total);
    });

    let result = run_arena(seats, arena, config, Some(progress)).await;

    eprintln!("\r                                    ");
    println!("{}", result.summary());
    Ok(())
}
