use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use coup_game_engine::engine::bot_profiles::{load_default_profiles, load_profiles};
use coup_game_engine::engine::config::{load_config, load_default_config};
use coup_game_engine::engine::simulator::drive_ai;
use coup_game_engine::engine::store::MemoryStore;
use coup_game_engine::server::GameServer;

#[derive(Parser)]
#[command(name = "coup-engine", about = "Play an all-AI Coup game against the in-memory store")]
struct Cli {
    /// Profile name or difficulty tier for each AI seat (repeatable)
    #[arg(long = "bot", default_values_t = vec!["honest".to_string(), "balanced".to_string(), "cunning".to_string()])]
    bots: Vec<String>,

    /// Name of the seat that opens the room and hands over to an AI
    #[arg(long, default_value = "Host")]
    host: String,

    /// Enable the Revive action
    #[arg(long)]
    allow_revive: bool,

    /// Give up after this many AI moves
    #[arg(long, default_value = "5000")]
    max_moves: usize,

    /// Print the final spectator view as JSON
    #[arg(long)]
    json: bool,

    /// Path to bot_profiles.toml (default: auto-discover)
    #[arg(long, env = "COUP_BOT_PROFILES")]
    profiles: Option<PathBuf>,

    /// Path to coup_engine.toml (default: auto-discover)
    #[arg(long, env = "COUP_ENGINE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let profiles = match &cli.profiles {
        Some(path) => load_profiles(path).map_err(|e| format!("Failed to load profiles: {}", e))?,
        None => load_default_profiles(),
    };
    let config = match &cli.config {
        Some(path) => load_config(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => load_default_config(),
    };

    let mut server = GameServer::new(Arc::new(MemoryStore::new()), config);
    let mut seats = Vec::new();
    for (i, bot) in cli.bots.iter().enumerate() {
        let profile = profiles
            .find(bot)
            .ok_or_else(|| format!("unknown bot profile '{}'", bot))?;
        let name = format!("{}-{}", bot, i + 1);
        server = server.with_bot(name.clone(), Arc::from(profile.build_strategy(i as u64 + 1)));
        seats.push((name, profile.clone()));
    }

    let mut settings = server.config().default_settings.clone();
    settings.allow_revive |= cli.allow_revive;
    let room = server.create_game(&cli.host, Some(settings)).await?;
    let room_id = room.room_id.clone();
    tracing::info!(room_id = %room_id, "room opened");

    for (name, profile) in &seats {
        server
            .add_ai_player(&room_id, &cli.host, name, profile.to_personality(), profile.personality_hidden)
            .await?;
    }
    server.start_game(&room_id, &cli.host).await?;
    server.forfeit(&room_id, &cli.host, true).await?;

    let moves = drive_ai(&server, &room_id, cli.max_moves).await?;
    let view = server.public_state(&room_id, None).await?;

    let winner = view
        .living_players()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>();
    if view.is_game_over() {
        tracing::info!(room_id = %room_id, moves, turns = view.turn, winner = ?winner.first(), "game over");
    } else {
        tracing::warn!(room_id = %room_id, moves, turns = view.turn, alive = ?winner, "stopped before a winner");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}
