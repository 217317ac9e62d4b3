//! Bot-vs-bot arena runner.
//!
//! Each game seats one AI per profile, plays it out in memory and records
//! who survived. Games run concurrently on tokio's blocking pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinSet;

use crate::engine::bot_profiles::BotProfile;
use crate::engine::bot_strategy::BotStrategy;
use crate::engine::config::EngineConfig;
use crate::engine::error::GameResult;
use crate::engine::simulator::{play_out, Playout};
use crate::games::coup::rules::apply_command;
use crate::games::coup::types::{Command, GameSettings, GameState};

/// Knobs for one arena run.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub num_games: usize,
    pub base_seed: u64,
    /// Rotate seat order between games.
    pub alternate_seats: bool,
    /// Moves after which an unfinished game counts as a draw.
    pub max_moves: usize,
    pub settings: GameSettings,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            num_games: 100,
            base_seed: 42,
            alternate_seats: true,
            max_moves: 2_000,
            settings: GameSettings::default(),
        }
    }
}

/// Aggregated results from an arena run.
pub struct ArenaResult {
    pub num_games: usize,
    pub wins: HashMap<String, usize>,
    pub draws: usize,
    /// Influences each seat still held when its game ended.
    pub total_scores: HashMap<String, Vec<f64>>,
    pub game_durations_ms: Vec<f64>,
    pub game_turns: Vec<u32>,
    pub fallbacks: usize,
}

impl ArenaResult {
    fn new(names: &[String], num_games: usize) -> Self {
        Self {
            num_games,
            wins: names.iter().map(|n| (n.clone(), 0)).collect(),
            draws: 0,
            total_scores: names.iter().map(|n| (n.clone(), Vec::new())).collect(),
            game_durations_ms: Vec::new(),
            game_turns: Vec::new(),
            fallbacks: 0,
        }
    }

    pub fn win_rate(&self, name: &str) -> f64 {
        *self.wins.get(name).unwrap_or(&0) as f64 / self.num_games.max(1) as f64
    }

    pub fn avg_score(&self, name: &str) -> f64 {
        match self.total_scores.get(name) {
            Some(s) if !s.is_empty() => s.iter().sum::<f64>() / s.len() as f64,
            _ => 0.0,
        }
    }

    pub fn score_stddev(&self, name: &str) -> f64 {
        let scores = match self.total_scores.get(name) {
            Some(s) if s.len() >= 2 => s,
            _ => return 0.0,
        };
        let avg = self.avg_score(name);
        let variance =
            scores.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / (scores.len() - 1) as f64;
        variance.sqrt()
    }

    /// Wilson score interval on the win rate.
    pub fn confidence_interval_95(&self, name: &str) -> (f64, f64) {
        let n = self.num_games;
        if n == 0 {
            return (0.0, 0.0);
        }
        let p = self.win_rate(name);
        let z = 1.96_f64;
        let denom = 1.0 + z * z / n as f64;
        let center = (p + z * z / (2.0 * n as f64)) / denom;
        let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n as f64)) / n as f64).sqrt() / denom;
        ((center - margin).max(0.0), (center + margin).min(1.0))
    }

    pub fn avg_turns(&self) -> f64 {
        if self.game_turns.is_empty() {
            return 0.0;
        }
        self.game_turns.iter().map(|&t| f64::from(t)).sum::<f64>() / self.game_turns.len() as f64
    }

    pub fn summary(&self) -> String {
        let mut names: Vec<&String> = self.wins.keys().collect();
        names.sort();
        let mut lines = vec![format!("Arena Results ({} games)", self.num_games)];
        lines.push("=".repeat(60));
        for name in names {
            let wr = self.win_rate(name);
            let (ci_lo, ci_hi) = self.confidence_interval_95(name);
            lines.push(format!(
                "  {:>12}: {:3} wins ({:5.1}%)  [95% CI: {:.1}%-{:.1}%]  cards left={:4.2} +/- {:4.2}",
                name,
                self.wins[name],
                wr * 100.0,
                ci_lo * 100.0,
                ci_hi * 100.0,
                self.avg_score(name),
                self.score_stddev(name),
            ));
        }
        lines.push(format!("  {:>12}: {}", "Draws", self.draws));
        lines.push(format!("  Avg turns: {:.1}  |  Fallbacks: {}", self.avg_turns(), self.fallbacks));
        if !self.game_durations_ms.is_empty() {
            let avg_ms =
                self.game_durations_ms.iter().sum::<f64>() / self.game_durations_ms.len() as f64;
            let total_s = self.game_durations_ms.iter().sum::<f64>() / 1000.0;
            lines.push(format!("  Avg game: {:.1}ms  |  Total: {:.1}s", avg_ms, total_s));
        }
        lines.join("\n")
    }

    fn record(&mut self, game: GameRecord) {
        self.game_durations_ms.push(game.elapsed_ms);
        self.game_turns.push(game.playout.turns);
        self.fallbacks += game.playout.fallbacks;
        match &game.playout.winner {
            Some(winner) => {
                if let Some(wins) = self.wins.get_mut(winner) {
                    *wins += 1;
                }
            }
            None => self.draws += 1,
        }
        for (name, cards) in game.cards_left {
            if let Some(scores) = self.total_scores.get_mut(&name) {
                scores.push(cards as f64);
            }
        }
    }
}

struct GameRecord {
    playout: Playout,
    cards_left: Vec<(String, usize)>,
    elapsed_ms: f64,
}

/// Seat every profile at one table and start the game.
fn seat_table(
    seats: &[(String, BotProfile)],
    settings: &GameSettings,
    config: &EngineConfig,
    rng: &mut StdRng,
) -> GameResult<GameState> {
    let (host, host_profile) = &seats[0];
    let mut state = GameState::new("ARENA0", host, settings.clone(), rng);
    for (name, profile) in &seats[1..] {
        let cmd = Command::AddAiPlayer {
            name: name.clone(),
            personality: profile.to_personality(),
            personality_hidden: profile.personality_hidden,
        };
        apply_command(&mut state, host, &cmd, config, rng)?;
    }
    if let Some(first) = state.players.first_mut() {
        first.ai = true;
        first.personality = Some(host_profile.to_personality());
        first.personality_hidden = host_profile.personality_hidden;
    }
    apply_command(&mut state, host, &Command::StartGame, config, rng)?;
    Ok(state)
}

fn play_one_game(
    seats: &[(String, BotProfile)],
    seed: u64,
    arena: &ArenaConfig,
    config: &EngineConfig,
) -> GameResult<GameRecord> {
    let t0 = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = seat_table(seats, &arena.settings, config, &mut rng)?;
    let strategies: HashMap<String, Box<dyn BotStrategy>> = seats
        .iter()
        .enumerate()
        .map(|(i, (name, profile))| (name.clone(), profile.build_strategy(seed.wrapping_add(i as u64))))
        .collect();

    let playout = play_out(&mut state, &strategies, config, &mut rng, arena.max_moves)?;
    let cards_left = state
        .players
        .iter()
        .map(|p| (p.name.clone(), p.influences.len()))
        .collect();
    Ok(GameRecord {
        playout,
        cards_left,
        elapsed_ms: t0.elapsed().as_secs_f64() * 1000.0,
    })
}

/// Run `arena.num_games` between the given seats and return aggregated stats.
///
/// Seat names must be distinct valid player names. A game that fails with a
/// rules error is logged and counted as a draw.
pub async fn run_arena(
    seats: Vec<(String, BotProfile)>,
    arena: ArenaConfig,
    config: EngineConfig,
    progress: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
) -> ArenaResult {
    let names: Vec<String> = seats.iter().map(|(n, _)| n.clone()).collect();
    let mut result = ArenaResult::new(&names, arena.num_games);
    if seats.len() < 2 {
        tracing::warn!(seats = seats.len(), "arena needs at least two seats");
        return result;
    }

    let seats = Arc::new(seats);
    let arena = Arc::new(arena);
    let config = Arc::new(config.normalized());
    let mut games = JoinSet::new();
    for game_idx in 0..arena.num_games {
        let seats = Arc::clone(&seats);
        let arena = Arc::clone(&arena);
        let config = Arc::clone(&config);
        games.spawn_blocking(move || {
            let mut order: Vec<(String, BotProfile)> = seats.as_ref().clone();
            if arena.alternate_seats {
                let shift = game_idx % order.len();
                order.rotate_left(shift);
            }
            let seed = arena.base_seed.wrapping_add(game_idx as u64);
            (game_idx, play_one_game(&order, seed, &arena, &config))
        });
    }

    let mut completed = 0;
    while let Some(joined) = games.join_next().await {
        completed += 1;
        match joined {
            Ok((_, Ok(record))) => result.record(record),
            Ok((game_idx, Err(e))) => {
                tracing::error!(game = game_idx, error = %e, "arena game failed");
                result.draws += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "arena task panicked");
                result.draws += 1;
            }
        }
        if let Some(cb) = &progress {
            cb(completed, arena.num_games);
        }
    }

    tracing::info!(games = arena.num_games, draws = result.draws, "arena finished");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bot_profiles::BUILTIN_PROFILES;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seat(name: &str) -> (String, BotProfile) {
        (name.to_string(), BUILTIN_PROFILES.profiles[name].clone())
    }

    #[tokio::test]
    async fn test_arena_honest_vs_cunning() {
        let arena = ArenaConfig {
            num_games: 6,
            ..ArenaConfig::default()
        };
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let progress: Arc<dyn Fn(usize, usize) + Send + Sync> = Arc::new(move |done, total| {
            assert!(done <= total);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = run_arena(
            vec![seat("honest"), seat("cunning"), seat("random")],
            arena,
            EngineConfig::default(),
            Some(progress),
        )
        .await;

        assert_eq!(result.num_games, 6);
        let total_outcomes = result.wins.values().sum::<usize>() + result.draws;
        assert_eq!(total_outcomes, 6);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(result.game_durations_ms.len(), result.game_turns.len());
        assert!(result.summary().contains("honest"));
    }

    #[tokio::test]
    async fn test_arena_is_reproducible() {
        let run = || {
            run_arena(
                vec![seat("honest"), seat("balanced")],
                ArenaConfig {
                    num_games: 4,
                    ..ArenaConfig::default()
                },
                EngineConfig::default(),
                None,
            )
        };
        let a = run().await;
        let b = run().await;
        assert_eq!(a.wins, b.wins);
        assert_eq!(a.draws, b.draws);
    }

    #[tokio::test]
    async fn test_single_seat_plays_nothing() {
        let result = run_arena(
            vec![seat("honest")],
            ArenaConfig::default(),
            EngineConfig::default(),
            None,
        )
        .await;
        assert!(result.game_durations_ms.is_empty());
        assert_eq!(result.draws, 0);
    }

    #[test]
    fn test_confidence_interval_bounds() {
        let mut result = ArenaResult::new(&["a".to_string(), "b".to_string()], 10);
        result.wins.insert("a".into(), 7);
        let (lo, hi) = result.confidence_interval_95("a");
        assert!(lo > 0.0 && lo < 0.7);
        assert!(hi > 0.7 && hi <= 1.0);
        assert_eq!(result.win_rate("b"), 0.0);
    }
}
