//! Criterion benchmarks for the per-move hot path: AI decisions, legal move
//! enumeration, the public projection and the snapshot codec.
//!
//! Run with:
//!     cargo bench --bench ai_decisions

use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use coup_game_engine::engine::bot_strategy::{BotStrategy, HeuristicStrategy, NeverBluff};
use coup_game_engine::engine::codec::{dehydrate, rehydrate};
use coup_game_engine::engine::config::EngineConfig;
use coup_game_engine::engine::simulator::{next_mover, step};
use coup_game_engine::games::coup::ai::next_ai_command;
use coup_game_engine::games::coup::rules::{apply_command, legal_commands};
use coup_game_engine::games::coup::types::{AiPersonality, Command, GameSettings, GameState};
use coup_game_engine::games::coup::validator::validate_state;
use coup_game_engine::games::coup::view::public_view;

struct Fixture {
    label: String,
    state: GameState,
    mover: String,
}

fn strategies(names: &[String]) -> HashMap<String, Box<dyn BotStrategy>> {
    names
        .iter()
        .map(|n| {
            let s: Box<dyn BotStrategy> = Box::new(HeuristicStrategy::new(Box::new(NeverBluff)));
            (n.clone(), s)
        })
        .collect()
}

/// An all-AI table of `players` seats, a few moves into the game.
fn fixture(players: usize, warmup_moves: usize) -> Fixture {
    let config = EngineConfig::default();
    let mut rng = StdRng::seed_from_u64(players as u64);
    let names: Vec<String> = (0..players).map(|i| format!("bot{}", i)).collect();
    let mut state = GameState::new("BENCH0", &names[0], GameSettings::default(), &mut rng);
    for name in &names[1..] {
        let cmd = Command::AddAiPlayer {
            name: name.clone(),
            personality: AiPersonality::default(),
            personality_hidden: false,
        };
        apply_command(&mut state, &names[0], &cmd, &config, &mut rng).expect("seat bot");
    }
    state.players[0].ai = true;
    state.players[0].personality = Some(AiPersonality::default());
    apply_command(&mut state, &names[0], &Command::StartGame, &config, &mut rng).expect("start");

    let strategies = strategies(&names);
    for _ in 0..warmup_moves {
        if state.is_game_over() {
            break;
        }
        if step(&mut state, &strategies, &config, &mut rng).expect("warmup move").is_none() {
            break;
        }
    }
    let mover = next_mover(&state, &strategies, &config)
        .map(|(name, _)| name)
        .unwrap_or_else(|| names[0].clone());
    Fixture {
        label: format!("{}p", players),
        state,
        mover,
    }
}

fn fixtures() -> Vec<Fixture> {
    [2, 6, 10].into_iter().map(|n| fixture(n, 3 * n)).collect()
}

fn bench_next_ai_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_ai_command");
    for f in &fixtures() {
        let view = public_view(&f.state, Some(&f.mover));
        let me = f.state.player(&f.mover).expect("mover seated").clone();
        group.bench_with_input(BenchmarkId::new("heuristic", &f.label), &view, |b, view| {
            b.iter(|| next_ai_command(view, &me, &NeverBluff));
        });
    }
    group.finish();
}

fn bench_legal_commands(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("legal_commands");
    for f in &fixtures() {
        group.bench_with_input(BenchmarkId::new("mover", &f.label), f, |b, f| {
            b.iter(|| legal_commands(&f.state, &f.mover, &config));
        });
    }
    group.finish();
}

fn bench_public_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("public_view");
    for f in &fixtures() {
        group.bench_with_input(BenchmarkId::new("player", &f.label), f, |b, f| {
            b.iter(|| public_view(&f.state, Some(&f.mover)));
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    for f in &fixtures() {
        let bytes = dehydrate(&f.state).expect("dehydrate");
        group.bench_with_input(BenchmarkId::new("dehydrate", &f.label), &f.state, |b, s| {
            b.iter(|| dehydrate(s));
        });
        group.bench_with_input(BenchmarkId::new("rehydrate", &f.label), &bytes, |b, raw| {
            b.iter(|| rehydrate::<GameState>(raw));
        });
        group.bench_with_input(BenchmarkId::new("validate", &f.label), &f.state, |b, s| {
            b.iter(|| validate_state(s, 10));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_next_ai_command,
    bench_legal_commands,
    bench_public_view,
    bench_codec,
);
criterion_main!(benches);
