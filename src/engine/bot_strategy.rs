//! Bot strategy trait and implementations, plus the bluffing hook the
//! heuristic policy consults.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::games::coup::ai::next_ai_command;
use crate::games::coup::types::{Command, Player};
use crate::games::coup::view::PublicGameState;

/// Source of the one random choice in the heuristic policy: whether to claim
/// an influence the AI does not hold.
pub trait BluffSource: Send + Sync {
    /// `honesty` is 0..=100; higher means less likely to bluff.
    fn decide_to_bluff(&self, honesty: u8) -> bool;
}

/// Bluffs with probability `(100 - honesty) / 100`.
pub struct RandomBluff {
    rng: Mutex<StdRng>,
}

impl RandomBluff {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl BluffSource for RandomBluff {
    fn decide_to_bluff(&self, honesty: u8) -> bool {
        let chance = f64::from(100u8.saturating_sub(honesty.min(100))) / 100.0;
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(chance),
            Err(_) => false,
        }
    }
}

pub struct NeverBluff;

impl BluffSource for NeverBluff {
    fn decide_to_bluff(&self, _honesty: u8) -> bool {
        false
    }
}

pub struct AlwaysBluff;

impl BluffSource for AlwaysBluff {
    fn decide_to_bluff(&self, _honesty: u8) -> bool {
        true
    }
}

/// A bot strategy picks the next command for an AI seat.
///
/// `legal` lists every in-game command the rules currently accept from this
/// seat; strategies that reason on their own may ignore it.
pub trait BotStrategy: Send + Sync {
    fn choose_command(
        &self,
        view: &PublicGameState,
        me: &Player,
        legal: &[Command],
    ) -> Option<Command>;
}

/// Picks a uniformly random legal command.
pub struct RandomStrategy {
    rng: Mutex<StdRng>,
}

impl RandomStrategy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl BotStrategy for RandomStrategy {
    fn choose_command(
        &self,
        _view: &PublicGameState,
        _me: &Player,
        legal: &[Command],
    ) -> Option<Command> {
        let mut rng = self.rng.lock().ok()?;
        legal.choose(&mut *rng).cloned()
    }
}

/// The card-counting heuristic policy with a pluggable bluff source.
pub struct HeuristicStrategy {
    pub bluff: Box<dyn BluffSource>,
}

impl HeuristicStrategy {
    pub fn new(bluff: Box<dyn BluffSource>) -> Self {
        Self { bluff }
    }
}

impl BotStrategy for HeuristicStrategy {
    fn choose_command(
        &self,
        view: &PublicGameState,
        me: &Player,
        _legal: &[Command],
    ) -> Option<Command> {
        next_ai_command(view, me, self.bluff.as_ref())
    }
}
