//! Coup: the rules, the public view and the heuristic AI.

pub mod ai;
pub mod deck;
pub mod evaluator;
pub mod plugin;
pub mod rules;
pub mod state;
pub mod types;
pub mod validator;
pub mod view;
