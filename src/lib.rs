//! Coup game engine: rules, AI policy and an optimistic-concurrency room
//! store.

pub mod engine;
pub mod games;
pub mod server;
