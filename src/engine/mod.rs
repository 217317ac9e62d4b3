pub mod arena;
pub mod bot_profiles;
pub mod bot_strategy;
pub mod codec;
pub mod config;
pub mod error;
pub mod mutation;
pub mod plugin;
pub mod room_id;
pub mod simulator;
pub mod store;
