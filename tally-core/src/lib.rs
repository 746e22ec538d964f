// src/lib.rs

pub mod config;
pub mod db;
pub mod engine;
pub mod eventbus;
pub mod repositories;
pub mod services;
pub mod test_utils;
pub mod triggers;

pub use config::EngineConfig;
pub use db::Database;
pub use engine::{Repositories, RewardEngine};
pub use tally_common::error::Error;
