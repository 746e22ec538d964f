// src/repositories/memory/mod.rs
//
// DashMap-backed repositories. Each per-key update runs inside the shard
// write guard of its entry, so updates to one key are serialized while
// different keys proceed in parallel.

pub mod activities;
pub mod rewards;
pub mod user_rewards;

pub use activities::InMemoryRewardActivityRepository;
pub use rewards::InMemoryRewardTemplateRepository;
pub use user_rewards::InMemoryUserRewardsRepository;
