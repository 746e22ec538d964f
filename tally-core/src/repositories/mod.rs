// src/repositories/mod.rs
//
// Storage backends for the reward engine. Both implement the traits in
// `tally_common::traits::repository_traits`.

pub mod memory;
pub mod postgres;

pub use memory::{
    InMemoryRewardActivityRepository, InMemoryRewardTemplateRepository,
    InMemoryUserRewardsRepository,
};
pub use postgres::{
    PostgresRewardActivityRepository, PostgresRewardTemplateRepository,
    PostgresUserRewardsRepository,
};
