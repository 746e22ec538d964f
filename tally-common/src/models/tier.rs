// File: tally-common/src/models/tier.rs
//
// Pure tier calculator. No I/O; safe to call from repositories and services.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// (tier, inclusive floor) in ascending order.
const TIER_FLOORS: [(Tier, i64); 4] = [
    (Tier::Bronze, 0),
    (Tier::Silver, 500),
    (Tier::Gold, 1500),
    (Tier::Platinum, 5000),
];

impl Tier {
    pub fn floor(self) -> i64 {
        TIER_FLOORS
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, f)| *f)
            .unwrap_or(0)
    }

    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Bronze => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Gold),
            Tier::Gold => Some(Tier::Platinum),
            Tier::Platinum => None,
        }
    }

    pub fn for_points(total: i64) -> Tier {
        TIER_FLOORS
            .iter()
            .rev()
            .find(|(_, floor)| total >= *floor)
            .map(|(t, _)| *t)
            .unwrap_or(Tier::Bronze)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bronze" => Ok(Tier::Bronze),
            "silver" => Ok(Tier::Silver),
            "gold" => Ok(Tier::Gold),
            "platinum" => Ok(Tier::Platinum),
            other => Err(Error::Parse(format!("Unknown tier '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierInfo {
    pub current_tier: Tier,
    /// Points above the current tier's floor.
    pub tier_points: i64,
    pub next_tier: Option<Tier>,
    pub points_to_next_tier: Option<i64>,
    /// Always within `[0, 100]`; 100 for the top tier.
    pub progress_percentage: u8,
}

/// Maps a lifetime point total to its tier band. Negative totals are treated
/// as zero.
pub fn tier_info(total_points: i64) -> TierInfo {
    let total = total_points.max(0);
    let current = Tier::for_points(total);
    let tier_points = total - current.floor();

    match current.next() {
        Some(next) => {
            let span = next.floor() - current.floor();
            let pct = (tier_points.saturating_mul(100) / span).clamp(0, 100);
            TierInfo {
                current_tier: current,
                tier_points,
                next_tier: Some(next),
                points_to_next_tier: Some(next.floor() - total),
                progress_percentage: pct as u8,
            }
        }
        None => TierInfo {
            current_tier: current,
            tier_points,
            next_tier: None,
            points_to_next_tier: None,
            progress_percentage: 100,
        },
    }
}
