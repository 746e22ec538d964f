// File: tally-common/src/models/badge.rs

use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier of a badge owned by the external badge evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeId(pub Uuid);

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BadgeId {
    fn from(id: Uuid) -> Self {
        BadgeId(id)
    }
}

/// Keys under which a populated badge record carries its id.
const RECORD_ID_KEYS: [&str; 4] = ["id", "_id", "badge_id", "badgeId"];

/// Normalizes a badge reference as it arrives from upstream records.
///
/// Accepted shapes:
///  - a raw id / id string: `"6f1c…"`
///  - a populated record: `{"id": "6f1c…", "name": "Helper"}` (also `_id`, `badge_id`)
///
/// Anything else (empty strings, names, numbers) resolves to `None` and is
/// skipped by callers.
pub fn normalize_badge_ref(value: &Value) -> Option<BadgeId> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim()).ok().map(BadgeId),
        Value::Object(map) => RECORD_ID_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(normalize_badge_ref),
        _ => None,
    }
}

/// `deserialize_with` helper so models only ever hold `Option<BadgeId>`.
pub fn deserialize_badge_ref<'de, D>(deserializer: D) -> Result<Option<BadgeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(normalize_badge_ref))
}
