//! tally-cli/src/input.rs
//!
//! Reads hand-written JSON files. Template files may leave out ids,
//! timestamps and `is_active`; those are filled in before parsing.

use std::fs;
use std::path::Path;
use anyhow::{bail, Context};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;
use tally_common::models::{EngagementEvent, RewardTemplate};

/// Accepts a single object or an array of objects.
fn read_list(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => bail!("{}: expected an object or an array, got {}", path.display(), other),
    }
}

fn parse_all<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> anyhow::Result<Vec<T>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| serde_json::from_value(v).with_context(|| format!("{} #{}", what, i + 1)))
        .collect()
}

fn fill_template_defaults(value: &mut Value) {
    let now = Utc::now();
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    obj.entry("reward_id").or_insert_with(|| json!(Uuid::new_v4()));
    obj.entry("is_active").or_insert(json!(true));
    obj.entry("created_at").or_insert_with(|| json!(now));
    obj.entry("updated_at").or_insert_with(|| json!(now));

    if let Some(Value::Array(tasks)) = obj.get_mut("tasks") {
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            task.entry("task_id").or_insert_with(|| json!(Uuid::new_v4()));
            task.entry("is_automated").or_insert(json!(true));
        }
    }
}

pub fn load_templates(path: &Path) -> anyhow::Result<Vec<RewardTemplate>> {
    let mut items = read_list(path)?;
    items.iter_mut().for_each(fill_template_defaults);
    parse_all(items, "reward template")
}

pub fn load_events(path: &Path) -> anyhow::Result<Vec<EngagementEvent>> {
    parse_all(read_list(path)?, "event")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::models::ActionType;

    #[test]
    fn test_template_defaults_are_filled() {
        let mut value = json!({
            "name": "Helper",
            "points": 50,
            "tasks": [{ "title": "Post twice", "action_type": "community_post", "target_value": 2 }]
        });
        fill_template_defaults(&mut value);

        let template: RewardTemplate = serde_json::from_value(value).unwrap();
        assert!(template.is_active);
        assert_eq!(template.tasks.len(), 1);
        assert!(template.tasks[0].is_automated);
        assert_eq!(template.tasks[0].action_type, Some(ActionType::CommunityPost));
    }

    #[test]
    fn test_explicit_fields_are_kept() {
        let id = Uuid::new_v4();
        let mut value = json!({ "reward_id": id, "name": "Paused", "is_active": false });
        fill_template_defaults(&mut value);

        let template: RewardTemplate = serde_json::from_value(value).unwrap();
        assert_eq!(template.reward_id, id);
        assert!(!template.is_active);
    }

    #[test]
    fn test_events_parse_from_array() {
        let items = vec![
            json!({ "type": "job_posted", "user_id": Uuid::new_v4(), "tenant_id": null, "job_id": Uuid::new_v4() }),
            json!({ "type": "profile_updated", "user_id": Uuid::new_v4(), "tenant_id": null, "completeness": 100 }),
        ];
        let events: Vec<EngagementEvent> = parse_all(items, "event").unwrap();
        assert_eq!(events[0].action_type(), ActionType::JobPost);
        assert_eq!(events[1].action_type(), ActionType::ProfileCompletion);
    }
}
