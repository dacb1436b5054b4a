//! Webhook-style action registrations (`/settings/actions`).
//!
//! Registrations are stored under the `actions` key as
//! `{<name>: [{index, enabled, urls}, ...]}`, one entry per index.

use crate::device::StateStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const ACTIONS_KEY: &str = "actions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub index: u64,
    pub enabled: bool,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Insert or replace the registration `(index, name)` and return every
/// registration under `name`.
pub fn register(store: &StateStore, device: &str, name: &str, entry: ActionEntry) -> Value {
    store.set(device, ACTIONS_KEY, |state| {
        let mut list: Vec<ActionEntry> = state
            .get(name)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        match list.iter_mut().find(|existing| existing.index == entry.index) {
            Some(existing) => *existing = entry,
            None => list.push(entry),
        }
        list.sort_by_key(|existing| existing.index);

        let list = serde_json::to_value(&list).unwrap_or_else(|_| json!([]));
        state.insert(name, list.clone());

        let mut registered = Map::new();
        registered.insert(name.to_string(), list);
        json!({ "actions": registered })
    })
}

/// Every stored registration.
pub fn list(store: &StateStore, device: &str) -> Value {
    json!({ "actions": store.read(device, ACTIONS_KEY).as_value() })
}
