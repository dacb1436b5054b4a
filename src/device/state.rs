//! Per-device component state.
//!
//! Component state is an open JSON document per component key
//! (`switch:0`, `light:0`, `script:1`, ...). The store owns a deep copy of
//! the fixture state, guarded by one reader/writer lock for the whole
//! simulator instance: reads take the shared side, every mutation takes the
//! exclusive side for its full read-modify-write.

use super::registry::DeviceRegistry;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error as ThisError;
use std::collections::{BTreeMap, HashMap};

/// Build a component key such as `switch:0`.
pub fn component_key(kind: &str, id: u64) -> String {
    format!("{}:{}", kind, id)
}

/// Split a component key into its kind and numeric id, if it has one.
pub fn parse_component_key(key: &str) -> Option<(&str, u64)> {
    let (kind, id) = key.split_once(':')?;
    Some((kind, id.parse().ok()?))
}

/// Numeric ids of the `<kind>:<id>` components in a device state, ascending.
///
/// Keys sort as strings (`switch:10` before `switch:2`), so the ids are
/// sorted numerically here.
pub fn component_ids(state: &DeviceState, kind: &str) -> Vec<u64> {
    let mut ids: Vec<u64> = state
        .keys()
        .filter_map(|key| parse_component_key(key))
        .filter(|(existing, _)| *existing == kind)
        .map(|(_, id)| id)
        .collect();
    ids.sort_unstable();
    ids
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum CreateError {
    #[error("Unknown device '{0}'")]
    UnknownDevice(String),
    #[error("No free {0} id left")]
    IdsExhausted(String),
}

/// Schemaless state document of one component.
///
/// A component that was never written reads as an empty document rather
/// than an error, so optional components behave like a freshly booted
/// device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentState(Map<String, Value>);

impl ComponentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    pub fn u64_field(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(Value::as_u64)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Current `output` of a switch or light (`false` when never set).
    pub fn output(&self) -> bool {
        self.bool_field("output").unwrap_or(false)
    }

    /// Stored `brightness` of a light.
    pub fn brightness(&self) -> Option<u64> {
        self.u64_field("brightness")
    }

    /// Insert or replace one field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Shallow-merge the fields of a JSON object into this document.
    /// Non-object values are ignored.
    pub fn merge(&mut self, patch: &Value) {
        if let Value::Object(fields) = patch {
            for (field, value) in fields {
                self.0.insert(field.clone(), value.clone());
            }
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for ComponentState {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// All component states of one device, ordered by component key.
pub type DeviceState = BTreeMap<String, ComponentState>;

/// Shared mutable state of every simulated device.
#[derive(Debug, Default)]
pub struct StateStore {
    devices: RwLock<HashMap<String, DeviceState>>,
}

impl StateStore {
    /// Seed the store with one entry per registered device.
    ///
    /// `initial` is keyed by device name (any case); entries naming a device
    /// the registry does not know are dropped. The documents are cloned, so
    /// the caller's copy is never aliased.
    pub fn seed(registry: &DeviceRegistry, initial: &HashMap<String, DeviceState>) -> Self {
        let mut devices: HashMap<String, DeviceState> = registry
            .devices()
            .map(|device| (device.name.clone(), DeviceState::new()))
            .collect();

        for (name, state) in initial {
            match registry.lookup(name) {
                Some(device) => {
                    devices.insert(device.name.clone(), state.clone());
                }
                None => warn!("[Store] Ignoring initial state for unknown device '{}'", name),
            }
        }

        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Read one component; `None` when it was never set.
    pub fn get(&self, device: &str, key: &str) -> Option<ComponentState> {
        self.devices
            .read()
            .get(device)
            .and_then(|state| state.get(key))
            .cloned()
    }

    /// Read one component, treating a missing component as empty.
    pub fn read(&self, device: &str, key: &str) -> ComponentState {
        self.get(device, key).unwrap_or_default()
    }

    /// Atomically read-modify-write one component.
    ///
    /// `mutate` receives the current document (empty if absent) and returns
    /// whatever the caller needs to report, e.g. the value before a toggle.
    /// Device names must already be validated by the router; for a device
    /// the store does not hold, the mutation runs against a scratch
    /// document that is then discarded.
    pub fn set<R>(&self, device: &str, key: &str, mutate: impl FnOnce(&mut ComponentState) -> R) -> R {
        let mut devices = self.devices.write();
        match devices.get_mut(device) {
            Some(state) => {
                let component = state.entry(key.to_string()).or_default();
                let result = mutate(&mut *component);
                debug!("[Store] {} {} -> {}", device, key, component.as_value());
                result
            }
            None => {
                warn!("[Store] Mutation of '{}' on unknown device '{}' discarded", key, device);
                mutate(&mut ComponentState::new())
            }
        }
    }

    /// Like [`set`](Self::set), but only for a component that already
    /// exists; returns `None` without creating it otherwise.
    pub fn update<R>(
        &self,
        device: &str,
        key: &str,
        mutate: impl FnOnce(&mut ComponentState) -> R,
    ) -> Option<R> {
        let mut devices = self.devices.write();
        let component = devices.get_mut(device)?.get_mut(key)?;
        let result = mutate(&mut *component);
        debug!("[Store] {} {} -> {}", device, key, component.as_value());
        Some(result)
    }

    /// Create the component after the highest existing `<kind>:<id>` (ids
    /// start at `first_id`) and return its id. Allocation and insertion
    /// happen under one exclusive lock.
    pub fn create(
        &self,
        device: &str,
        kind: &str,
        first_id: u64,
        init: impl FnOnce(u64) -> ComponentState,
    ) -> Result<u64, CreateError> {
        let mut devices = self.devices.write();
        let state = devices
            .get_mut(device)
            .ok_or_else(|| CreateError::UnknownDevice(device.to_string()))?;
        let id = match component_ids(state, kind).last() {
            Some(highest) => highest
                .checked_add(1)
                .ok_or_else(|| CreateError::IdsExhausted(kind.to_string()))?
                .max(first_id),
            None => first_id,
        };
        state.insert(component_key(kind, id), init(id));
        debug!("[Store] {} created {}", device, component_key(kind, id));
        Ok(id)
    }

    /// Remove one component, returning its last state.
    pub fn remove(&self, device: &str, key: &str) -> Option<ComponentState> {
        self.devices
            .write()
            .get_mut(device)
            .and_then(|state| state.remove(key))
    }

    /// Copy of every component of one device.
    pub fn snapshot(&self, device: &str) -> DeviceState {
        self.devices.read().get(device).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::registry::{DeviceDescriptor, Generation};
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![DeviceDescriptor {
            name: "Plug".to_string(),
            mac_address: "AABBCCDDEEFF".to_string(),
            model: "SNSW-001P16EU".to_string(),
            device_type_code: "PlusPlugS".to_string(),
            protocol_generation: Generation::Current,
            platform: "esp32".to_string(),
        }])
        .unwrap()
    }

    fn initial(output: bool) -> HashMap<String, DeviceState> {
        let mut state = DeviceState::new();
        let mut switch = ComponentState::new();
        switch.insert("output", output);
        state.insert("switch:0".to_string(), switch);
        HashMap::from([("plug".to_string(), state)])
    }

    #[test]
    fn test_component_key_roundtrip() {
        assert_eq!(component_key("switch", 3), "switch:3");
        assert_eq!(parse_component_key("switch:3"), Some(("switch", 3)));
        assert_eq!(parse_component_key("sys"), None);
        assert_eq!(parse_component_key("script:x"), None);
    }

    #[test]
    fn test_missing_component_reads_empty() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        assert!(store.get("Plug", "switch:0").is_none());
        assert!(store.read("Plug", "switch:0").is_empty());
    }

    #[test]
    fn test_seed_does_not_alias_fixture() {
        let fixture = initial(true);
        let store = StateStore::seed(&registry(), &fixture);
        store.set("Plug", "switch:0", |state| state.insert("output", false));

        assert!(!store.read("Plug", "switch:0").output());
        assert!(fixture["plug"]["switch:0"].output());
    }

    #[test]
    fn test_set_returns_mutator_value() {
        let store = StateStore::seed(&registry(), &initial(true));
        let previous = store.set("Plug", "switch:0", |state| {
            let was_on = state.output();
            state.insert("output", !was_on);
            was_on
        });
        assert!(previous);
        assert!(!store.read("Plug", "switch:0").output());
    }

    #[test]
    fn test_unknown_device_is_not_created() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        let seen = store.set("Ghost", "switch:0", |state| state.is_empty());
        assert!(seen);
        assert!(store.snapshot("Ghost").is_empty());
        assert!(store.get("Ghost", "switch:0").is_none());
    }

    #[test]
    fn test_unknown_fixture_device_dropped() {
        let mut fixture = initial(true);
        fixture.insert("Ghost".to_string(), DeviceState::new());
        let store = StateStore::seed(&registry(), &fixture);
        assert!(store.devices.read().get("Ghost").is_none());
    }

    #[test]
    fn test_update_does_not_create() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        assert_eq!(store.update("Plug", "script:1", |_| ()), None);
        assert!(store.get("Plug", "script:1").is_none());
    }

    #[test]
    fn test_create_allocates_sequential_ids() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        assert_eq!(store.create("Plug", "script", 1, |_| ComponentState::new()), Ok(1));
        assert_eq!(store.create("Plug", "script", 1, |_| ComponentState::new()), Ok(2));
        store.remove("Plug", "script:1");
        assert_eq!(store.create("Plug", "script", 1, |_| ComponentState::new()), Ok(3));
        assert_eq!(
            store.create("Ghost", "script", 1, |_| ComponentState::new()),
            Err(CreateError::UnknownDevice("Ghost".to_string()))
        );
    }

    #[test]
    fn test_create_after_numerically_highest_id() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        store.set("Plug", "script:9", |_| ());
        store.set("Plug", "script:10", |_| ());
        assert_eq!(store.create("Plug", "script", 1, |_| ComponentState::new()), Ok(11));
    }

    #[test]
    fn test_create_with_exhausted_ids() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        store.set("Plug", &component_key("script", u64::MAX), |_| ());
        store.set("Plug", "script:1", |state| state.insert("name", "kept"));

        assert_eq!(
            store.create("Plug", "script", 1, |_| ComponentState::new()),
            Err(CreateError::IdsExhausted("script".to_string()))
        );
        assert_eq!(store.read("Plug", "script:1").str_field("name"), Some("kept"));
    }

    #[test]
    fn test_component_ids_sort_numerically() {
        let mut state = DeviceState::new();
        for key in ["switch:10", "switch:2", "switch:0", "light:1", "auth"] {
            state.insert(key.to_string(), ComponentState::new());
        }
        assert_eq!(component_ids(&state, "switch"), vec![0, 2, 10]);
        assert_eq!(component_ids(&state, "light"), vec![1]);
        assert!(component_ids(&state, "cover").is_empty());
    }

    #[test]
    fn test_merge_and_snapshot() {
        let store = StateStore::seed(&registry(), &HashMap::new());
        store.set("Plug", "light:0", |state| {
            state.merge(&json!({"output": true, "brightness": 40}))
        });
        let snapshot = store.snapshot("Plug");
        assert_eq!(snapshot["light:0"].brightness(), Some(40));
        assert!(snapshot["light:0"].output());
    }

    #[test]
    fn test_concurrent_toggles_keep_parity() {
        let store = Arc::new(StateStore::seed(&registry(), &HashMap::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.set("Plug", "switch:0", |state| {
                            let was_on = state.output();
                            state.insert("output", !was_on);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!store.read("Plug", "switch:0").output());
    }
}
