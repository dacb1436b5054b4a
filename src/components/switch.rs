//! Switch (relay) component.
//!
//! State lives under `switch:<id>` as `{output: bool, ...}`. Legacy relays
//! share the same state so both dialects observe one output.

use super::IdParams;
use crate::device::{ComponentState, StateStore, component_key};
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};

pub const KIND: &str = "switch";

#[derive(Debug, Deserialize)]
struct SetParams {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    on: bool,
}

/// Stored status of one switch, verbatim.
pub fn status(store: &StateStore, device: &str, id: u64) -> ComponentState {
    store.read(device, &component_key(KIND, id))
}

/// Set the output and return the output before the call.
pub fn set(store: &StateStore, device: &str, id: u64, on: bool) -> bool {
    store.set(device, &component_key(KIND, id), |state| {
        let was_on = state.output();
        state.insert("output", on);
        was_on
    })
}

/// Invert the output and return the output before the call.
pub fn toggle(store: &StateStore, device: &str, id: u64) -> bool {
    store.set(device, &component_key(KIND, id), |state| {
        let was_on = state.output();
        state.insert("output", !was_on);
        was_on
    })
}

fn rpc_get_status(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    Ok(status(ctx.store, ctx.device_name(), id).as_value())
}

fn rpc_get_config(_ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    Ok(json!({
        "id": id,
        "name": null,
        "in_mode": "follow",
        "initial_state": "match_input",
        "auto_on": false,
        "auto_on_delay": 60.0,
        "auto_off": false,
        "auto_off_delay": 60.0,
    }))
}

fn rpc_set(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let SetParams { id, on } = params::parse(params)?;
    let was_on = set(ctx.store, ctx.device_name(), id, on);
    debug!("[RPC] {} switch:{} set {} (was {})", ctx.device_name(), id, on, was_on);
    Ok(json!({ "was_on": was_on }))
}

fn rpc_toggle(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    let was_on = toggle(ctx.store, ctx.device_name(), id);
    debug!("[RPC] {} switch:{} toggled (was {})", ctx.device_name(), id, was_on);
    Ok(json!({ "was_on": was_on }))
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Switch.GetStatus", rpc_get_status);
    table.register("Switch.GetConfig", rpc_get_config);
    table.register("Switch.Set", rpc_set);
    table.register("Switch.Toggle", rpc_toggle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tests::fixture;

    #[test]
    fn test_set_returns_false_on_first_use() {
        let (registry, store) = fixture();
        let name = &registry.lookup("plug").unwrap().name;
        assert!(!set(&store, name, 0, true));
        assert!(set(&store, name, 0, false));

        let (_, store) = fixture();
        assert!(!set(&store, name, 1, false));
    }

    #[test]
    fn test_toggle_parity() {
        let (registry, store) = fixture();
        let name = &registry.lookup("plug").unwrap().name;
        for n in 1..=7u32 {
            let was_on = toggle(&store, name, 0);
            assert_eq!(was_on, n % 2 == 0);
        }
        assert!(status(&store, name, 0).output());
    }

    #[test]
    fn test_set_merges_into_existing_state() {
        let (registry, store) = fixture();
        let name = &registry.lookup("plug").unwrap().name;
        store.set(name, "switch:0", |state| state.insert("apower", 12.5));
        set(&store, name, 0, true);
        let state = status(&store, name, 0);
        assert!(state.output());
        assert_eq!(state.get("apower"), Some(&json!(12.5)));
    }

    #[test]
    fn test_rpc_set_defaults_to_off() {
        let (registry, store) = fixture();
        let ctx = crate::components::tests::context(&registry, &store, "plug");
        set(&store, "Plug", 0, true);
        let result = rpc_set(&ctx, &json!({})).unwrap();
        assert_eq!(result, json!({"was_on": true}));
        assert!(!status(&store, "Plug", 0).output());
    }
}
