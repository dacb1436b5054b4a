//! Dimmable light component, kept under `light:<id>`.

use super::IdParams;
use crate::device::{ComponentState, StateStore, component_key};
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};

pub const KIND: &str = "light";

#[derive(Debug, Deserialize)]
struct SetParams {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    on: Option<bool>,
    #[serde(default)]
    brightness: Option<u64>,
}

pub fn status(store: &StateStore, device: &str, id: u64) -> ComponentState {
    store.read(device, &component_key(KIND, id))
}

/// Update a light and return the output before the call.
///
/// A brightness of `0` is not stored: the previous brightness survives so
/// the light comes back at the same level when turned on again.
pub fn set(
    store: &StateStore,
    device: &str,
    id: u64,
    on: Option<bool>,
    brightness: Option<u64>,
) -> bool {
    store.set(device, &component_key(KIND, id), |state| {
        let was_on = state.output();
        if let Some(on) = on {
            state.insert("output", on);
        }
        if let Some(brightness) = brightness.filter(|level| *level > 0) {
            state.insert("brightness", brightness.min(100));
        }
        was_on
    })
}

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

fn rpc_set(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let SetParams { id, on, brightness } = params::parse(params)?;
    set(ctx.store, ctx.device_name(), id, on, brightness);
    debug!(
        "[RPC] {} light:{} set on={:?} brightness={:?}",
        ctx.device_name(),
        id,
        on,
        brightness
    );
    Ok(Value::Null)
}

fn rpc_toggle(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    let was_on = toggle(ctx.store, ctx.device_name(), id);
    Ok(json!({ "was_on": was_on }))
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Light.GetStatus", rpc_get_status);
    table.register("Light.Set", rpc_set);
    table.register("Light.Toggle", rpc_toggle);
}
