//! On-device scripts.
//!
//! Each script is a `script:<id>` document holding
//! `{id, name, enable, running, code}`. Scripts are never executed; starting
//! one only flips `running`.

use super::IdParams;
use crate::device::{ComponentState, CreateError, component_ids, component_key};
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

pub const KIND: &str = "script";

#[derive(Debug, Deserialize)]
struct CreateParams {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutCodeParams {
    id: u64,
    code: String,
    #[serde(default)]
    append: bool,
}

#[derive(Debug, Deserialize)]
struct GetCodeParams {
    id: u64,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    enable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SetConfigParams {
    id: u64,
    #[serde(default)]
    config: ScriptConfig,
}

/// Parameters of id-addressed script methods; unlike other components the
/// id is mandatory.
#[derive(Debug, Deserialize)]
struct ScriptIdParams {
    id: u64,
}

fn summary(state: &ComponentState) -> Value {
    json!({
        "id": state.u64_field("id"),
        "name": state.str_field("name"),
        "enable": state.bool_field("enable").unwrap_or(false),
        "running": state.bool_field("running").unwrap_or(false),
    })
}

fn with_script<R>(
    ctx: &DeviceContext<'_>,
    id: u64,
    mutate: impl FnOnce(&mut ComponentState) -> R,
) -> Result<R, RpcError> {
    ctx.store
        .update(ctx.device_name(), &component_key(KIND, id), mutate)
        .ok_or_else(|| RpcError::not_found("id", id))
}

fn rpc_list(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    let snapshot = ctx.store.snapshot(ctx.device_name());
    let scripts: Vec<Value> = component_ids(&snapshot, KIND)
        .into_iter()
        .filter_map(|id| snapshot.get(&component_key(KIND, id)))
        .map(summary)
        .collect();
    Ok(json!({ "scripts": scripts }))
}

fn rpc_create(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let CreateParams { name } = params::parse(params)?;
    let id = ctx
        .store
        .create(ctx.device_name(), KIND, 1, |id| {
            let mut state = ComponentState::new();
            state.insert("id", id);
            state.insert("name", name.clone());
            state.insert("enable", false);
            state.insert("running", false);
            state.insert("code", "");
            state
        })
        .map_err(|err| match &err {
            CreateError::UnknownDevice(device) => RpcError::not_found("device", device),
            CreateError::IdsExhausted(_) => RpcError::resource_exhausted(&err),
        })?;
    info!("[RPC] {} created script:{} {:?}", ctx.device_name(), id, name);
    Ok(json!({ "id": id }))
}

fn rpc_put_code(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let PutCodeParams { id, code, append } = params::parse(params)?;
    let len = with_script(ctx, id, |state| {
        let mut stored = if append {
            state.str_field("code").unwrap_or_default().to_string()
        } else {
            String::new()
        };
        stored.push_str(&code);
        let len = stored.len();
        state.insert("code", stored);
        len
    })?;
    Ok(json!({ "len": len }))
}

fn rpc_get_code(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let GetCodeParams { id, offset, len } = params::parse(params)?;
    let state = ctx
        .store
        .get(ctx.device_name(), &component_key(KIND, id))
        .ok_or_else(|| RpcError::not_found("id", id))?;
    let code = state.str_field("code").unwrap_or_default();

    let start = offset.min(code.len());
    let end = len.map_or(code.len(), |len| start.saturating_add(len).min(code.len()));
    let data = code.get(start..end).ok_or_else(|| {
        RpcError::invalid_params(format!("offset {} splits a character", offset))
    })?;
    Ok(json!({ "data": data, "left": code.len() - end }))
}

fn set_running(ctx: &DeviceContext<'_>, params: &Value, running: bool) -> Result<Value, RpcError> {
    let ScriptIdParams { id } = params::parse(params)?;
    let was_running = with_script(ctx, id, |state| {
        let was_running = state.bool_field("running").unwrap_or(false);
        state.insert("running", running);
        was_running
    })?;
    info!(
        "[RPC] {} script:{} {}",
        ctx.device_name(),
        id,
        if running { "started" } else { "stopped" }
    );
    Ok(json!({ "was_running": was_running }))
}

fn rpc_start(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    set_running(ctx, params, true)
}

fn rpc_stop(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    set_running(ctx, params, false)
}

fn rpc_set_config(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let SetConfigParams { id, config } = params::parse(params)?;
    with_script(ctx, id, |state| {
        if let Some(name) = config.name {
            state.insert("name", name);
        }
        if let Some(enable) = config.enable {
            state.insert("enable", enable);
        }
    })?;
    Ok(json!({ "restart_required": false }))
}

fn rpc_get_status(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    let state = ctx
        .store
        .get(ctx.device_name(), &component_key(KIND, id))
        .ok_or_else(|| RpcError::not_found("id", id))?;
    Ok(json!({
        "id": id,
        "running": state.bool_field("running").unwrap_or(false),
        "errors": [],
    }))
}

fn rpc_delete(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let ScriptIdParams { id } = params::parse(params)?;
    ctx.store
        .remove(ctx.device_name(), &component_key(KIND, id))
        .ok_or_else(|| RpcError::not_found("id", id))?;
    Ok(Value::Null)
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Script.List", rpc_list);
    table.register("Script.Create", rpc_create);
    table.register("Script.PutCode", rpc_put_code);
    table.register("Script.GetCode", rpc_get_code);
    table.register("Script.Start", rpc_start);
    table.register("Script.Stop", rpc_stop);
    table.register("Script.SetConfig", rpc_set_config);
    table.register("Script.GetStatus", rpc_get_status);
    table.register("Script.Delete", rpc_delete);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tests::{context, fixture};
    use crate::rpc::{NOT_FOUND, RESOURCE_EXHAUSTED};

    #[test]
    fn test_create_put_and_read_code() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");

        let created = rpc_create(&ctx, &json!({"name": "blink"})).unwrap();
        assert_eq!(created, json!({"id": 1}));

        rpc_put_code(&ctx, &json!({"id": 1, "code": "let a = 1;"})).unwrap();
        let len = rpc_put_code(&ctx, &json!({"id": 1, "code": " a++;", "append": true})).unwrap();
        assert_eq!(len, json!({"len": 15}));

        let code = rpc_get_code(&ctx, &json!({"id": 1})).unwrap();
        assert_eq!(code, json!({"data": "let a = 1; a++;", "left": 0}));

        let chunk = rpc_get_code(&ctx, &json!({"id": 1, "offset": 4, "len": 1})).unwrap();
        assert_eq!(chunk, json!({"data": "a", "left": 10}));
    }

    #[test]
    fn test_start_stop_report_previous_state() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        rpc_create(&ctx, &json!({})).unwrap();

        assert_eq!(rpc_start(&ctx, &json!({"id": 1})).unwrap(), json!({"was_running": false}));
        assert_eq!(rpc_start(&ctx, &json!({"id": 1})).unwrap(), json!({"was_running": true}));
        assert_eq!(rpc_stop(&ctx, &json!({"id": 1})).unwrap(), json!({"was_running": true}));
    }

    #[test]
    fn test_list_reflects_config() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        rpc_create(&ctx, &json!({"name": "a"})).unwrap();
        rpc_create(&ctx, &json!({"name": "b"})).unwrap();
        rpc_set_config(&ctx, &json!({"id": 2, "config": {"enable": true}})).unwrap();

        let list = rpc_list(&ctx, &json!({})).unwrap();
        assert_eq!(
            list,
            json!({"scripts": [
                {"id": 1, "name": "a", "enable": false, "running": false},
                {"id": 2, "name": "b", "enable": true, "running": false},
            ]})
        );
    }

    #[test]
    fn test_create_when_ids_are_exhausted() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        store.set("Plug", &component_key(KIND, u64::MAX), |state| {
            state.insert("id", u64::MAX);
        });

        let err = rpc_create(&ctx, &json!({"name": "late"})).unwrap_err();
        assert_eq!(err.code, RESOURCE_EXHAUSTED);
        assert!(store.get("Plug", "script:1").is_none());
    }

    #[test]
    fn test_list_orders_by_numeric_id() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        for id in [10, 2] {
            store.set("Plug", &component_key(KIND, id), |state| {
                state.insert("id", id);
            });
        }
        let list = rpc_list(&ctx, &json!({})).unwrap();
        assert_eq!(list["scripts"][0]["id"], json!(2));
        assert_eq!(list["scripts"][1]["id"], json!(10));
    }

    #[test]
    fn test_unknown_script_is_not_found() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        for result in [
            rpc_get_code(&ctx, &json!({"id": 9})),
            rpc_start(&ctx, &json!({"id": 9})),
            rpc_put_code(&ctx, &json!({"id": 9, "code": "x"})),
            rpc_delete(&ctx, &json!({"id": 9})),
        ] {
            assert_eq!(result.unwrap_err().code, NOT_FOUND);
        }
        assert!(store.get("Plug", "script:9").is_none());
    }
}
