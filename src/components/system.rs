//! Device-wide methods: identity, aggregated status/config, component
//! listing, authentication and schedules.

use super::{FIRMWARE_ID, FIRMWARE_VERSION, network, script};
use crate::device::{ComponentState, DeviceState, parse_component_key};
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::info;
use serde::Deserialize;
use serde_json::{Map, Value, json};

const AUTH_KEY: &str = "auth";
const SCHEDULE_KEY: &str = "schedule";

#[derive(Debug, Default, Deserialize)]
struct GetComponentsParams {
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SetAuthParams {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    realm: Option<String>,
    #[serde(default)]
    ha1: Option<String>,
}

/// Whether `Shelly.SetAuth` last enabled authentication.
pub fn auth_enabled(ctx: &DeviceContext<'_>) -> bool {
    ctx.store
        .read(ctx.device_name(), AUTH_KEY)
        .bool_field("enabled")
        .unwrap_or(false)
}

pub fn device_info(ctx: &DeviceContext<'_>) -> Value {
    let device = ctx.device;
    let auth_en = auth_enabled(ctx);
    let auth_domain = auth_en.then(|| device.device_id());
    json!({
        "name": device.name,
        "id": device.device_id(),
        "mac": device.mac(),
        "slot": 0,
        "model": device.model,
        "gen": device.protocol_generation.number(),
        "fw_id": FIRMWARE_ID,
        "ver": FIRMWARE_VERSION,
        "app": device.device_type_code,
        "auth_en": auth_en,
        "auth_domain": auth_domain,
    })
}

pub fn sys_status(ctx: &DeviceContext<'_>) -> Value {
    json!({
        "mac": ctx.device.mac(),
        "restart_required": false,
        "time": ctx.clock.format("%H:%M").to_string(),
        "unixtime": ctx.clock.timestamp(),
        "uptime": 0,
        "ram_size": 246_680,
        "ram_free": 148_120,
        "fs_size": 458_752,
        "fs_free": 143_360,
        "cfg_rev": 0,
        "available_updates": {},
    })
}

pub fn sys_config(ctx: &DeviceContext<'_>) -> Value {
    json!({
        "device": {
            "name": ctx.device.name,
            "mac": ctx.device.mac(),
            "fw_id": FIRMWARE_ID,
            "discoverable": true,
        },
        "location": { "tz": "UTC", "lat": null, "lon": null },
        "debug": { "mqtt": { "enable": false }, "websocket": { "enable": false } },
        "sntp": { "server": "time.google.com" },
        "cfg_rev": 0,
    })
}

/// Status document of one stored component as the device reports it.
fn component_status(kind: &str, id: u64, state: &ComponentState) -> Value {
    match kind {
        script::KIND => json!({
            "id": id,
            "running": state.bool_field("running").unwrap_or(false),
            "errors": [],
        }),
        _ => state.as_value(),
    }
}

fn component_config(kind: &str, id: u64, state: &ComponentState) -> Value {
    match kind {
        script::KIND => json!({
            "id": id,
            "name": state.str_field("name"),
            "enable": state.bool_field("enable").unwrap_or(false),
        }),
        _ => json!({ "id": id, "name": state.str_field("name") }),
    }
}

/// Stored entries that are components (`kind:id`), ordered by kind and
/// then numerically by id.
fn components(snapshot: &DeviceState) -> Vec<(&str, &str, u64, &ComponentState)> {
    let mut components: Vec<_> = snapshot
        .iter()
        .filter_map(|(key, state)| {
            parse_component_key(key).map(|(kind, id)| (key.as_str(), kind, id, state))
        })
        .collect();
    components.sort_by_key(|(_, kind, id, _)| (*kind, *id));
    components
}

fn rpc_get_device_info(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(device_info(ctx))
}

fn rpc_get_status(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    let mut status = Map::new();
    status.insert("sys".to_string(), sys_status(ctx));
    status.insert("wifi".to_string(), network::wifi_status(ctx));
    status.insert("cloud".to_string(), network::cloud_status());
    status.insert("mqtt".to_string(), network::mqtt_status());
    status.insert("ble".to_string(), json!({}));

    let snapshot = ctx.store.snapshot(ctx.device_name());
    for (key, kind, id, state) in components(&snapshot) {
        status.insert(key.to_string(), component_status(kind, id, state));
    }
    Ok(Value::Object(status))
}

fn rpc_get_config(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    let mut config = Map::new();
    config.insert("sys".to_string(), sys_config(ctx));
    config.insert("wifi".to_string(), network::wifi_config());
    config.insert("cloud".to_string(), network::cloud_config());
    config.insert("mqtt".to_string(), network::mqtt_config(ctx));
    config.insert("ble".to_string(), network::ble_config());

    let snapshot = ctx.store.snapshot(ctx.device_name());
    for (key, kind, id, state) in components(&snapshot) {
        config.insert(key.to_string(), component_config(kind, id, state));
    }
    Ok(Value::Object(config))
}

fn rpc_get_components(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let GetComponentsParams {
        offset,
        include,
        keys,
    } = params::parse(params)?;
    let with_status = include.iter().any(|item| item == "status");
    let with_config = include.iter().any(|item| item == "config");

    let snapshot = ctx.store.snapshot(ctx.device_name());
    let selected: Vec<_> = components(&snapshot)
        .into_iter()
        .filter(|(key, ..)| {
            keys.as_ref()
                .is_none_or(|keys| keys.iter().any(|wanted| wanted == key))
        })
        .collect();

    let listed: Vec<Value> = selected
        .iter()
        .skip(offset)
        .map(|(key, kind, id, state)| {
            let mut entry = Map::new();
            entry.insert("key".to_string(), json!(key));
            if with_status {
                entry.insert("status".to_string(), component_status(kind, *id, state));
            }
            if with_config {
                entry.insert("config".to_string(), component_config(kind, *id, state));
            }
            Value::Object(entry)
        })
        .collect();

    Ok(json!({
        "components": listed,
        "cfg_rev": 0,
        "offset": offset,
        "total": selected.len(),
    }))
}

fn rpc_set_auth(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let SetAuthParams { user, realm, ha1 } = params::parse(params)?;
    let enabled = ha1.is_some();
    ctx.store.set(ctx.device_name(), AUTH_KEY, |state| {
        state.insert("enabled", enabled);
        state.insert("user", user);
        state.insert("realm", realm);
    });
    info!(
        "[RPC] {} authentication {}",
        ctx.device_name(),
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(Value::Null)
}

fn rpc_sys_get_status(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(sys_status(ctx))
}

fn rpc_sys_get_config(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(sys_config(ctx))
}

fn rpc_schedule_delete_all(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    ctx.store.remove(ctx.device_name(), SCHEDULE_KEY);
    info!("[RPC] {} schedules cleared", ctx.device_name());
    Ok(Value::Null)
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Shelly.GetDeviceInfo", rpc_get_device_info);
    table.register("Shelly.GetStatus", rpc_get_status);
    table.register("Shelly.GetConfig", rpc_get_config);
    table.register("Shelly.GetComponents", rpc_get_components);
    table.register("Shelly.SetAuth", rpc_set_auth);
    table.register("Sys.GetStatus", rpc_sys_get_status);
    table.register("Sys.GetConfig", rpc_sys_get_config);
    table.register("Schedule.DeleteAll", rpc_schedule_delete_all);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::switch;
    use crate::components::tests::{context, fixture};

    #[test]
    fn test_device_info_identity() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "plug");
        let info = device_info(&ctx);
        assert_eq!(info["name"], json!("Plug"));
        assert_eq!(info["id"], json!("shellyplusplugs-aabbccddeeff"));
        assert_eq!(info["mac"], json!("AABBCCDDEEFF"));
        assert_eq!(info["gen"], json!(2));
        assert_eq!(info["auth_en"], json!(false));
        assert!(info["auth_domain"].is_null());
    }

    #[test]
    fn test_set_auth_reflected_in_device_info() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        rpc_set_auth(&ctx, &json!({"user": "admin", "realm": "x", "ha1": "abc"})).unwrap();
        assert_eq!(device_info(&ctx)["auth_en"], json!(true));

        rpc_set_auth(&ctx, &json!({"user": "admin", "realm": "x", "ha1": null})).unwrap();
        assert_eq!(device_info(&ctx)["auth_en"], json!(false));
    }

    #[test]
    fn test_status_overlays_components_only() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        switch::set(&store, "Plug", 0, true);
        rpc_set_auth(&ctx, &json!({"ha1": "abc"})).unwrap();

        let status = rpc_get_status(&ctx, &json!({})).unwrap();
        assert_eq!(status["switch:0"], json!({"output": true}));
        assert!(status.get("auth").is_none());
        assert_eq!(status["cloud"], json!({"connected": false}));
        assert_eq!(status["sys"]["mac"], json!("AABBCCDDEEFF"));
    }

    #[test]
    fn test_get_components_numeric_order() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        switch::set(&store, "Plug", 10, true);
        switch::set(&store, "Plug", 2, false);

        let all = rpc_get_components(&ctx, &json!({})).unwrap();
        assert_eq!(all["components"], json!([{"key": "switch:2"}, {"key": "switch:10"}]));
    }

    #[test]
    fn test_get_components_paging_and_filters() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        switch::set(&store, "Plug", 0, true);
        switch::set(&store, "Plug", 1, false);

        let all = rpc_get_components(&ctx, &json!({})).unwrap();
        assert_eq!(all["total"], json!(2));
        assert_eq!(all["components"], json!([{"key": "switch:0"}, {"key": "switch:1"}]));

        let paged = rpc_get_components(&ctx, &json!({"offset": 1, "include": ["status"]})).unwrap();
        assert_eq!(
            paged["components"],
            json!([{"key": "switch:1", "status": {"output": false}}])
        );

        let filtered = rpc_get_components(
            &ctx,
            &json!({"keys": ["switch:0"], "include": ["config"]}),
        )
        .unwrap();
        assert_eq!(filtered["total"], json!(1));
        assert_eq!(
            filtered["components"][0]["config"],
            json!({"id": 0, "name": null})
        );
    }

    #[test]
    fn test_schedule_delete_all_clears_key() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        store.set("Plug", SCHEDULE_KEY, |state| state.insert("jobs", json!([1])));
        assert_eq!(rpc_schedule_delete_all(&ctx, &json!({})).unwrap(), Value::Null);
        assert!(store.get("Plug", SCHEDULE_KEY).is_none());
    }
}
