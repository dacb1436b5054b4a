//! Network, cloud and radio subsystems.
//!
//! Nothing here talks to a real radio. Status documents are canned; the
//! MQTT and Zigbee configs are stored under the `mqtt` / `zigbee` keys so a
//! `SetConfig` is visible to the next `GetConfig`.

use crate::device::ComponentState;
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::info;
use serde::Deserialize;
use serde_json::{Value, json};

const MQTT_KEY: &str = "mqtt";
const ZIGBEE_KEY: &str = "zigbee";

#[derive(Debug, Deserialize)]
struct SetConfigParams {
    config: Value,
}

/// Last octet of the simulated station address, derived from the MAC so
/// every device gets a stable, distinct address.
fn host_octet(ctx: &DeviceContext<'_>) -> u8 {
    let mac = ctx.device.mac();
    let tail = &mac[mac.len().saturating_sub(2)..];
    u8::from_str_radix(tail, 16).unwrap_or(0).clamp(2, 254)
}

pub fn wifi_status(ctx: &DeviceContext<'_>) -> Value {
    json!({
        "sta_ip": format!("192.168.33.{}", host_octet(ctx)),
        "status": "got ip",
        "ssid": "SimulatorNet",
        "rssi": -52,
    })
}

pub fn wifi_config() -> Value {
    json!({
        "ap": { "ssid": null, "is_open": true, "enable": false },
        "sta": { "ssid": "SimulatorNet", "is_open": false, "enable": true, "ipv4mode": "dhcp" },
        "sta1": { "ssid": null, "is_open": true, "enable": false, "ipv4mode": "dhcp" },
        "roam": { "rssi_thr": -80, "interval": 60 },
    })
}

pub fn eth_status() -> Value {
    json!({ "ip": null })
}

pub fn eth_config() -> Value {
    json!({
        "enable": false,
        "ipv4mode": "dhcp",
        "ip": null,
        "netmask": null,
        "gw": null,
        "nameserver": null,
    })
}

pub fn cloud_status() -> Value {
    json!({ "connected": false })
}

pub fn cloud_config() -> Value {
    json!({ "enable": false, "server": "simulator.invalid:6022/jrpc" })
}

pub fn ble_config() -> Value {
    json!({ "enable": true, "rpc": { "enable": true }, "observer": { "enable": false } })
}

/// Stored config overlaid on defaults.
fn stored_config(ctx: &DeviceContext<'_>, key: &str, defaults: Value) -> Value {
    let mut config = ComponentState::new();
    config.merge(&defaults);
    config.merge(&ctx.store.read(ctx.device_name(), key).as_value());
    config.as_value()
}

pub fn mqtt_config(ctx: &DeviceContext<'_>) -> Value {
    let device_id = ctx.device.device_id();
    stored_config(
        ctx,
        MQTT_KEY,
        json!({
            "enable": false,
            "server": null,
            "client_id": device_id,
            "user": null,
            "ssl_ca": null,
            "topic_prefix": device_id,
            "rpc_ntf": true,
            "status_ntf": false,
            "enable_control": true,
        }),
    )
}

pub fn mqtt_status() -> Value {
    json!({ "connected": false })
}

pub fn zigbee_config(ctx: &DeviceContext<'_>) -> Value {
    stored_config(ctx, ZIGBEE_KEY, json!({ "enable": false }))
}

pub fn zigbee_status(ctx: &DeviceContext<'_>) -> Value {
    let enabled = zigbee_config(ctx)["enable"].as_bool().unwrap_or(false);
    let network_state = if enabled { "joined" } else { "disabled" };
    json!({ "network_state": network_state })
}

fn store_config(ctx: &DeviceContext<'_>, key: &str, params: &Value) -> Result<Value, RpcError> {
    let SetConfigParams { config } = params::parse(params)?;
    if !config.is_object() {
        return Err(RpcError::invalid_params("config must be an object"));
    }
    ctx.store
        .set(ctx.device_name(), key, |state| state.merge(&config));
    info!("[RPC] {} {} config updated: {}", ctx.device_name(), key, config);
    Ok(json!({ "restart_required": true }))
}

fn rpc_wifi_get_status(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(wifi_status(ctx))
}

fn rpc_wifi_get_config(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(wifi_config())
}

fn rpc_eth_get_status(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(eth_status())
}

fn rpc_eth_get_config(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(eth_config())
}

fn rpc_cloud_get_status(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(cloud_status())
}

fn rpc_cloud_get_config(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(cloud_config())
}

fn rpc_ble_get_config(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(ble_config())
}

fn rpc_mqtt_get_status(_ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(mqtt_status())
}

fn rpc_mqtt_get_config(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(mqtt_config(ctx))
}

fn rpc_mqtt_set_config(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    store_config(ctx, MQTT_KEY, params)
}

fn rpc_zigbee_get_status(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(zigbee_status(ctx))
}

fn rpc_zigbee_get_config(ctx: &DeviceContext<'_>, _params: &Value) -> Result<Value, RpcError> {
    Ok(zigbee_config(ctx))
}

fn rpc_zigbee_set_config(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    store_config(ctx, ZIGBEE_KEY, params)
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Wifi.GetStatus", rpc_wifi_get_status);
    table.register("Wifi.GetConfig", rpc_wifi_get_config);
    table.register("Eth.GetStatus", rpc_eth_get_status);
    table.register("Eth.GetConfig", rpc_eth_get_config);
    table.register("Cloud.GetStatus", rpc_cloud_get_status);
    table.register("Cloud.GetConfig", rpc_cloud_get_config);
    table.register("BLE.GetConfig", rpc_ble_get_config);
    table.register("MQTT.GetStatus", rpc_mqtt_get_status);
    table.register("MQTT.GetConfig", rpc_mqtt_get_config);
    table.register("MQTT.SetConfig", rpc_mqtt_set_config);
    table.register("Zigbee.GetStatus", rpc_zigbee_get_status);
    table.register("Zigbee.GetConfig", rpc_zigbee_get_config);
    table.register("Zigbee.SetConfig", rpc_zigbee_set_config);
}
