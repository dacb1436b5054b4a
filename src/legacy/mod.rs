//! Dispatcher for legacy-generation devices.
//!
//! Legacy devices answer on fixed paths and take their arguments from the
//! query string (or a form-encoded body). Relays and lights share the
//! `switch:<n>` / `light:<n>` state used by the RPC dialect.

mod actions;

pub use actions::ActionEntry;

use crate::components::{LEGACY_FIRMWARE, light, network, switch};
use crate::device::{DeviceState, component_ids};
use crate::dispatch::{DeviceContext, DeviceRequest, DeviceResponse, GenerationDispatcher};
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::ops::Range;

/// Relay and light channels a legacy device can address.
const MAX_CHANNELS: u64 = 16;

/// `turn` argument of relay and light endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    On,
    Off,
    Toggle,
}

impl Turn {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "on" => Some(Turn::On),
            "off" => Some(Turn::Off),
            "toggle" => Some(Turn::Toggle),
            _ => None,
        }
    }
}

/// Query pairs followed by any form-encoded body pairs. A body that is not
/// form-encoded contributes nothing.
fn arguments(request: &DeviceRequest) -> Vec<(String, String)> {
    let mut pairs = request.query.clone();
    if !request.body.is_empty() {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&request.body) {
            Ok(body) => pairs.extend(body),
            Err(e) => debug!("[Legacy] Ignoring undecodable form body: {}", e),
        }
    }
    pairs
}

fn argument<'a>(args: &'a [(String, String)], key: &str) -> Option<&'a str> {
    args.iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

/// Channels `0..=n` up to the highest stored `<kind>:<n>`, so that array
/// position equals channel number. Unset channels in between read as off.
fn channels(snapshot: &DeviceState, kind: &str) -> Range<u64> {
    let highest = component_ids(snapshot, kind)
        .into_iter()
        .filter(|id| *id < MAX_CHANNELS)
        .next_back();
    0..highest.map_or(0, |id| id + 1)
}

fn channel(segment: &str) -> Option<u64> {
    segment.parse().ok().filter(|id| *id < MAX_CHANNELS)
}

fn relay_status(ctx: &DeviceContext<'_>, id: u64) -> Value {
    let state = switch::status(ctx.store, ctx.device_name(), id);
    json!({
        "ison": state.output(),
        "has_timer": false,
        "timer_started": 0,
        "timer_duration": 0,
        "timer_remaining": 0,
        "overpower": false,
        "source": "http",
    })
}

fn light_status(ctx: &DeviceContext<'_>, id: u64) -> Value {
    let state = light::status(ctx.store, ctx.device_name(), id);
    json!({
        "ison": state.output(),
        "source": "http",
        "has_timer": false,
        "timer_started": 0,
        "timer_duration": 0,
        "timer_remaining": 0,
        "mode": "white",
        "brightness": state.brightness().unwrap_or(100),
    })
}

pub struct LegacyDispatcher;

impl LegacyDispatcher {
    fn identity(&self, ctx: &DeviceContext<'_>) -> Value {
        let snapshot = ctx.store.snapshot(ctx.device_name());
        let outputs = channels(&snapshot, switch::KIND).end + channels(&snapshot, light::KIND).end;
        json!({
            "type": ctx.device.device_type_code,
            "mac": ctx.device.mac(),
            "auth": false,
            "fw": LEGACY_FIRMWARE,
            "discoverable": true,
            "longid": 1,
            "num_outputs": outputs.max(1),
            "num_meters": 0,
        })
    }

    fn status(&self, ctx: &DeviceContext<'_>) -> Value {
        let snapshot = ctx.store.snapshot(ctx.device_name());
        let relays: Vec<Value> = channels(&snapshot, switch::KIND)
            .map(|id| relay_status(ctx, id))
            .collect();
        let lights: Vec<Value> = channels(&snapshot, light::KIND)
            .map(|id| light_status(ctx, id))
            .collect();
        let wifi = network::wifi_status(ctx);
        json!({
            "wifi_sta": {
                "connected": true,
                "ssid": wifi["ssid"],
                "ip": wifi["sta_ip"],
                "rssi": wifi["rssi"],
            },
            "cloud": { "enabled": false, "connected": false },
            "mqtt": { "connected": false },
            "time": ctx.clock.format("%H:%M").to_string(),
            "unixtime": ctx.clock.timestamp(),
            "serial": 1,
            "has_update": false,
            "mac": ctx.device.mac(),
            "relays": relays,
            "lights": lights,
            "meters": [],
            "inputs": [],
            "update": { "status": "idle", "has_update": false },
            "ram_total": 50_592,
            "ram_free": 38_056,
            "fs_size": 233_681,
            "fs_free": 162_399,
            "uptime": 0,
        })
    }

    fn settings(&self, ctx: &DeviceContext<'_>) -> Value {
        let snapshot = ctx.store.snapshot(ctx.device_name());
        let relays: Vec<Value> = channels(&snapshot, switch::KIND)
            .map(|id| {
                let state = switch::status(ctx.store, ctx.device_name(), id);
                json!({
                    "name": state.str_field("name"),
                    "appliance_type": "General",
                    "ison": state.output(),
                    "has_timer": false,
                    "default_state": "off",
                    "btn_type": "toggle",
                    "auto_on": 0.0,
                    "auto_off": 0.0,
                })
            })
            .collect();
        let lights: Vec<Value> = channels(&snapshot, light::KIND)
            .map(|id| {
                let state = light::status(ctx.store, ctx.device_name(), id);
                json!({
                    "name": state.str_field("name"),
                    "ison": state.output(),
                    "default_state": "last",
                    "brightness": state.brightness().unwrap_or(100),
                })
            })
            .collect();
        json!({
            "device": {
                "type": ctx.device.device_type_code,
                "mac": ctx.device.mac(),
                "hostname": ctx.device.hostname(),
                "num_outputs": (relays.len() + lights.len()).max(1),
            },
            "name": ctx.device.name,
            "fw": LEGACY_FIRMWARE,
            "discoverable": true,
            "mqtt": { "enable": false },
            "cloud": { "enabled": false, "connected": false },
            "relays": relays,
            "lights": lights,
        })
    }

    fn relay(&self, ctx: &DeviceContext<'_>, id: u64, args: &[(String, String)]) -> Value {
        match argument(args, "turn").map(|turn| (turn, Turn::parse(turn))) {
            Some((_, Some(Turn::On))) => {
                switch::set(ctx.store, ctx.device_name(), id, true);
            }
            Some((_, Some(Turn::Off))) => {
                switch::set(ctx.store, ctx.device_name(), id, false);
            }
            Some((_, Some(Turn::Toggle))) => {
                switch::toggle(ctx.store, ctx.device_name(), id);
            }
            Some((raw, None)) => {
                debug!("[Legacy] {} relay/{} ignoring turn={}", ctx.device_name(), id, raw);
            }
            None => {}
        }
        relay_status(ctx, id)
    }

    fn light(&self, ctx: &DeviceContext<'_>, id: u64, args: &[(String, String)]) -> Value {
        let turn = argument(args, "turn").and_then(Turn::parse);
        let brightness = argument(args, "brightness").and_then(|value| value.parse::<u64>().ok());
        match turn {
            Some(Turn::Toggle) => {
                light::toggle(ctx.store, ctx.device_name(), id);
                if brightness.is_some() {
                    light::set(ctx.store, ctx.device_name(), id, None, brightness);
                }
            }
            Some(Turn::On) => {
                light::set(ctx.store, ctx.device_name(), id, Some(true), brightness);
            }
            Some(Turn::Off) => {
                light::set(ctx.store, ctx.device_name(), id, Some(false), brightness);
            }
            None if brightness.is_some() => {
                light::set(ctx.store, ctx.device_name(), id, None, brightness);
            }
            None => {}
        }
        light_status(ctx, id)
    }

    fn actions(&self, ctx: &DeviceContext<'_>, args: &[(String, String)]) -> Value {
        let (Some(index), Some(name)) = (argument(args, "index"), argument(args, "name")) else {
            return actions::list(ctx.store, ctx.device_name());
        };
        let Ok(index) = index.parse() else {
            warn!(
                "[Legacy] {} action {} has non-numeric index '{}', not registered",
                ctx.device_name(),
                name,
                index
            );
            return actions::list(ctx.store, ctx.device_name());
        };
        let entry = ActionEntry {
            index,
            enabled: argument(args, "enabled").is_some_and(truthy),
            urls: args
                .iter()
                .filter(|(key, _)| key == "urls[]" || key == "urls")
                .map(|(_, url)| url.clone())
                .collect(),
        };
        info!(
            "[Legacy] {} action {}[{}] enabled={} urls={:?}",
            ctx.device_name(),
            name,
            entry.index,
            entry.enabled,
            entry.urls
        );
        actions::register(ctx.store, ctx.device_name(), name, entry)
    }
}

impl GenerationDispatcher for LegacyDispatcher {
    fn dispatch(&self, ctx: &DeviceContext<'_>, request: &DeviceRequest) -> DeviceResponse {
        let args = arguments(request);
        let path = request.path.trim_end_matches('/');
        debug!("[Legacy] {} <- {} {}", ctx.device_name(), request.method, path);

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = match segments.as_slice() {
            ["shelly"] => self.identity(ctx),
            ["status"] => self.status(ctx),
            ["settings"] => self.settings(ctx),
            ["settings", "actions"] => self.actions(ctx, &args),
            ["relay", id] => match channel(id) {
                Some(id) => self.relay(ctx, id, &args),
                None => return self.unknown(ctx, request),
            },
            ["light", id] => match channel(id) {
                Some(id) => self.light(ctx, id, &args),
                None => return self.unknown(ctx, request),
            },
            _ => return self.unknown(ctx, request),
        };
        DeviceResponse::ok(body)
    }
}

impl LegacyDispatcher {
    fn unknown(&self, ctx: &DeviceContext<'_>, request: &DeviceRequest) -> DeviceResponse {
        warn!(
            "[Legacy] {} has no endpoint {} {}",
            ctx.device_name(),
            request.method,
            request.path
        );
        DeviceResponse::unknown_endpoint(&request.method, &request.path)
    }
}
