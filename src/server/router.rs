//! Resolution of `/devices/<name>[/<rest>]` request paths.

use crate::device::{DeviceDescriptor, DeviceRegistry};
use crate::dispatch::DeviceResponse;
use serde_json::json;

const DEVICES_PREFIX: &str = "/devices/";

/// A path resolved to a registered device.
#[derive(Debug, Clone, PartialEq)]
pub struct Route<'a> {
    pub device: &'a DeviceDescriptor,
    /// Path after the device segment, e.g. `/rpc`; empty when absent.
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Not of the form `/devices/<name>...`.
    Malformed(String),
    UnknownDevice(String),
}

impl RouteError {
    pub fn into_response(self) -> DeviceResponse {
        match self {
            RouteError::Malformed(path) => DeviceResponse::not_found(json!({
                "error": "not_found",
                "message": format!("No route for {}", path),
            })),
            RouteError::UnknownDevice(name) => DeviceResponse::not_found(json!({
                "error": "unknown_device",
                "message": format!("No device named '{}'", name),
            })),
        }
    }
}

pub struct DeviceRouter<'a> {
    registry: &'a DeviceRegistry,
}

impl<'a> DeviceRouter<'a> {
    pub fn new(registry: &'a DeviceRegistry) -> Self {
        Self { registry }
    }

    /// Map a raw (still percent-encoded) request path to its device.
    pub fn resolve(&self, path: &str) -> Result<Route<'a>, RouteError> {
        let malformed = || RouteError::Malformed(path.to_string());
        let tail = path.strip_prefix(DEVICES_PREFIX).ok_or_else(malformed)?;
        let (segment, rest) = match tail.find('/') {
            Some(split) => tail.split_at(split),
            None => (tail, ""),
        };
        if segment.is_empty() {
            return Err(malformed());
        }
        let name = urlencoding::decode(segment).map_err(|_| malformed())?;
        let device = self
            .registry
            .lookup(&name)
            .ok_or_else(|| RouteError::UnknownDevice(name.to_string()))?;
        Ok(Route {
            device,
            rest: rest.to_string(),
        })
    }
}

/// Percent-encoded path prefix of one device.
pub fn device_path(name: &str) -> String {
    format!("{}{}", DEVICES_PREFIX, urlencoding::encode(name))
}
