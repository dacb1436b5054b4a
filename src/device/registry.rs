//! Static registry of simulated devices.
//!
//! The registry is populated once from the fixture and never mutated after
//! construction, so lookups need no locking and it can be shared behind an
//! `Arc` between every request task.

use crate::error::{Result, SimulatorError};
use serde::{Deserialize, Serialize};

/// Protocol dialect spoken by a simulated device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Generation {
    /// Path-style REST dialect (`/shelly`, `/relay/0`, ...).
    Legacy,
    /// JSON-RPC dialect (`/rpc`, `/rpc/Switch.Set`, ...).
    #[default]
    Current,
}

impl Generation {
    /// Numeric generation as reported by the device (`gen` field).
    pub fn number(self) -> u8 {
        match self {
            Generation::Legacy => 1,
            Generation::Current => 2,
        }
    }
}

impl From<u8> for Generation {
    /// `1` is the legacy dialect. Zero (unset in older fixtures) and every
    /// newer generation speak the RPC dialect.
    fn from(value: u8) -> Self {
        match value {
            1 => Generation::Legacy,
            _ => Generation::Current,
        }
    }
}

impl From<Generation> for u8 {
    fn from(value: Generation) -> Self {
        value.number()
    }
}

/// Static identity of one simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// Display name, also the path segment under `/devices/`.
    pub name: String,
    /// MAC address as configured (any case, separators allowed).
    pub mac_address: String,
    /// Hardware model identifier, e.g. `SNSW-001P16EU`.
    pub model: String,
    /// Device type / application code, e.g. `PlusPlugS` or `SHSW-1`.
    #[serde(default)]
    pub device_type_code: String,
    #[serde(default)]
    pub protocol_generation: Generation,
    #[serde(default)]
    pub platform: String,
}

impl DeviceDescriptor {
    /// MAC address normalised the way devices report it: uppercase hex
    /// without separators.
    pub fn mac(&self) -> String {
        self.mac_address
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Device id as reported by `Shelly.GetDeviceInfo`, e.g.
    /// `shellyplusplugs-aabbccddeeff`.
    pub fn device_id(&self) -> String {
        let prefix = if self.device_type_code.is_empty() {
            self.model.as_str()
        } else {
            self.device_type_code.as_str()
        };
        let prefix = prefix.to_lowercase();
        let prefix = if prefix.starts_with("shelly") {
            prefix
        } else {
            format!("shelly{}", prefix)
        };
        format!("{}-{}", prefix, self.mac().to_lowercase())
    }

    /// Hostname used by legacy settings (`shelly1-AABBCC` style suffix).
    pub fn hostname(&self) -> String {
        let mac = self.mac();
        let suffix = &mac[mac.len().saturating_sub(6)..];
        let code = if self.device_type_code.is_empty() {
            &self.model
        } else {
            &self.device_type_code
        };
        format!("{}-{}", code.to_lowercase(), suffix)
    }

    /// Case-insensitive display name comparison.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Immutable list of device descriptors.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceRegistry {
    /// Build a registry, rejecting names that collide case-insensitively.
    ///
    /// Two devices answering to the same path segment would make lookup
    /// order-dependent, so this is reported as a fixture error instead.
    pub fn new(devices: Vec<DeviceDescriptor>) -> Result<Self> {
        for (index, device) in devices.iter().enumerate() {
            if devices[..index]
                .iter()
                .any(|earlier| earlier.matches_name(&device.name))
            {
                return Err(SimulatorError::DuplicateDevice(device.name.clone()));
            }
        }
        Ok(Self { devices })
    }

    /// Look up a device by display name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|device| device.matches_name(name))
    }

    /// All descriptors, in fixture order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
