//! Fleet fixture: the devices to simulate and their initial state.
//!
//! ```json
//! {
//!   "devices": [
//!     {
//!       "name": "Kitchen Light",
//!       "macAddress": "AA:BB:CC:DD:EE:01",
//!       "model": "SNSW-001X16EU",
//!       "deviceTypeCode": "PlusLight",
//!       "protocolGeneration": 2,
//!       "platform": "esp32",
//!       "state": { "switch:0": { "output": true } }
//!     }
//!   ]
//! }
//! ```

use crate::device::{DeviceDescriptor, DeviceRegistry, DeviceState};
use crate::error::{Result, SimulatorError};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub devices: Vec<FixtureDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDevice {
    #[serde(flatten)]
    pub descriptor: DeviceDescriptor,
    /// Initial component state, keyed by component key.
    #[serde(default)]
    pub state: DeviceState,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with empty initial state.
    pub fn with_device(self, descriptor: DeviceDescriptor) -> Self {
        self.with_device_state(descriptor, DeviceState::new())
    }

    pub fn with_device_state(mut self, descriptor: DeviceDescriptor, state: DeviceState) -> Self {
        self.devices.push(FixtureDevice { descriptor, state });
        self
    }

    /// Load a fixture from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimulatorError::FixtureIo {
            path: path.display().to_string(),
            source,
        })?;
        let fixture = Self::from_json(&content)?;
        info!(
            "[Router] Loaded {} device(s) from {}",
            fixture.devices.len(),
            path.display()
        );
        Ok(fixture)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Self = serde_json::from_str(json)?;
        fixture.validate()?;
        Ok(fixture)
    }

    fn validate(&self) -> Result<()> {
        for device in &self.devices {
            let descriptor = &device.descriptor;
            if descriptor.name.trim().is_empty() {
                return Err(SimulatorError::InvalidFixture(
                    "device name must not be empty".to_string(),
                ));
            }
            if descriptor.name.contains('/') {
                return Err(SimulatorError::InvalidFixture(format!(
                    "device name '{}' must not contain '/'",
                    descriptor.name
                )));
            }
            if descriptor.mac().len() != 12 {
                return Err(SimulatorError::InvalidFixture(format!(
                    "device '{}' has malformed MAC address '{}'",
                    descriptor.name, descriptor.mac_address
                )));
            }
        }
        Ok(())
    }

    /// Split into the immutable registry and the initial state per device.
    pub fn into_parts(self) -> Result<(DeviceRegistry, HashMap<String, DeviceState>)> {
        self.validate()?;
        let mut descriptors = Vec::with_capacity(self.devices.len());
        let mut states = HashMap::new();
        for device in self.devices {
            if !device.state.is_empty() {
                states.insert(device.descriptor.name.clone(), device.state);
            }
            descriptors.push(device.descriptor);
        }
        Ok((DeviceRegistry::new(descriptors)?, states))
    }
}
