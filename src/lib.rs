//! Shelly device fleet simulator.
//!
//! Serves a fleet of simulated Shelly devices over HTTP, each under
//! `/devices/<name>/`. Legacy devices answer the path-style REST dialect,
//! newer devices the JSON-RPC dialect; both share one state store.

pub mod components;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod fixture;
pub mod legacy;
pub mod rpc;
pub mod server;

pub use config::{Cli, SimulatorConfig};
pub use device::{DeviceDescriptor, DeviceRegistry, Generation, StateStore};
pub use error::{Result, SimulatorError};
pub use fixture::Fixture;
pub use server::{Simulator, SimulatorHandle};
