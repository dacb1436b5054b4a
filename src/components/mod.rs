//! Component method handlers.
//!
//! Each module owns one component family: its state helpers (shared with the
//! legacy dialect where the family exists there) and the RPC methods it
//! registers in the [`MethodTable`].

pub mod cover;
pub mod input;
pub mod light;
pub mod network;
pub mod script;
pub mod switch;
pub mod system;

use crate::rpc::MethodTable;
use serde::Deserialize;

/// Firmware build reported by simulated RPC devices.
pub const FIRMWARE_ID: &str = "20241011-114455/1.4.4-g6d2a586";
pub const FIRMWARE_VERSION: &str = "1.4.4";
/// Firmware string reported by simulated legacy devices.
pub const LEGACY_FIRMWARE: &str = "20230913-112003/v1.14.0-gcb84623";

/// `{id}` parameters; the id defaults to `0` like on single-channel devices.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdParams {
    #[serde(default)]
    pub id: u64,
}

/// Register every component's methods.
pub(crate) fn register_all(table: &mut MethodTable) {
    system::register(table);
    switch::register(table);
    cover::register(table);
    light::register(table);
    input::register(table);
    script::register(table);
    network::register(table);
}
