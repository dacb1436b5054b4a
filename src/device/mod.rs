mod registry;
mod state;

pub use registry::{DeviceDescriptor, DeviceRegistry, Generation};
pub use state::{
    ComponentState, CreateError, DeviceState, StateStore, component_ids, component_key,
    parse_component_key,
};
