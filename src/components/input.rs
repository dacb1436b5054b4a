use super::IdParams;
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use serde_json::{Value, json};

// Inputs are not simulated; every input reads as an idle switch-type input.

fn rpc_get_status(_ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    Ok(json!({ "id": id, "state": false }))
}

fn rpc_get_config(_ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    Ok(json!({
        "id": id,
        "name": null,
        "type": "switch",
        "enable": true,
        "invert": false,
        "factory_reset": true,
    }))
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Input.GetStatus", rpc_get_status);
    table.register("Input.GetConfig", rpc_get_config);
}
