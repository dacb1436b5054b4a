//! Roller/cover component.
//!
//! Movement commands are acknowledged without touching state; only
//! `Cover.GetStatus` reads the store, so fixtures decide what a cover
//! reports.

use super::IdParams;
use crate::device::component_key;
use crate::dispatch::DeviceContext;
use crate::rpc::{MethodTable, RpcError, params};
use log::info;
use serde::Deserialize;
use serde_json::Value;

pub const KIND: &str = "cover";

#[derive(Debug, Deserialize)]
struct GoToPositionParams {
    #[serde(default)]
    id: u64,
    pos: u8,
}

fn rpc_get_status(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    Ok(ctx
        .store
        .read(ctx.device_name(), &component_key(KIND, id))
        .as_value())
}

fn acknowledge(ctx: &DeviceContext<'_>, params: &Value, action: &str) -> Result<Value, RpcError> {
    let IdParams { id } = params::parse(params)?;
    info!("[RPC] {} cover:{} {}", ctx.device_name(), id, action);
    Ok(Value::Null)
}

fn rpc_open(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    acknowledge(ctx, params, "open")
}

fn rpc_close(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    acknowledge(ctx, params, "close")
}

fn rpc_stop(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    acknowledge(ctx, params, "stop")
}

fn rpc_go_to_position(ctx: &DeviceContext<'_>, params: &Value) -> Result<Value, RpcError> {
    let GoToPositionParams { id, pos } = params::parse(params)?;
    if pos > 100 {
        return Err(RpcError::invalid_params(format!("pos {} out of range", pos)));
    }
    info!("[RPC] {} cover:{} go to {}%", ctx.device_name(), id, pos);
    Ok(Value::Null)
}

pub(crate) fn register(table: &mut MethodTable) {
    table.register("Cover.GetStatus", rpc_get_status);
    table.register("Cover.Open", rpc_open);
    table.register("Cover.Close", rpc_close);
    table.register("Cover.Stop", rpc_stop);
    table.register("Cover.GoToPosition", rpc_go_to_position);
}
