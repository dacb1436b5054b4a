//! RPC dialect: envelopes, method table and dispatcher.

mod dispatcher;
mod envelope;
mod methods;
pub mod params;

pub use dispatcher::RpcDispatcher;
pub use envelope::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, NOT_FOUND, RESOURCE_EXHAUSTED, RpcError,
    RpcRequest, RpcResponse,
};
pub use methods::{MethodHandler, MethodTable};
