//! Flat method table shared by both RPC surfaces.
//!
//! The `/rpc` envelope endpoint and the `/rpc/<Method>` compatibility paths
//! both resolve through the same [`MethodTable`], so a method behaves the
//! same whichever way it is reached.

use super::envelope::RpcError;
use crate::components;
use crate::dispatch::DeviceContext;
use serde_json::Value;
use std::collections::HashMap;

/// Signature of every RPC method handler.
pub type MethodHandler = fn(&DeviceContext<'_>, &Value) -> Result<Value, RpcError>;

/// String-keyed table of RPC methods.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<&'static str, MethodHandler>,
}

impl MethodTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table with every component's methods registered.
    pub fn with_components() -> Self {
        let mut table = Self::new();
        components::register_all(&mut table);
        table
    }

    pub fn register(&mut self, method: &'static str, handler: MethodHandler) {
        self.methods.insert(method, handler);
    }

    pub fn lookup(&self, method: &str) -> Option<MethodHandler> {
        self.methods.get(method).copied()
    }
}
