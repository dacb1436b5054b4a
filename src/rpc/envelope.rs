//! Request/response envelopes of the RPC dialect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC "invalid request" code.
pub const INVALID_REQUEST: i32 = -32600;
/// JSON-RPC "method not found" code.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC "invalid params" code.
pub const INVALID_PARAMS: i32 = -32602;
/// Device-specific "argument value not found" code (unknown component id).
pub const NOT_FOUND: i32 = -105;
/// Device-specific "resource exhausted" code (no free component id).
pub const RESOURCE_EXHAUSTED: i32 = -108;

/// Inbound `{id, method, params}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    /// Source tag echoed back as `dst`, as sent by some clients.
    #[serde(default)]
    pub src: Option<String>,
}

impl RpcRequest {
    /// Decode an envelope from a raw body.
    pub fn decode(body: &[u8]) -> Result<Self, RpcError> {
        serde_json::from_slice(body).map_err(|e| RpcError::invalid_request(e.to_string()))
    }

    /// Parameters as a JSON object (`{}` when absent or `null`).
    pub fn params(&self) -> Value {
        match &self.params {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(params) => params.clone(),
        }
    }
}

/// Structured RPC failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("No handler for {}", method))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail))
    }

    pub fn resource_exhausted(detail: impl std::fmt::Display) -> Self {
        Self::new(RESOURCE_EXHAUSTED, format!("Resource exhausted: {}", detail))
    }

    pub fn not_found(argument: &str, value: impl std::fmt::Display) -> Self {
        Self::new(
            NOT_FOUND,
            format!("Argument '{}', value {} not found!", argument, value),
        )
    }
}

/// Outbound `{id, result}` / `{id, error}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn result(id: i64, result: Value) -> Self {
        Self {
            id,
            src: None,
            dst: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: i64, error: RpcError) -> Self {
        Self {
            id,
            src: None,
            dst: None,
            result: None,
            error: Some(error),
        }
    }

    /// Tag the response with the answering device and the caller's source.
    pub fn addressed(mut self, device_id: String, dst: Option<String>) -> Self {
        self.src = Some(device_id);
        self.dst = dst;
        self
    }
}
