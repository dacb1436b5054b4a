//! Transport-independent request model shared by the generation dispatchers.

use crate::device::{DeviceDescriptor, StateStore};
use axum::Json;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// The device a request is addressed to, plus the shared state it may touch.
pub struct DeviceContext<'a> {
    pub device: &'a DeviceDescriptor,
    pub store: &'a StateStore,
    /// Simulated wall clock. Frozen at simulator start so that status reads
    /// are repeatable.
    pub clock: DateTime<Utc>,
}

impl DeviceContext<'_> {
    /// Name under which the device's state is kept.
    pub fn device_name(&self) -> &str {
        &self.device.name
    }
}

/// A request with the `/devices/<name>` prefix already stripped.
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub method: Method,
    /// Remaining path, e.g. `/rpc` or `/relay/0`; empty when absent.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
}

impl DeviceRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// A JSON reply with its transport status.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl DeviceResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn not_found(body: Value) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body,
        }
    }

    /// 404 for a path the addressed device does not serve.
    pub fn unknown_endpoint(method: &Method, path: &str) -> Self {
        Self::not_found(json!({
            "error": "not_found",
            "message": format!("No endpoint {} {}", method, path),
        }))
    }
}

impl IntoResponse for DeviceResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// One protocol generation's request handling.
///
/// Implementations decode the generation's wire format, run the matching
/// component handler and encode the generation's response shape.
pub trait GenerationDispatcher: Send + Sync + 'static {
    fn dispatch(&self, ctx: &DeviceContext<'_>, request: &DeviceRequest) -> DeviceResponse;
}
