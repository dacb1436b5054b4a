//! Dispatcher for RPC-generation devices.
//!
//! Two surfaces share one [`MethodTable`]:
//! - `POST /rpc` with an `{id, method, params}` envelope,
//! - `GET|POST /rpc/<Method>` with parameters in the query string and/or a
//!   JSON body, answered without an envelope.

use super::envelope::{METHOD_NOT_FOUND, RpcError, RpcRequest, RpcResponse};
use super::methods::MethodTable;
use super::params;
use crate::dispatch::{DeviceContext, DeviceRequest, DeviceResponse, GenerationDispatcher};
use axum::http::Method;
use log::{debug, warn};
use serde_json::{Value, json};

const RPC_PATH: &str = "/rpc";

pub struct RpcDispatcher {
    table: MethodTable,
}

impl RpcDispatcher {
    pub fn new(table: MethodTable) -> Self {
        Self { table }
    }

    /// Run one method against the device.
    pub fn call(
        &self,
        ctx: &DeviceContext<'_>,
        method: &str,
        params: &Value,
    ) -> Result<Value, RpcError> {
        let handler = self
            .table
            .lookup(method)
            .ok_or_else(|| RpcError::method_not_found(method))?;
        debug!("[RPC] {} <- {} {}", ctx.device_name(), method, params);
        handler(ctx, params)
    }

    fn handle_envelope(&self, ctx: &DeviceContext<'_>, request: &DeviceRequest) -> DeviceResponse {
        let envelope = match RpcRequest::decode(&request.body) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!("[RPC] {} rejected envelope: {}", ctx.device_name(), error.message);
                return envelope_response(RpcResponse::error(0, error));
            }
        };

        let response = match self.call(ctx, &envelope.method, &envelope.params()) {
            Ok(result) => RpcResponse::result(envelope.id, result),
            Err(error) => {
                if error.code == METHOD_NOT_FOUND {
                    warn!("[RPC] {} unknown method {}", ctx.device_name(), envelope.method);
                }
                RpcResponse::error(envelope.id, error)
            }
        }
        .addressed(ctx.device.device_id(), envelope.src.clone());

        let not_found = response
            .error
            .as_ref()
            .is_some_and(|error| error.code == METHOD_NOT_FOUND);
        let body = serde_json::to_value(&response).unwrap_or(Value::Null);
        if not_found {
            DeviceResponse::not_found(body)
        } else {
            DeviceResponse::ok(body)
        }
    }

    fn handle_direct(
        &self,
        ctx: &DeviceContext<'_>,
        method: &str,
        request: &DeviceRequest,
    ) -> DeviceResponse {
        let params = params::from_parts(&request.body, request.query_pairs());
        match self.call(ctx, method, &params) {
            Ok(result) => DeviceResponse::ok(result),
            Err(error) if error.code == METHOD_NOT_FOUND => {
                warn!("[RPC] {} unknown method {}", ctx.device_name(), method);
                DeviceResponse::not_found(error_body(&error))
            }
            Err(error) => DeviceResponse::ok(error_body(&error)),
        }
    }
}

impl Default for RpcDispatcher {
    fn default() -> Self {
        Self::new(MethodTable::with_components())
    }
}

fn envelope_response(response: RpcResponse) -> DeviceResponse {
    DeviceResponse::ok(serde_json::to_value(&response).unwrap_or(Value::Null))
}

fn error_body(error: &RpcError) -> Value {
    json!({ "code": error.code, "message": error.message })
}

impl GenerationDispatcher for RpcDispatcher {
    fn dispatch(&self, ctx: &DeviceContext<'_>, request: &DeviceRequest) -> DeviceResponse {
        let path = request.path.trim_end_matches('/');
        if path == RPC_PATH && request.method == Method::POST {
            return self.handle_envelope(ctx, request);
        }
        if let Some(method) = path.strip_prefix("/rpc/")
            && !method.is_empty()
            && (request.method == Method::GET || request.method == Method::POST)
        {
            return self.handle_direct(ctx, method, request);
        }
        warn!(
            "[RPC] {} has no endpoint {} {}",
            ctx.device_name(),
            request.method,
            request.path
        );
        DeviceResponse::unknown_endpoint(&request.method, &request.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tests::{context, fixture};
    use axum::http::StatusCode;

    fn post_rpc(body: &str) -> DeviceRequest {
        DeviceRequest::new(Method::POST, "/rpc").with_body(body.to_string())
    }

    #[test]
    fn test_envelope_result() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let dispatcher = RpcDispatcher::default();

        let response = dispatcher.dispatch(
            &ctx,
            &post_rpc(r#"{"id":5,"src":"cli","method":"Switch.Set","params":{"id":0,"on":true}}"#),
        );
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["id"], json!(5));
        assert_eq!(response.body["dst"], json!("cli"));
        assert_eq!(response.body["src"], json!("shellyplusplugs-aabbccddeeff"));
        assert_eq!(response.body["result"], json!({"was_on": false}));
    }

    #[test]
    fn test_unknown_method_is_404_with_rpc_error() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let response = RpcDispatcher::default()
            .dispatch(&ctx, &post_rpc(r#"{"id":3,"method":"Nonexistent.Thing"}"#));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body["id"], json!(3));
        assert_eq!(response.body["error"]["code"], json!(-32601));
    }

    #[test]
    fn test_malformed_envelope_is_invalid_request() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let response = RpcDispatcher::default().dispatch(&ctx, &post_rpc("{oops"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["id"], json!(0));
        assert_eq!(response.body["error"]["code"], json!(-32600));
    }

    #[test]
    fn test_invalid_params_stay_200() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let response = RpcDispatcher::default().dispatch(
            &ctx,
            &post_rpc(r#"{"id":1,"method":"Switch.Set","params":{"id":"x"}}"#),
        );
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["error"]["code"], json!(-32602));
    }

    #[test]
    fn test_direct_path_matches_envelope_effects() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let dispatcher = RpcDispatcher::default();

        let request = DeviceRequest::new(Method::GET, "/rpc/Switch.Set").with_query(vec![
            ("id".to_string(), "0".to_string()),
            ("on".to_string(), "true".to_string()),
        ]);
        let response = dispatcher.dispatch(&ctx, &request);
        assert_eq!(response, DeviceResponse::ok(json!({"was_on": false})));

        let response = dispatcher.dispatch(
            &ctx,
            &post_rpc(r#"{"id":2,"method":"Switch.GetStatus","params":{"id":0}}"#),
        );
        assert_eq!(response.body["result"], json!({"output": true}));
    }

    #[test]
    fn test_direct_post_with_bad_body_defaults_off() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        crate::components::switch::set(&store, "Plug", 0, true);

        let request = DeviceRequest::new(Method::POST, "/rpc/Switch.Set").with_body("not json");
        let response = RpcDispatcher::default().dispatch(&ctx, &request);
        assert_eq!(response, DeviceResponse::ok(json!({"was_on": true})));
        assert!(!store.read("Plug", "switch:0").output());
    }

    #[test]
    fn test_direct_unknown_method_is_404() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let request = DeviceRequest::new(Method::GET, "/rpc/Nonexistent.Thing");
        let response = RpcDispatcher::default().dispatch(&ctx, &request);
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body["code"], json!(-32601));
    }

    #[test]
    fn test_legacy_paths_are_unknown() {
        let (registry, store) = fixture();
        let ctx = context(&registry, &store, "Plug");
        let dispatcher = RpcDispatcher::default();
        for path in ["/relay/0", "/shelly", "/rpc/", ""] {
            let response = dispatcher.dispatch(&ctx, &DeviceRequest::new(Method::GET, path));
            assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", path);
        }
        let response = dispatcher.dispatch(&ctx, &DeviceRequest::new(Method::GET, "/rpc"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
