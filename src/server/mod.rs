//! HTTP transport for the simulated fleet.
//!
//! One listener serves every device under `/devices/<name>/...`. Each
//! request is resolved to its device, handed to the dispatcher of the
//! device's protocol generation and answered with the dispatcher's status
//! and JSON body. The server runs as a tokio task and is stopped through
//! the returned [`SimulatorHandle`].

mod router;

pub use router::{DeviceRouter, Route, RouteError, device_path};

use crate::config::SimulatorConfig;
use crate::device::{DeviceRegistry, Generation, StateStore};
use crate::dispatch::{DeviceContext, DeviceRequest, DeviceResponse, GenerationDispatcher};
use crate::error::{Result, SimulatorError};
use crate::fixture::Fixture;
use crate::legacy::LegacyDispatcher;
use crate::rpc::RpcDispatcher;
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, Uri};
use axum::routing::get;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Everything a request handler needs, shared between request tasks.
struct Shared {
    registry: Arc<DeviceRegistry>,
    store: Arc<StateStore>,
    rpc: RpcDispatcher,
    legacy: LegacyDispatcher,
    clock: DateTime<Utc>,
}

impl Shared {
    fn dispatcher(&self, generation: Generation) -> &dyn GenerationDispatcher {
        match generation {
            Generation::Legacy => &self.legacy,
            Generation::Current => &self.rpc,
        }
    }

    fn handle(&self, method: Method, uri: &Uri, body: Bytes) -> DeviceResponse {
        let route = match DeviceRouter::new(&self.registry).resolve(uri.path()) {
            Ok(route) => route,
            Err(err) => {
                debug!("[Router] {} {} not routed: {:?}", method, uri, err);
                return err.into_response();
            }
        };

        let query = match Query::<Vec<(String, String)>>::try_from_uri(uri) {
            Ok(Query(pairs)) => pairs,
            Err(e) => {
                debug!("[Router] Ignoring undecodable query of {}: {}", uri, e);
                Vec::new()
            }
        };
        let request = DeviceRequest::new(method, route.rest)
            .with_query(query)
            .with_body(body);
        let ctx = DeviceContext {
            device: route.device,
            store: &self.store,
            clock: self.clock,
        };
        let response = self
            .dispatcher(route.device.protocol_generation)
            .dispatch(&ctx, &request);
        debug!(
            "[Router] {} {} {} -> {}",
            route.device.name, request.method, request.path, response.status
        );
        response
    }

    fn fleet(&self) -> Value {
        let devices: Vec<Value> = self
            .registry
            .devices()
            .map(|device| {
                json!({
                    "name": device.name,
                    "id": device.device_id(),
                    "mac": device.mac(),
                    "model": device.model,
                    "type": device.device_type_code,
                    "gen": device.protocol_generation.number(),
                    "path": device_path(&device.name),
                })
            })
            .collect();
        json!({ "devices": devices })
    }
}

async fn device_request(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> DeviceResponse {
    shared.handle(method, &uri, body)
}

async fn list_devices(State(shared): State<Arc<Shared>>) -> Json<Value> {
    Json(shared.fleet())
}

/// A simulator built from a fixture, not yet listening.
pub struct Simulator {
    shared: Arc<Shared>,
}

impl Simulator {
    pub fn new(fixture: Fixture) -> Result<Self> {
        let (registry, initial) = fixture.into_parts()?;
        let store = StateStore::seed(&registry, &initial);
        info!("[Router] Simulating {} device(s)", registry.len());
        Ok(Self {
            shared: Arc::new(Shared {
                registry: Arc::new(registry),
                store: Arc::new(store),
                rpc: RpcDispatcher::default(),
                legacy: LegacyDispatcher,
                clock: Utc::now(),
            }),
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.shared.registry
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.shared.store
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/devices", get(list_devices))
            .fallback(device_request)
            .with_state(self.shared.clone())
    }

    /// Bind the listener and serve in a background task.
    pub async fn start(self, config: SimulatorConfig) -> Result<SimulatorHandle> {
        let listener = tokio::net::TcpListener::bind(config.bind)
            .await
            .map_err(|source| SimulatorError::BindFailed {
                addr: config.bind.to_string(),
                source,
            })?;
        let addr = listener.local_addr()?;
        let app = self.router();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("[Server] Listening on http://{}", addr);
        Ok(SimulatorHandle {
            addr,
            shared: self.shared,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A running simulator. Dropping the handle also stops the server.
pub struct SimulatorHandle {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl SimulatorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL of one device, e.g. `http://127.0.0.1:8080/devices/Kitchen%20Light`.
    pub fn device_url(&self, name: &str) -> String {
        format!("{}{}", self.base_url(), device_path(name))
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.shared.registry
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.shared.store
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Ok(())) => {
                info!("[Server] Stopped listener on {}", self.addr);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("[Server] Listener on {} failed: {}", self.addr, e);
                Err(e.into())
            }
            Err(e) => Err(SimulatorError::ServerFailed(e.to_string())),
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ComponentState, DeviceDescriptor, DeviceState};
    use axum::http::StatusCode;

    fn simulator() -> Simulator {
        let mut state = DeviceState::new();
        let mut switch = ComponentState::new();
        switch.insert("output", true);
        state.insert("switch:0".to_string(), switch);

        let fixture = Fixture::new()
            .with_device_state(
                DeviceDescriptor {
                    name: "Kitchen Light".to_string(),
                    mac_address: "AABBCCDDEE01".to_string(),
                    model: "SNSW-001X16EU".to_string(),
                    device_type_code: "PlusLight".to_string(),
                    protocol_generation: Generation::Current,
                    platform: "esp32".to_string(),
                },
                state,
            )
            .with_device(DeviceDescriptor {
                name: "Porch".to_string(),
                mac_address: "112233445566".to_string(),
                model: "SHSW-1".to_string(),
                device_type_code: "SHSW-1".to_string(),
                protocol_generation: Generation::Legacy,
                platform: "esp8266".to_string(),
            });
        Simulator::new(fixture).unwrap()
    }

    #[test]
    fn test_fixture_state_is_seeded() {
        let simulator = simulator();
        assert!(simulator.store().read("Kitchen Light", "switch:0").output());
        assert_eq!(simulator.registry().len(), 2);
    }

    #[test]
    fn test_dispatch_by_generation() {
        let simulator = simulator();
        let shared = &simulator.shared;

        let uri: Uri = "/devices/kitchen%20light/rpc/Switch.GetStatus?id=0".parse().unwrap();
        let response = shared.handle(Method::GET, &uri, Bytes::new());
        assert_eq!(response, DeviceResponse::ok(json!({"output": true})));

        let uri: Uri = "/devices/Porch/relay/0?turn=on".parse().unwrap();
        let response = shared.handle(Method::GET, &uri, Bytes::new());
        assert_eq!(response.body["ison"], json!(true));

        let uri: Uri = "/devices/Porch/rpc/Switch.GetStatus".parse().unwrap();
        let response = shared.handle(Method::GET, &uri, Bytes::new());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unknown_device_is_404() {
        let simulator = simulator();
        let uri: Uri = "/devices/Garage/rpc".parse().unwrap();
        let response = simulator.shared.handle(Method::POST, &uri, Bytes::new());
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_fleet_listing() {
        let simulator = simulator();
        let fleet = simulator.shared.fleet();
        assert_eq!(fleet["devices"][0]["path"], json!("/devices/Kitchen%20Light"));
        assert_eq!(fleet["devices"][1]["gen"], json!(1));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let handle = simulator().start(SimulatorConfig::default()).await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        assert!(handle.device_url("Kitchen Light").ends_with("/devices/Kitchen%20Light"));
        handle.shutdown().await.unwrap();
    }
}
