#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mims_dgraph::{
    CapabilityCache, DgraphRequest, DgraphSettings, DgraphTransport, Endpoint, HttpResponse,
    TransportError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub type Reply = Result<HttpResponse, TransportError>;
type Handler = Box<dyn Fn(&DgraphRequest) -> Reply + Send + Sync>;

/// In-memory transport that answers from a closure and records every request.
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<DgraphRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&DgraphRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// A cluster in `mode` whose data-plane endpoints (`/graphql`,
    /// `/admin/schema`) are answered by `data_plane`.
    pub fn cluster(
        mode: ClusterMode,
        data_plane: impl Fn(&DgraphRequest) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::new(move |req| match req.endpoint {
            Endpoint::Health | Endpoint::Admin | Endpoint::State => mode.control_plane(req),
            Endpoint::GraphQl | Endpoint::AdminSchema => data_plane(req),
        })
    }

    /// Like [`cluster`](Self::cluster), but the mode can be changed mid-test
    /// through the returned handle.
    pub fn switchable(
        initial: ClusterMode,
        data_plane: impl Fn(&DgraphRequest) -> Reply + Send + Sync + 'static,
    ) -> (Arc<Self>, Arc<Mutex<ClusterMode>>) {
        let mode = Arc::new(Mutex::new(initial));
        let current = Arc::clone(&mode);
        let transport = Self::new(move |req| match req.endpoint {
            Endpoint::Health | Endpoint::Admin | Endpoint::State => current.lock().control_plane(req),
            Endpoint::GraphQl | Endpoint::AdminSchema => data_plane(req),
        });
        (transport, mode)
    }

    pub fn requests(&self) -> Vec<DgraphRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.requests.lock().iter().filter(|r| r.endpoint == endpoint).count()
    }

    /// GraphQL documents sent to `/graphql`, in order.
    pub fn graphql_queries(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint == Endpoint::GraphQl)
            .filter_map(|r| r.query_text().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl DgraphTransport for ScriptedTransport {
    async fn send(&self, request: DgraphRequest) -> Result<HttpResponse, TransportError> {
        let reply = (self.handler)(&request);
        self.requests.lock().push(request);
        reply
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterMode {
    Unreachable,
    Oss,
    EnterpriseSingleTenant,
    EnterpriseMultiTenant,
}

impl ClusterMode {
    fn control_plane(&self, req: &DgraphRequest) -> Reply {
        match (self, req.endpoint) {
            (ClusterMode::Unreachable, _) => Err(connect_error("http://localhost:8080")),
            (ClusterMode::Oss, Endpoint::Health) => Ok(HttpResponse::ok(json!([
                { "instance": "alpha", "status": "healthy", "ee_features": [] }
            ]))),
            (_, Endpoint::Health) => Ok(HttpResponse::ok(json!([
                { "instance": "alpha", "status": "healthy", "ee_features": ["backup_restore", "multi_tenancy"] }
            ]))),
            (ClusterMode::EnterpriseMultiTenant, Endpoint::Admin) => {
                Ok(HttpResponse::ok(json!({ "data": { "health": [{ "instance": "alpha", "status": "healthy" }] } })))
            }
            (_, Endpoint::Admin) => Ok(HttpResponse::new(400, json!("Bad Request"))),
            (ClusterMode::Oss, _) => Ok(HttpResponse::ok(json!({ "license": { "enabled": false, "user": "" } }))),
            (_, _) => Ok(HttpResponse::ok(json!({
                "license": { "enabled": true, "user": "Acme Corp", "expiryTs": 1_900_000_000 }
            }))),
        }
    }
}

pub fn connect_error(url: &str) -> TransportError {
    TransportError::Connect {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

pub fn timeout_error(url: &str) -> TransportError {
    TransportError::Timeout {
        url: url.to_string(),
        timeout: Duration::from_secs(30),
    }
}

pub fn graphql_data(data: Value) -> Reply {
    Ok(HttpResponse::ok(json!({ "data": data })))
}

pub fn no_data_plane(_: &DgraphRequest) -> Reply {
    graphql_data(json!({}))
}

pub fn cache_for(transport: Arc<ScriptedTransport>, settings: DgraphSettings) -> Arc<CapabilityCache> {
    Arc::new(CapabilityCache::new(transport, settings))
}
