use std::sync::Arc;

use axum::http::{HeaderName, Request};
use axum::Router;
use mims_core::MimsConfigSnapshot;
use mims_dgraph::{CapabilityCache, DgraphSettings, DgraphTransport, HttpTransport};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;
use crate::MimsAxumState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        uuid::Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}

pub struct MimsApp {
    pub state: MimsAxumState,
    pub router: Router<()>,
}

impl Clone for MimsApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
        }
    }
}

impl MimsApp {
    pub fn new(capabilities: Arc<CapabilityCache>) -> Self {
        let state = MimsAxumState::new(capabilities);
        let header = HeaderName::from_static(REQUEST_ID_HEADER);
        let router = routes::router(state.clone())
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(header, UuidRequestId));
        Self { state, router }
    }

    /// Build the whole stack from configuration, talking to Dgraph over HTTP.
    pub fn from_config(config: &MimsConfigSnapshot) -> anyhow::Result<Self> {
        let settings = DgraphSettings::from_config(config);
        let transport: Arc<dyn DgraphTransport> = Arc::new(HttpTransport::new(settings.clone())?);
        Ok(Self::new(Arc::new(CapabilityCache::new(transport, settings))))
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Detect capabilities once, then serve.
    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        self.state.capabilities.initialize().await;
        if let Some(snapshot) = self.state.capabilities.capabilities() {
            info!(mode = %snapshot.mode(), "MIMS-Graph capability layer ready");
        }

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
