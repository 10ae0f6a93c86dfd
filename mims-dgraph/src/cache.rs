use std::sync::Arc;

use mims_core::{CapabilitySnapshot, NamespaceId, TenantContext};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::TenantClient;
use crate::detector::CapabilityDetector;
use crate::settings::DgraphSettings;
use crate::transport::DgraphTransport;

/// Process-wide holder of the latest capability snapshot and the factory for
/// namespace-bound clients.
///
/// Construct one per process and share it behind an `Arc`. Client construction
/// never fails: without namespace support every client is bound to the
/// default namespace.
pub struct CapabilityCache {
    detector: CapabilityDetector,
    transport: Arc<dyn DgraphTransport>,
    settings: DgraphSettings,
    snapshot: RwLock<Option<CapabilitySnapshot>>,
    // Serialises detection so concurrent callers share one probe run.
    detection: Mutex<()>,
}

impl CapabilityCache {
    pub fn new(transport: Arc<dyn DgraphTransport>, settings: DgraphSettings) -> Self {
        Self {
            detector: CapabilityDetector::new(Arc::clone(&transport), &settings),
            transport,
            settings,
            snapshot: RwLock::new(None),
            detection: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &DgraphSettings {
        &self.settings
    }

    pub fn transport(&self) -> Arc<dyn DgraphTransport> {
        Arc::clone(&self.transport)
    }

    /// Run detection once. Later calls return immediately.
    pub async fn initialize(&self) {
        if self.is_initialized() {
            return;
        }
        let _guard = self.detection.lock().await;
        if self.is_initialized() {
            return;
        }
        let snapshot = self.detector.detect_capabilities().await;
        *self.snapshot.write() = Some(snapshot);
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Last known snapshot, without probing.
    pub fn capabilities(&self) -> Option<CapabilitySnapshot> {
        self.snapshot.read().clone()
    }

    /// Current snapshot, re-detecting lazily once the detector's TTL has passed.
    ///
    /// Call this rather than [`initialize`](Self::initialize) before consulting
    /// the guard, so an expired snapshot is never enforced.
    pub async fn current(&self) -> CapabilitySnapshot {
        let _guard = self.detection.lock().await;
        let snapshot = self.detector.detect_capabilities().await;
        *self.snapshot.write() = Some(snapshot.clone());
        snapshot
    }

    pub fn is_multi_tenant_supported(&self) -> bool {
        self.snapshot
            .read()
            .as_ref()
            .map(CapabilitySnapshot::namespaces_supported)
            .unwrap_or(false)
    }

    /// Forget the snapshot and detect again.
    pub async fn refresh(&self) {
        {
            let _guard = self.detection.lock().await;
            *self.snapshot.write() = None;
            self.detector.clear();
        }
        self.initialize().await;
    }

    /// Client bound to `namespace` when namespaces are supported, otherwise to
    /// the default namespace.
    pub async fn create_tenant(&self, namespace: Option<NamespaceId>) -> TenantClient {
        let snapshot = self.current().await;
        let requested = namespace.filter(|ns| !ns.is_default());

        let bound = match requested {
            Some(ns) if snapshot.namespaces_supported() => Some(ns),
            Some(ns) => {
                warn!(
                    namespace = %ns,
                    mode = %snapshot.mode(),
                    "namespaces not supported; binding client to the default namespace"
                );
                None
            }
            None => None,
        };

        debug!(namespace = ?bound, "created tenant client");
        TenantClient::new(Arc::clone(&self.transport), &self.settings, bound)
            .with_enterprise_detected(snapshot.enterprise_detected())
    }

    pub async fn create_tenant_from_context(&self, ctx: Option<&TenantContext>) -> TenantClient {
        self.create_tenant(ctx.and_then(|c| c.namespace().cloned())).await
    }

    pub async fn create_default_tenant(&self) -> TenantClient {
        self.create_tenant(None).await
    }

    pub async fn create_test_tenant(&self) -> TenantClient {
        self.create_tenant(Some(NamespaceId::test_namespace())).await
    }
}
