use std::sync::Arc;

use mims_dgraph::{CapabilityCache, NamespaceGuard, TenantLifecycleManager};

/// Shared handler state: one capability cache per process, and the guard and
/// lifecycle manager built on top of it.
#[derive(Clone)]
pub struct MimsAxumState {
    pub capabilities: Arc<CapabilityCache>,
    pub guard: NamespaceGuard,
    pub lifecycle: Arc<TenantLifecycleManager>,
}

impl MimsAxumState {
    pub fn new(capabilities: Arc<CapabilityCache>) -> Self {
        Self {
            guard: NamespaceGuard::new(Arc::clone(&capabilities)),
            lifecycle: Arc::new(TenantLifecycleManager::new(Arc::clone(&capabilities))),
            capabilities,
        }
    }
}
