//! Namespace guard.
//!
//! Reads never fail on capability grounds (see [`CapabilityCache::create_tenant`]),
//! but an operation that explicitly names a non-default namespace is refused
//! loudly when namespace support is not confirmed.
//!
//! [`CapabilityCache::create_tenant`]: crate::cache::CapabilityCache::create_tenant

use std::sync::Arc;

use mims_core::{
    is_default_namespace, mode_for, CapabilityError, CapabilitySnapshot, NamespaceId, TenantContext,
};
use tracing::{debug, warn};

use crate::cache::CapabilityCache;
use crate::transport::DgraphRequest;

/// Absent, empty and default namespaces bypass every capability check.
pub fn is_namespace_exception(namespace: Option<&str>) -> bool {
    is_default_namespace(namespace)
}

pub fn check_namespace_support(
    snapshot: Option<&CapabilitySnapshot>,
    operation: &str,
    namespace: Option<&str>,
) -> Result<(), CapabilityError> {
    if is_namespace_exception(namespace) {
        return Ok(());
    }
    match snapshot {
        Some(s) if s.namespaces_supported() => Ok(()),
        _ => Err(CapabilityError::namespace_not_supported(
            operation,
            namespace,
            snapshot.is_some_and(CapabilitySnapshot::enterprise_detected),
        )),
    }
}

pub fn check_enterprise(
    snapshot: Option<&CapabilitySnapshot>,
    operation: &str,
) -> Result<(), CapabilityError> {
    match snapshot {
        Some(s) if s.enterprise_detected() => Ok(()),
        _ => Err(CapabilityError::enterprise_not_available(operation, mode_for(snapshot))),
    }
}

/// Validation policy over the shared capability snapshot.
#[derive(Clone)]
pub struct NamespaceGuard {
    capabilities: Arc<CapabilityCache>,
}

impl NamespaceGuard {
    pub fn new(capabilities: Arc<CapabilityCache>) -> Self {
        Self { capabilities }
    }

    pub fn require_namespace_support(
        &self,
        operation: &str,
        namespace: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let snapshot = self.capabilities.capabilities();
        check_namespace_support(snapshot.as_ref(), operation, namespace).inspect_err(|err| {
            warn!(operation, namespace = ?namespace, mode = %err.current_mode(), "namespace operation refused");
        })
    }

    pub fn require_enterprise(&self, operation: &str) -> Result<(), CapabilityError> {
        let snapshot = self.capabilities.capabilities();
        check_enterprise(snapshot.as_ref(), operation).inspect_err(|err| {
            warn!(operation, mode = %err.current_mode(), "enterprise operation refused");
        })
    }

    /// Run at the top of every operation that accepts a namespace.
    pub fn check(&self, operation: &str, namespace: Option<&NamespaceId>) -> Result<(), CapabilityError> {
        self.require_namespace_support(operation, namespace.map(NamespaceId::as_str))
    }

    pub fn check_context(&self, operation: &str, ctx: &TenantContext) -> Result<(), CapabilityError> {
        self.check(operation, ctx.namespace())
    }
}

/// How a namespace-scoped request is validated before it is built.
pub enum Validation<'a> {
    Guarded(&'a NamespaceGuard),
    /// Only for the detector's own namespace probe, which runs before any
    /// snapshot exists.
    CapabilityProbe,
}

impl Validation<'_> {
    pub fn scope(
        &self,
        operation: &str,
        request: DgraphRequest,
        namespace: Option<NamespaceId>,
    ) -> Result<DgraphRequest, CapabilityError> {
        match self {
            Validation::Guarded(guard) => guard.check(operation, namespace.as_ref())?,
            Validation::CapabilityProbe => {
                debug!(operation, namespace = ?namespace, "namespace check skipped for capability probe")
            }
        }
        Ok(request.bound_to(namespace))
    }
}
