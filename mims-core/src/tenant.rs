//! Core multi-tenant types for MIMS-Graph.
//!
//! A tenant is a logical owner of graph data. Each tenant maps to one Dgraph
//! namespace, and every namespace is written as a hex token (`0x0`, `0x1`, ...).
//! Absence of a namespace always means the default namespace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MimsError;

/// Tenant id that always maps to the default namespace.
pub const DEFAULT_TENANT_ID: &str = "default";

/// Tenant id reserved for test suites.
pub const TEST_TENANT_ID: &str = "test-tenant";

/// The default namespace sentinel.
pub const DEFAULT_NAMESPACE: &str = "0x0";

/// The namespace reserved for the test tenant.
pub const TEST_NAMESPACE: &str = "0x1";

const INVALID_TENANT_CHARS: [char; 8] = [' ', '\t', '\n', '\r', '/', '\\', '?', '#'];

/// A tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    /// Validate and wrap a tenant id.
    ///
    /// Rejects empty ids and ids containing whitespace, path separators,
    /// `?` or `#`, since tenant ids travel in headers and URL segments.
    pub fn parse(raw: impl Into<String>) -> Result<Self, MimsError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(MimsError::bad_request("Tenant ID cannot be empty").with_code("INVALID_TENANT_ID"));
        }
        if let Some(c) = raw.chars().find(|c| INVALID_TENANT_CHARS.contains(c)) {
            return Err(
                MimsError::bad_request(format!("Tenant ID cannot contain {c:?}"))
                    .with_code("INVALID_TENANT_ID"),
            );
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default_tenant(&self) -> bool {
        self.0 == DEFAULT_TENANT_ID
    }

    /// Test tenants are `test-tenant`, `test`, `testing`, or anything prefixed `test-`.
    pub fn is_test_tenant(&self) -> bool {
        matches!(self.0.as_str(), "test" | "testing") || self.0.starts_with("test-")
    }

    /// Production tenants are `default`, `production`, `prod` and `main`.
    pub fn is_production_tenant(&self) -> bool {
        matches!(self.0.as_str(), DEFAULT_TENANT_ID | "production" | "prod" | "main")
    }

    /// The one tenant id reserved for the test namespace.
    pub fn is_reserved_test_tenant(&self) -> bool {
        self.0 == TEST_TENANT_ID
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Dgraph namespace token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn default_namespace() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }

    pub fn test_namespace() -> Self {
        Self(TEST_NAMESPACE.to_string())
    }

    /// Namespace for a numeric index, written as lowercase hex.
    pub fn from_index(index: u64) -> Self {
        Self(format!("0x{index:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_NAMESPACE
    }

    pub fn is_test(&self) -> bool {
        self.0 == TEST_NAMESPACE
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NamespaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// True when `namespace` is absent, empty, or the default sentinel.
pub fn is_default_namespace(namespace: Option<&str>) -> bool {
    match namespace {
        None => true,
        Some(ns) => ns.is_empty() || ns == DEFAULT_NAMESPACE,
    }
}

/// Context carried with every tenant-scoped operation.
///
/// Derived per request from headers or session data and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub namespace: Option<NamespaceId>,
}

impl TenantContext {
    /// Convenience constructor from a string, bound to no explicit namespace.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<NamespaceId>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&NamespaceId> {
        self.namespace.as_ref()
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT_ID)
    }
}
