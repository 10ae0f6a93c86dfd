//! mims-core: framework-agnostic core for the MIMS-Graph backend.
//!
//! Holds the vocabulary every other crate speaks: tenants and namespaces,
//! capability snapshots, structured errors, and configuration.

pub mod capabilities;
pub mod config;
pub mod errors;
pub mod tenant;

pub use capabilities::{mode_for, CapabilitySnapshot, LicenseType, TenancyMode};
pub use config::{MimsConfig, MimsConfigSnapshot};
pub use errors::{CapabilityError, ErrorKind, MimsError};
pub use tenant::{
    is_default_namespace, NamespaceId, TenantContext, TenantId, DEFAULT_NAMESPACE,
    DEFAULT_TENANT_ID, TEST_NAMESPACE, TEST_TENANT_ID,
};
