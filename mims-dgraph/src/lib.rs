//! mims-dgraph: adaptive multi-tenancy over Dgraph.
//!
//! Detects whether the connected cluster runs Enterprise with working
//! namespace isolation, caches the answer, and gates namespace-scoped work
//! behind it. Reads degrade to the default namespace; explicit namespace
//! operations fail with a typed error.

pub mod backup;
pub mod cache;
pub mod client;
pub mod detector;
pub mod guard;
pub mod lifecycle;
pub mod schema;
pub mod settings;
pub mod transport;

pub use backup::{BackupData, BackupFile, BackupMetadata};
pub use cache::CapabilityCache;
pub use client::TenantClient;
pub use detector::{CapabilityDetector, LicenseInfo};
pub use guard::{NamespaceGuard, Validation};
pub use lifecycle::{
    generate_namespace_id, DeletionReport, EntityDeletion, EntityKind, RestoreSummary,
    TenantLifecycleManager, TenantRecord,
};
pub use schema::{load_schema_from_file, SchemaDocument};
pub use settings::{DgraphSettings, Endpoint};
pub use transport::{DgraphRequest, DgraphTransport, HttpResponse, HttpTransport, TransportError};
