//! mims-axum: Axum adapter for the MIMS-Graph capability layer.
//!
//! Exposes the capability status endpoint, tenant administration routes and a
//! tenant-aware GraphQL proxy, and renders every error as
//! `{error, message, details}`.

pub mod app;
pub mod routes;
pub mod state;
pub mod tenant;
mod error;
pub use error::MimsAxumError;
pub use state::MimsAxumState;

pub use app::MimsApp;
pub use tenant::tenant_from_headers;
