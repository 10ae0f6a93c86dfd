use std::path::PathBuf;
use std::time::Duration;

use mims_core::{MimsConfigSnapshot, NamespaceId};

/// Dgraph HTTP surfaces the capability layer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GraphQl,
    Admin,
    AdminSchema,
    Health,
    State,
}

/// Connection and tenancy settings, read once from a config snapshot.
#[derive(Debug, Clone)]
pub struct DgraphSettings {
    pub base_url: String,
    pub graphql_path: String,
    pub admin_path: String,
    pub admin_schema_path: String,
    pub health_path: String,
    pub state_path: String,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    pub admin_timeout: Duration,
    pub capability_ttl: Duration,
    pub schema_path: PathBuf,
    pub backup_dir: PathBuf,
    pub restore_batch_size: usize,
}

impl Default for DgraphSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            graphql_path: "/graphql".to_string(),
            admin_path: "/admin".to_string(),
            admin_schema_path: "/admin/schema".to_string(),
            health_path: "/health?all".to_string(),
            state_path: "/state".to_string(),
            probe_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            admin_timeout: Duration::from_secs(10),
            capability_ttl: Duration::from_secs(300),
            schema_path: PathBuf::from("schemas/default.graphql"),
            backup_dir: PathBuf::from("backups"),
            restore_batch_size: 100,
        }
    }
}

impl DgraphSettings {
    /// Read settings from a config snapshot, keeping defaults for missing keys.
    pub fn from_config(config: &MimsConfigSnapshot) -> Self {
        let d = Self::default();
        Self {
            base_url: config.get_or("dgraph.base_url", &d.base_url),
            graphql_path: config.get_or("dgraph.graphql_path", &d.graphql_path),
            admin_path: config.get_or("dgraph.admin_path", &d.admin_path),
            admin_schema_path: config.get_or("dgraph.admin_schema_path", &d.admin_schema_path),
            health_path: config.get_or("dgraph.health_path", &d.health_path),
            state_path: config.get_or("dgraph.state_path", &d.state_path),
            probe_timeout: config
                .get_duration_secs("dgraph.probe_timeout_secs")
                .unwrap_or(d.probe_timeout),
            request_timeout: config
                .get_duration_secs("dgraph.request_timeout_secs")
                .unwrap_or(d.request_timeout),
            admin_timeout: config
                .get_duration_secs("dgraph.admin_timeout_secs")
                .unwrap_or(d.admin_timeout),
            capability_ttl: config
                .get_duration_secs("capabilities.ttl_secs")
                .unwrap_or(d.capability_ttl),
            schema_path: config
                .get("tenants.schema_path")
                .map(PathBuf::from)
                .unwrap_or(d.schema_path),
            backup_dir: config
                .get("tenants.backup_dir")
                .map(PathBuf::from)
                .unwrap_or(d.backup_dir),
            restore_batch_size: config
                .get_usize("tenants.restore_batch_size")
                .filter(|n| *n > 0)
                .unwrap_or(d.restore_batch_size),
        }
    }

    pub fn path_for(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::GraphQl => &self.graphql_path,
            Endpoint::Admin => &self.admin_path,
            Endpoint::AdminSchema => &self.admin_schema_path,
            Endpoint::Health => &self.health_path,
            Endpoint::State => &self.state_path,
        }
    }

    pub fn url_for(&self, endpoint: Endpoint, namespace: Option<&NamespaceId>) -> String {
        namespaced_url(&self.base_url, self.path_for(endpoint), namespace)
    }
}

/// Join `base` and `path`, appending `namespace=` only for a non-default namespace.
pub fn namespaced_url(base: &str, path: &str, namespace: Option<&NamespaceId>) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), path);
    if let Some(ns) = namespace.filter(|ns| !ns.is_default()) {
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push(sep);
        url.push_str("namespace=");
        url.push_str(ns.as_str());
    }
    url
}
