//! Tenant lifecycle: create, delete, inspect, back up and restore the data
//! living in a tenant's namespace.
//!
//! Every operation derives the namespace from the tenant id, so nothing about
//! a tenant is persisted here. Operations that touch a non-default namespace
//! pass through [`NamespaceGuard::check`] first.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use mims_core::{
    mode_for, CapabilitySnapshot, MimsError, NamespaceId, TenantId, DEFAULT_TENANT_ID, TEST_TENANT_ID,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::backup::{
    read_backup, resolve_backup_path, write_backup, BackupData, BackupFile, BackupMetadata,
    BACKUP_FORMAT_VERSION,
};
use crate::cache::CapabilityCache;
use crate::client::TenantClient;
use crate::guard::{NamespaceGuard, Validation};
use crate::schema::{load_schema_from_file, push_schema};

/// Hashed namespaces fall in `[NAMESPACE_OFFSET, NAMESPACE_OFFSET + NAMESPACE_CEILING)`.
pub const NAMESPACE_CEILING: u64 = 1_000_000;
/// Skips the default (`0x0`) and test (`0x1`) namespaces.
pub const NAMESPACE_OFFSET: u64 = 2;

pub const DEFAULT_HIERARCHY_NAME: &str = "Default Hierarchy";
pub const DEFAULT_HIERARCHY_LEVELS: [(u32, &str); 3] = [(1, "Domain"), (2, "Category"), (3, "Item")];

const SMOKE_TEST_QUERY: &str = "query { queryNode(first: 1) { id } }";
const EXISTS_QUERY: &str = "query { __typename }";

const ADD_HIERARCHY: &str = r#"mutation AddHierarchy($input: [AddHierarchyInput!]!) {
  addHierarchy(input: $input) { hierarchy { id name } }
}"#;

const ADD_HIERARCHY_LEVELS: &str = r#"mutation AddHierarchyLevels($input: [AddHierarchyLevelInput!]!) {
  addHierarchyLevel(input: $input) { hierarchyLevel { id levelNumber label } }
}"#;

const GET_HIERARCHY: &str = r#"query GetHierarchy($id: ID!) {
  getHierarchy(id: $id) { id name levels { levelNumber label } }
}"#;

const EXPORT_QUERY: &str = r#"query ExportTenant {
  queryNode { id label type level status branch }
  queryHierarchy { id name levels { levelNumber label } }
  queryEdge { type fromId toId from { id } to { id } }
}"#;

const RESTORE_HIERARCHY: &str = r#"mutation RestoreHierarchy($input: [AddHierarchyInput!]!) {
  addHierarchy(input: $input) { numUids }
}"#;

const RESTORE_NODES: &str = r#"mutation RestoreNodes($input: [AddNodeInput!]!) {
  addNode(input: $input, upsert: true) { numUids }
}"#;

const RESTORE_EDGES: &str = r#"mutation RestoreEdges($input: [AddEdgeInput!]!) {
  addEdge(input: $input) { numUids }
}"#;

/// Map a tenant id to its namespace.
///
/// `default` and `test-tenant` map to the reserved sentinels. Every other id
/// maps through SHA-256: the first 32 bits of the digest, modulo
/// [`NAMESPACE_CEILING`], offset by [`NAMESPACE_OFFSET`]. Collisions are not
/// detected.
pub fn generate_namespace_id(tenant_id: &str) -> NamespaceId {
    match tenant_id {
        DEFAULT_TENANT_ID => NamespaceId::default_namespace(),
        TEST_TENANT_ID => NamespaceId::test_namespace(),
        other => {
            let digest = Sha256::digest(other.as_bytes());
            let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            NamespaceId::from_index(u64::from(prefix) % NAMESPACE_CEILING + NAMESPACE_OFFSET)
        }
    }
}

/// Entity types in a tenant namespace, listed in deletion order: the most
/// referencing types go first so no delete trips over a live reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    HierarchyAssignment,
    HierarchyLevelType,
    HierarchyLevel,
    Hierarchy,
    Edge,
    Node,
}

impl EntityKind {
    pub const DELETION_ORDER: [EntityKind; 6] = [
        EntityKind::HierarchyAssignment,
        EntityKind::HierarchyLevelType,
        EntityKind::HierarchyLevel,
        EntityKind::Hierarchy,
        EntityKind::Edge,
        EntityKind::Node,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::HierarchyAssignment => "HierarchyAssignment",
            EntityKind::HierarchyLevelType => "HierarchyLevelType",
            EntityKind::HierarchyLevel => "HierarchyLevel",
            EntityKind::Hierarchy => "Hierarchy",
            EntityKind::Edge => "Edge",
            EntityKind::Node => "Node",
        }
    }

    // A field every record of the type carries, used as a match-all filter.
    fn presence_field(&self) -> &'static str {
        match self {
            EntityKind::HierarchyAssignment => "hierarchy",
            EntityKind::HierarchyLevelType => "level",
            EntityKind::HierarchyLevel => "hierarchy",
            EntityKind::Hierarchy => "name",
            EntityKind::Edge => "from",
            EntityKind::Node => "label",
        }
    }

    pub fn delete_mutation(&self) -> String {
        format!(
            "mutation {{ delete{}(filter: {{ has: {} }}) {{ msg numUids }} }}",
            self.type_name(),
            self.presence_field()
        )
    }
}

/// Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub tenant_id: TenantId,
    pub namespace: NamespaceId,
    pub exists: bool,
    pub is_test_tenant: bool,
    pub is_default_tenant: bool,
    pub is_production_tenant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDeletion {
    pub entity: EntityKind,
    pub deleted: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub tenant_id: TenantId,
    pub namespace: NamespaceId,
    pub entities: Vec<EntityDeletion>,
}

impl DeletionReport {
    pub fn failures(&self) -> impl Iterator<Item = &EntityDeletion> {
        self.entities.iter().filter(|e| e.error.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub hierarchies: usize,
    pub nodes: usize,
    pub edges: usize,
    pub skipped: usize,
}

pub struct TenantLifecycleManager {
    capabilities: Arc<CapabilityCache>,
    guard: NamespaceGuard,
    known_tenants: Mutex<BTreeSet<TenantId>>,
}

impl TenantLifecycleManager {
    pub fn new(capabilities: Arc<CapabilityCache>) -> Self {
        Self {
            guard: NamespaceGuard::new(Arc::clone(&capabilities)),
            capabilities,
            known_tenants: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn guard(&self) -> &NamespaceGuard {
        &self.guard
    }

    /// Refresh capabilities if stale, check the namespace and return a client bound to it.
    async fn admin_client(&self, operation: &str, namespace: &NamespaceId) -> Result<TenantClient> {
        let snapshot = self.capabilities.current().await;
        self.guard.check(operation, Some(namespace))?;
        Ok(self.bound_client(namespace, &snapshot))
    }

    fn bound_client(&self, namespace: &NamespaceId, snapshot: &CapabilitySnapshot) -> TenantClient {
        TenantClient::new(
            self.capabilities.transport(),
            self.capabilities.settings(),
            Some(namespace.clone()),
        )
        .with_enterprise_detected(snapshot.enterprise_detected())
    }

    /// Push the schema into the tenant's namespace, verify it, and seed the
    /// default hierarchy unless this is the reserved test tenant.
    #[instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn create_tenant(&self, tenant_id: &TenantId) -> Result<NamespaceId> {
        let namespace = generate_namespace_id(tenant_id.as_str());
        let client = self.admin_client("create tenant", &namespace).await?;
        let settings = self.capabilities.settings();

        let candidates = [settings.schema_path.clone(), Path::new("..").join(&settings.schema_path)];
        let schema = load_schema_from_file(&candidates).await?;
        let transport = self.capabilities.transport();
        push_schema(
            transport.as_ref(),
            Validation::Guarded(&self.guard),
            Some(namespace.clone()),
            &schema.text,
            settings.admin_timeout,
        )
        .await?;

        if let Err(err) = client.execute_graphql(SMOKE_TEST_QUERY, json!({})).await {
            return Err(verification_failed(
                format!("Schema verification failed for tenant '{tenant_id}' in namespace {namespace}"),
                err,
            ));
        }

        if tenant_id.is_reserved_test_tenant() {
            debug!("test tenant left unseeded");
        } else {
            self.seed_default_hierarchy(&client, tenant_id).await?;
        }

        self.known_tenants.lock().insert(tenant_id.clone());
        info!(%namespace, "tenant created");
        Ok(namespace)
    }

    async fn seed_default_hierarchy(&self, client: &TenantClient, tenant_id: &TenantId) -> Result<()> {
        let created = client
            .execute_graphql(ADD_HIERARCHY, json!({ "input": [{ "name": DEFAULT_HIERARCHY_NAME }] }))
            .await
            .map_err(|err| {
                verification_failed(format!("Failed to seed default hierarchy for tenant '{tenant_id}'"), err)
            })?;

        let hierarchy_id = created
            .pointer("/addHierarchy/hierarchy/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MimsError::general_error(format!(
                    "Default hierarchy for tenant '{tenant_id}' was not returned by Dgraph"
                ))
                .with_code("TENANT_VERIFICATION_FAILED")
                .into_anyhow()
            })?;

        let levels: Vec<Value> = DEFAULT_HIERARCHY_LEVELS
            .iter()
            .map(|(number, label)| {
                json!({ "hierarchy": { "id": hierarchy_id }, "levelNumber": number, "label": label })
            })
            .collect();
        client
            .execute_graphql(ADD_HIERARCHY_LEVELS, json!({ "input": levels }))
            .await
            .map_err(|err| {
                verification_failed(format!("Failed to seed hierarchy levels for tenant '{tenant_id}'"), err)
            })?;

        let verified = client
            .execute_graphql(GET_HIERARCHY, json!({ "id": hierarchy_id }))
            .await
            .map_err(|err| {
                verification_failed(format!("Failed to verify default hierarchy for tenant '{tenant_id}'"), err)
            })?;

        let level_count = verified
            .pointer("/getHierarchy/levels")
            .and_then(Value::as_array)
            .map(Vec::len);
        if level_count != Some(DEFAULT_HIERARCHY_LEVELS.len()) {
            return Err(MimsError::general_error(format!(
                "Default hierarchy for tenant '{tenant_id}' is missing or incomplete"
            ))
            .with_code("TENANT_VERIFICATION_FAILED")
            .with_details(json!({ "hierarchyId": hierarchy_id, "levels": level_count }))
            .into_anyhow());
        }

        debug!(%hierarchy_id, "default hierarchy seeded");
        Ok(())
    }

    /// Delete every record in the tenant's namespace, one entity type at a time.
    ///
    /// A failed type is logged and recorded in the report; the remaining
    /// types are still attempted.
    #[instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn delete_tenant(&self, tenant_id: &TenantId) -> Result<DeletionReport> {
        let namespace = generate_namespace_id(tenant_id.as_str());
        let client = self.admin_client("delete tenant", &namespace).await?;

        let mut entities = Vec::with_capacity(EntityKind::DELETION_ORDER.len());
        for kind in EntityKind::DELETION_ORDER {
            let outcome = match client.execute_graphql(&kind.delete_mutation(), json!({})).await {
                Ok(data) => {
                    let deleted = data
                        .pointer(&format!("/delete{}/numUids", kind.type_name()))
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    debug!(entity = kind.type_name(), deleted, "entity type deleted");
                    EntityDeletion {
                        entity: kind,
                        deleted: Some(deleted),
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(entity = kind.type_name(), error = %err, "failed to delete entity type; continuing");
                    EntityDeletion {
                        entity: kind,
                        deleted: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            entities.push(outcome);
        }

        self.known_tenants.lock().remove(tenant_id);
        let report = DeletionReport {
            tenant_id: tenant_id.clone(),
            namespace,
            entities,
        };
        info!(complete = report.is_complete(), "tenant deleted");
        Ok(report)
    }

    /// True when a trivial query succeeds in the tenant's namespace. Never fails.
    pub async fn tenant_exists(&self, tenant_id: &TenantId) -> bool {
        let namespace = generate_namespace_id(tenant_id.as_str());
        let snapshot = self.capabilities.current().await;

        if !namespace.is_default() && !snapshot.namespaces_supported() {
            return false;
        }

        let client = self.bound_client(&namespace, &snapshot);
        match client.execute_graphql(EXISTS_QUERY, json!({})).await {
            Ok(_) => true,
            Err(err) => {
                debug!(tenant_id = %tenant_id, error = %err, "tenant existence probe failed");
                false
            }
        }
    }

    pub async fn get_tenant_info(&self, tenant_id: &TenantId) -> TenantRecord {
        TenantRecord {
            namespace: generate_namespace_id(tenant_id.as_str()),
            exists: self.tenant_exists(tenant_id).await,
            is_test_tenant: tenant_id.is_test_tenant(),
            is_default_tenant: tenant_id.is_default_tenant(),
            is_production_tenant: tenant_id.is_production_tenant(),
            tenant_id: tenant_id.clone(),
        }
    }

    /// Reserved tenants plus those created or restored by this manager.
    pub async fn list_tenants(&self) -> Vec<TenantRecord> {
        let mut ids: BTreeSet<TenantId> = self.known_tenants.lock().clone();
        ids.insert(TenantId(DEFAULT_TENANT_ID.to_string()));
        ids.insert(TenantId(TEST_TENANT_ID.to_string()));

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            records.push(self.get_tenant_info(id).await);
        }
        records
    }

    /// Export nodes, hierarchies and edges into one backup file.
    #[instrument(skip_all, fields(tenant_id = %tenant_id))]
    pub async fn backup_tenant(&self, tenant_id: &TenantId) -> Result<PathBuf> {
        let namespace = generate_namespace_id(tenant_id.as_str());
        let client = self.admin_client("backup tenant", &namespace).await?;

        let exported = client
            .execute_graphql(EXPORT_QUERY, json!({}))
            .await
            .with_context(|| format!("failed to export tenant '{tenant_id}'"))?;

        let list = |key: &str| {
            exported
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };
        let backup = BackupFile {
            metadata: BackupMetadata {
                tenant_id: tenant_id.clone(),
                namespace: namespace.to_string(),
                created_at: Utc::now(),
                mode: mode_for(self.capabilities.capabilities().as_ref()),
                version: BACKUP_FORMAT_VERSION.to_string(),
            },
            data: BackupData {
                nodes: list("queryNode"),
                hierarchies: list("queryHierarchy"),
                edges: list("queryEdge"),
            },
        };

        let path = write_backup(&self.capabilities.settings().backup_dir, &backup).await?;
        info!(
            path = %path.display(),
            nodes = backup.data.nodes.len(),
            hierarchies = backup.data.hierarchies.len(),
            edges = backup.data.edges.len(),
            "tenant backed up"
        );
        Ok(path)
    }

    /// Replay a backup into the tenant's namespace.
    ///
    /// `file_name` names a file inside the configured backup directory.
    /// Hierarchies are restored one by one and skipped on error. Nodes and
    /// edges go in batches; a failed batch aborts the restore.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, file = file_name))]
    pub async fn restore_tenant(&self, tenant_id: &TenantId, file_name: &str) -> Result<RestoreSummary> {
        let path = resolve_backup_path(&self.capabilities.settings().backup_dir, file_name)?;
        let namespace = generate_namespace_id(tenant_id.as_str());
        let client = self.admin_client("restore tenant", &namespace).await?;
        let backup = read_backup(&path).await?;
        let batch_size = self.capabilities.settings().restore_batch_size.max(1);

        if backup.metadata.tenant_id != *tenant_id {
            info!(source_tenant = %backup.metadata.tenant_id, "restoring backup into a different tenant");
        }

        let mut summary = RestoreSummary::default();

        for hierarchy in &backup.data.hierarchies {
            let input = strip_ids(hierarchy);
            match client.execute_graphql(RESTORE_HIERARCHY, json!({ "input": [input] })).await {
                Ok(_) => summary.hierarchies += 1,
                Err(err) => {
                    let name = hierarchy.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
                    warn!(hierarchy = name, error = %err, "skipping hierarchy");
                    summary.skipped += 1;
                }
            }
        }

        for (index, batch) in backup.data.nodes.chunks(batch_size).enumerate() {
            client
                .execute_graphql(RESTORE_NODES, json!({ "input": batch }))
                .await
                .with_context(|| format!("restore aborted at node batch {}", index + 1))?;
            summary.nodes += batch.len();
        }

        for (index, batch) in backup.data.edges.chunks(batch_size).enumerate() {
            client
                .execute_graphql(RESTORE_EDGES, json!({ "input": batch }))
                .await
                .with_context(|| format!("restore aborted at edge batch {}", index + 1))?;
            summary.edges += batch.len();
        }

        self.known_tenants.lock().insert(tenant_id.clone());
        info!(?summary, "tenant restored");
        Ok(summary)
    }
}

fn verification_failed(message: String, cause: anyhow::Error) -> anyhow::Error {
    MimsError::general_error(format!("{message}: {cause}"))
        .with_code("TENANT_VERIFICATION_FAILED")
        .with_source(cause)
        .into_anyhow()
}

/// Remove Dgraph-assigned `id`s so records can be re-added.
fn strip_ids(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| k.as_str() != "id")
                .map(|(k, v)| (k.clone(), strip_ids(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_ids).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_tenants_map_to_sentinels() {
        assert_eq!(generate_namespace_id("default").as_str(), "0x0");
        assert_eq!(generate_namespace_id("test-tenant").as_str(), "0x1");
    }

    #[test]
    fn hashed_namespaces_are_stable_and_in_range() {
        let first = generate_namespace_id("acme");
        assert_eq!(first, generate_namespace_id("acme"));
        assert_ne!(first, generate_namespace_id("globex"));

        for tenant in ["acme", "globex", "initech", "x"] {
            let ns = generate_namespace_id(tenant);
            let value = u64::from_str_radix(ns.as_str().trim_start_matches("0x"), 16).unwrap();
            assert!((NAMESPACE_OFFSET..NAMESPACE_OFFSET + NAMESPACE_CEILING).contains(&value));
        }
    }

    #[test]
    fn hashed_namespace_matches_digest_prefix() {
        let hex = format!("{:x}", Sha256::digest(b"acme"));
        let prefix = u64::from_str_radix(&hex[..8], 16).unwrap();
        let expected = NamespaceId::from_index(prefix % NAMESPACE_CEILING + NAMESPACE_OFFSET);
        assert_eq!(generate_namespace_id("acme"), expected);
    }

    #[test]
    fn deletion_order_starts_with_assignments_and_ends_with_nodes() {
        let order = EntityKind::DELETION_ORDER;
        assert_eq!(order.first(), Some(&EntityKind::HierarchyAssignment));
        assert_eq!(order.last(), Some(&EntityKind::Node));
        assert_eq!(
            EntityKind::Edge.delete_mutation(),
            "mutation { deleteEdge(filter: { has: from }) { msg numUids } }"
        );
    }

    #[test]
    fn ids_are_stripped_recursively() {
        let h = json!({ "id": "0x9", "name": "H", "levels": [{ "id": "0xa", "levelNumber": 1 }] });
        assert_eq!(strip_ids(&h), json!({ "name": "H", "levels": [{ "levelNumber": 1 }] }));
    }
}
