use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use mims_core::{CapabilityError, MimsError, NamespaceId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::settings::{DgraphSettings, Endpoint};
use crate::transport::{DgraphRequest, DgraphTransport};

/// A GraphQL client whose every operation runs against one fixed namespace.
///
/// Obtained from [`CapabilityCache::create_tenant`](crate::cache::CapabilityCache::create_tenant),
/// which has already decided the binding. Failures surface as one of two
/// errors: `NAMESPACE_NOT_SUPPORTED` when bound to a non-default namespace,
/// `DGRAPH_UNAVAILABLE` otherwise.
#[derive(Clone)]
pub struct TenantClient {
    transport: Arc<dyn DgraphTransport>,
    namespace: Option<NamespaceId>,
    endpoint: String,
    timeout: Duration,
    enterprise_detected: bool,
}

impl TenantClient {
    pub fn new(
        transport: Arc<dyn DgraphTransport>,
        settings: &DgraphSettings,
        namespace: Option<NamespaceId>,
    ) -> Self {
        let namespace = namespace.filter(|ns| !ns.is_default());
        Self {
            endpoint: settings.url_for(Endpoint::GraphQl, namespace.as_ref()),
            transport,
            namespace,
            timeout: settings.request_timeout,
            enterprise_detected: false,
        }
    }

    /// Record whether Enterprise was active when the client was built; only
    /// used to pick the current-mode label on failure.
    pub fn with_enterprise_detected(mut self, detected: bool) -> Self {
        self.enterprise_detected = detected;
        self
    }

    /// `None` when bound to the default namespace.
    pub fn namespace(&self) -> Option<&NamespaceId> {
        self.namespace.as_ref()
    }

    pub fn is_default_namespace(&self) -> bool {
        self.namespace.is_none()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a query or mutation and return its `data` member.
    pub async fn execute_graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let request =
            DgraphRequest::graphql(query, variables, self.timeout).bound_to(self.namespace.clone());

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    endpoint = %self.endpoint,
                    timed_out = err.is_timeout(),
                    error = %err,
                    "GraphQL transport failure"
                );
                return Err(self.unreachable(anyhow::Error::new(err)));
            }
        };

        if !response.is_success() {
            warn!(endpoint = %self.endpoint, status = response.status, "GraphQL request rejected");
            return Err(self.unreachable(anyhow::anyhow!("HTTP status {}", response.status)));
        }

        if let Some(message) = graphql_error_message(&response.body) {
            debug!(endpoint = %self.endpoint, %message, "GraphQL errors in response");
            return Err(MimsError::bad_request(format!("GraphQL errors: {message}"))
                .with_code("GRAPHQL_ERROR")
                .into_anyhow());
        }

        Ok(response.body.get("data").cloned().unwrap_or(Value::Null))
    }

    fn unreachable(&self, cause: anyhow::Error) -> anyhow::Error {
        match &self.namespace {
            Some(ns) => anyhow::Error::new(CapabilityError::namespace_not_supported(
                "execute GraphQL",
                Some(ns.as_str()),
                self.enterprise_detected,
            )),
            None => MimsError::unavailable(format!(
                "Failed to reach Dgraph at {}; check connectivity",
                self.endpoint
            ))
            .with_code("DGRAPH_UNAVAILABLE")
            .with_source(cause)
            .into_anyhow(),
        }
    }
}

/// All GraphQL error messages joined with `; `, or `None` when the response
/// carries no errors.
pub fn graphql_error_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let joined = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(joined)
}
