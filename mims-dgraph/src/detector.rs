//! Capability detection.
//!
//! Three probes, each with its own failure handling:
//! 1. `/health?all` for a non-empty `ee_features` list (Enterprise active).
//! 2. A namespace-scoped `/admin` call, only when Enterprise is active.
//! 3. `/state` for license metadata.
//!
//! Detection never fails: an unreachable cluster yields an OSS-safe snapshot
//! whose `error` field says why.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mims_core::{CapabilitySnapshot, LicenseType, NamespaceId};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::guard::Validation;
use crate::settings::{DgraphSettings, Endpoint};
use crate::transport::{DgraphRequest, DgraphTransport, TransportError};

/// Non-default namespace used only to test whether namespaces are honoured.
pub const PROBE_NAMESPACE: &str = "0x1";

const NAMESPACE_PROBE_QUERY: &str = "{ health { instance status } }";

#[derive(Debug, Clone, PartialEq)]
pub struct LicenseInfo {
    pub license_type: LicenseType,
    pub expiry: Option<DateTime<Utc>>,
}

impl LicenseInfo {
    fn unknown() -> Self {
        Self {
            license_type: LicenseType::Unknown,
            expiry: None,
        }
    }
}

struct CachedDetection {
    snapshot: CapabilitySnapshot,
    detected: Instant,
}

pub struct CapabilityDetector {
    transport: Arc<dyn DgraphTransport>,
    probe_timeout: Duration,
    ttl: Duration,
    cached: Mutex<Option<CachedDetection>>,
}

impl CapabilityDetector {
    pub fn new(transport: Arc<dyn DgraphTransport>, settings: &DgraphSettings) -> Self {
        Self {
            transport,
            probe_timeout: settings.probe_timeout,
            ttl: settings.capability_ttl,
            cached: Mutex::new(None),
        }
    }

    /// Cached snapshot when younger than the TTL, otherwise a fresh detection.
    pub async fn detect_capabilities(&self) -> CapabilitySnapshot {
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("capability cache hit");
            return snapshot;
        }

        let snapshot = match self.run_probes().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "capability detection failed; falling back to OSS mode");
                let license = self.probe_license().await;
                CapabilitySnapshot::degraded(err.to_string(), license.license_type, license.expiry)
            }
        };

        info!(
            enterprise = snapshot.enterprise_detected(),
            namespaces = snapshot.namespaces_supported(),
            license = %snapshot.license_type(),
            mode = %snapshot.mode(),
            "detected Dgraph capabilities"
        );

        *self.cached.lock() = Some(CachedDetection {
            snapshot: snapshot.clone(),
            detected: Instant::now(),
        });
        snapshot
    }

    /// Drop the cached snapshot and detect again.
    pub async fn refresh_capabilities(&self) -> CapabilitySnapshot {
        self.clear();
        self.detect_capabilities().await
    }

    /// Last snapshot, without probing. `None` until detection has run once.
    pub fn cached_capabilities(&self) -> Option<CapabilitySnapshot> {
        self.cached.lock().as_ref().map(|c| c.snapshot.clone())
    }

    pub fn clear(&self) {
        *self.cached.lock() = None;
    }

    fn fresh_snapshot(&self) -> Option<CapabilitySnapshot> {
        let cached = self.cached.lock();
        cached
            .as_ref()
            .filter(|c| c.detected.elapsed() < self.ttl)
            .map(|c| c.snapshot.clone())
    }

    async fn run_probes(&self) -> Result<CapabilitySnapshot, TransportError> {
        let enterprise = self.probe_enterprise().await?;
        let namespaces = if enterprise {
            self.probe_namespaces().await
        } else {
            false
        };
        let license = self.probe_license().await;

        Ok(CapabilitySnapshot::detected(
            enterprise,
            namespaces,
            license.license_type,
            license.expiry,
        ))
    }

    /// A transport failure here means the cluster is unreachable and aborts
    /// detection; an unhelpful status only means "not detected".
    async fn probe_enterprise(&self) -> Result<bool, TransportError> {
        let response = self
            .transport
            .send(DgraphRequest::get(Endpoint::Health, self.probe_timeout))
            .await?;

        if !response.is_success() {
            debug!(status = response.status, "health probe returned non-success status");
            return Ok(false);
        }
        Ok(has_enterprise_features(&response.body))
    }

    async fn probe_namespaces(&self) -> bool {
        let request = DgraphRequest::post_json(
            Endpoint::Admin,
            json!({ "query": NAMESPACE_PROBE_QUERY }),
            self.probe_timeout,
        );
        let request = match Validation::CapabilityProbe.scope(
            "namespace capability probe",
            request,
            Some(NamespaceId::new(PROBE_NAMESPACE)),
        ) {
            Ok(request) => request,
            Err(err) => {
                debug!(error = %err, "namespace probe rejected");
                return false;
            }
        };

        match self.transport.send(request).await {
            Ok(response) if response.is_success() => true,
            Ok(response) if response.is_client_error() => namespace_recognized(&response.body),
            Ok(response) => {
                debug!(status = response.status, "namespace probe returned unexpected status");
                false
            }
            Err(err) => {
                debug!(error = %err, "namespace probe failed");
                false
            }
        }
    }

    async fn probe_license(&self) -> LicenseInfo {
        match self
            .transport
            .send(DgraphRequest::get(Endpoint::State, self.probe_timeout))
            .await
        {
            Ok(response) if response.is_success() => classify_license(&response.body),
            Ok(response) => {
                debug!(status = response.status, "state probe returned non-success status");
                LicenseInfo::unknown()
            }
            Err(err) => {
                debug!(error = %err, "state probe failed");
                LicenseInfo::unknown()
            }
        }
    }
}

/// True when any health entry lists at least one Enterprise feature.
pub fn has_enterprise_features(body: &Value) -> bool {
    let listed = |entry: &Value| {
        entry
            .get("ee_features")
            .and_then(Value::as_array)
            .is_some_and(|features| !features.is_empty())
    };
    match body {
        Value::Array(entries) => entries.iter().any(listed),
        Value::Object(_) => listed(body),
        _ => false,
    }
}

/// A 4xx body counts as "namespace recognised" only when it is a structured
/// GraphQL error list. Plain-text or empty bodies do not.
pub fn namespace_recognized(body: &Value) -> bool {
    body.get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| errors.iter().any(|e| e.get("message").is_some()))
}

/// Derive the license type from a `/state` body.
///
/// No `license` block at all is what OSS builds report, so it reads as `oss-only`.
pub fn classify_license(body: &Value) -> LicenseInfo {
    let Some(license) = body.get("license").filter(|l| l.is_object()) else {
        return LicenseInfo {
            license_type: LicenseType::OssOnly,
            expiry: None,
        };
    };

    let enabled = license.get("enabled").and_then(Value::as_bool).unwrap_or(false);
    let user = license
        .get("user")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    let license_type = match (enabled, user.is_empty()) {
        (false, _) => LicenseType::OssOnly,
        (true, true) => LicenseType::OssTrial,
        (true, false) => LicenseType::EnterpriseLicensed,
    };

    LicenseInfo {
        license_type,
        expiry: license.get("expiryTs").and_then(parse_expiry),
    }
}

fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}
