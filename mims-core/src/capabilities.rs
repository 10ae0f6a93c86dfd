//! # Capability snapshots
//!
//! A [`CapabilitySnapshot`] is the immutable result of probing Dgraph for
//! Enterprise features and namespace isolation. Snapshots are replaced
//! wholesale on every detection and never mutated.
//!
//! The constructors uphold one invariant: namespace support is never reported
//! without Enterprise also being detected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// License classification read from the cluster state endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseType {
    OssOnly,
    OssTrial,
    EnterpriseLicensed,
    Unknown,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::OssOnly => "oss-only",
            LicenseType::OssTrial => "oss-trial",
            LicenseType::EnterpriseLicensed => "enterprise-licensed",
            LicenseType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operating mode implied by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TenancyMode {
    OssSingleTenant,
    EnterpriseSingleTenant,
    EnterpriseMultiTenant,
}

impl TenancyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenancyMode::OssSingleTenant => "oss-single-tenant",
            TenancyMode::EnterpriseSingleTenant => "enterprise-single-tenant",
            TenancyMode::EnterpriseMultiTenant => "enterprise-multi-tenant",
        }
    }
}

impl fmt::Display for TenancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    enterprise_detected: bool,
    namespaces_supported: bool,
    license_type: LicenseType,
    license_expiry: Option<DateTime<Utc>>,
    detected_at: DateTime<Utc>,
    error: Option<String>,
}

impl CapabilitySnapshot {
    /// Snapshot from a completed detection run.
    ///
    /// `namespaces_supported` is forced to `false` when Enterprise was not detected.
    pub fn detected(
        enterprise_detected: bool,
        namespaces_supported: bool,
        license_type: LicenseType,
        license_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            enterprise_detected,
            namespaces_supported: enterprise_detected && namespaces_supported,
            license_type,
            license_expiry,
            detected_at: Utc::now(),
            error: None,
        }
    }

    /// OSS-safe snapshot recording why detection failed.
    pub fn degraded(
        error: impl Into<String>,
        license_type: LicenseType,
        license_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            enterprise_detected: false,
            namespaces_supported: false,
            license_type,
            license_expiry,
            detected_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn enterprise_detected(&self) -> bool {
        self.enterprise_detected
    }

    pub fn namespaces_supported(&self) -> bool {
        self.namespaces_supported
    }

    pub fn license_type(&self) -> LicenseType {
        self.license_type
    }

    pub fn license_expiry(&self) -> Option<DateTime<Utc>> {
        self.license_expiry
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mode(&self) -> TenancyMode {
        mode_for(Some(self))
    }
}

/// Mode label for an optional snapshot; an absent snapshot reads as OSS.
pub fn mode_for(snapshot: Option<&CapabilitySnapshot>) -> TenancyMode {
    match snapshot {
        Some(s) if s.namespaces_supported => TenancyMode::EnterpriseMultiTenant,
        Some(s) if s.enterprise_detected => TenancyMode::EnterpriseSingleTenant,
        _ => TenancyMode::OssSingleTenant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_support_requires_enterprise() {
        let s = CapabilitySnapshot::detected(false, true, LicenseType::OssOnly, None);
        assert!(!s.enterprise_detected());
        assert!(!s.namespaces_supported());
        assert_eq!(s.mode(), TenancyMode::OssSingleTenant);
    }

    #[test]
    fn modes_follow_flags() {
        let ee = CapabilitySnapshot::detected(true, false, LicenseType::OssTrial, None);
        assert_eq!(ee.mode(), TenancyMode::EnterpriseSingleTenant);

        let mt = CapabilitySnapshot::detected(true, true, LicenseType::EnterpriseLicensed, None);
        assert_eq!(mt.mode(), TenancyMode::EnterpriseMultiTenant);

        assert_eq!(mode_for(None), TenancyMode::OssSingleTenant);
    }

    #[test]
    fn degraded_snapshot_is_oss_with_error() {
        let s = CapabilitySnapshot::degraded("connection refused", LicenseType::Unknown, None);
        assert!(!s.enterprise_detected());
        assert!(!s.namespaces_supported());
        assert_eq!(s.error(), Some("connection refused"));
    }

    #[test]
    fn serializes_camel_case_with_kebab_license() {
        let s = CapabilitySnapshot::detected(true, true, LicenseType::EnterpriseLicensed, None);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["enterpriseDetected"], true);
        assert_eq!(v["namespacesSupported"], true);
        assert_eq!(v["licenseType"], "enterprise-licensed");
        assert!(v["error"].is_null());
    }
}
