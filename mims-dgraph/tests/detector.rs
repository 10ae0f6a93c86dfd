mod common;

use std::time::Duration;

use common::{no_data_plane, ClusterMode, ScriptedTransport};
use mims_core::{LicenseType, NamespaceId, TenancyMode};
use mims_dgraph::{CapabilityDetector, DgraphSettings, Endpoint, HttpResponse};
use serde_json::json;

fn detector(transport: std::sync::Arc<ScriptedTransport>) -> CapabilityDetector {
    CapabilityDetector::new(transport, &DgraphSettings::default())
}

#[tokio::test]
async fn oss_cluster_reports_single_tenant() {
    let transport = ScriptedTransport::cluster(ClusterMode::Oss, no_data_plane);
    let snapshot = detector(transport.clone()).detect_capabilities().await;

    assert!(!snapshot.enterprise_detected());
    assert!(!snapshot.namespaces_supported());
    assert_eq!(snapshot.license_type(), LicenseType::OssOnly);
    assert_eq!(snapshot.error(), None);
    assert_eq!(snapshot.mode(), TenancyMode::OssSingleTenant);

    // The namespace probe only runs once Enterprise is seen.
    assert_eq!(transport.count(Endpoint::Admin), 0);
}

#[tokio::test]
async fn multi_tenant_cluster_is_probed_with_non_default_namespace() {
    let transport = ScriptedTransport::cluster(ClusterMode::EnterpriseMultiTenant, no_data_plane);
    let snapshot = detector(transport.clone()).detect_capabilities().await;

    assert!(snapshot.enterprise_detected());
    assert!(snapshot.namespaces_supported());
    assert_eq!(snapshot.license_type(), LicenseType::EnterpriseLicensed);
    assert_eq!(snapshot.license_expiry().map(|t| t.timestamp()), Some(1_900_000_000));

    let probe = transport
        .requests()
        .into_iter()
        .find(|r| r.endpoint == Endpoint::Admin)
        .unwrap();
    assert_eq!(probe.namespace, Some(NamespaceId::new("0x1")));
}

#[tokio::test]
async fn ignored_namespace_parameter_means_single_tenant() {
    let transport = ScriptedTransport::cluster(ClusterMode::EnterpriseSingleTenant, no_data_plane);
    let snapshot = detector(transport).detect_capabilities().await;

    assert!(snapshot.enterprise_detected());
    assert!(!snapshot.namespaces_supported());
    assert_eq!(snapshot.mode(), TenancyMode::EnterpriseSingleTenant);
}

#[tokio::test]
async fn structured_client_error_confirms_namespace_support() {
    let transport = ScriptedTransport::new(|req| match req.endpoint {
        Endpoint::Health => Ok(HttpResponse::ok(json!({ "ee_features": ["multi_tenancy"] }))),
        Endpoint::Admin => Ok(HttpResponse::new(
            400,
            json!({ "errors": [{ "message": "namespace 0x1 does not exist" }] }),
        )),
        _ => Ok(HttpResponse::ok(json!({ "license": { "enabled": true, "user": "" } }))),
    });
    let snapshot = detector(transport).detect_capabilities().await;

    assert!(snapshot.namespaces_supported());
    assert_eq!(snapshot.license_type(), LicenseType::OssTrial);
}

#[tokio::test]
async fn namespace_support_never_reported_without_enterprise() {
    // Admin would accept the namespace, but health lists no Enterprise features.
    let transport = ScriptedTransport::new(|req| match req.endpoint {
        Endpoint::Health => Ok(HttpResponse::ok(json!([{ "ee_features": [] }]))),
        _ => Ok(HttpResponse::ok(json!({ "data": {} }))),
    });
    let snapshot = detector(transport.clone()).detect_capabilities().await;

    assert!(!snapshot.enterprise_detected());
    assert!(!snapshot.namespaces_supported());
    assert_eq!(transport.count(Endpoint::Admin), 0);
}

#[tokio::test]
async fn unreachable_cluster_degrades_instead_of_failing() {
    let transport = ScriptedTransport::cluster(ClusterMode::Unreachable, no_data_plane);
    let snapshot = detector(transport.clone()).detect_capabilities().await;

    assert!(!snapshot.enterprise_detected());
    assert!(!snapshot.namespaces_supported());
    assert!(snapshot.error().is_some_and(|e| !e.is_empty()));
    assert_eq!(snapshot.license_type(), LicenseType::Unknown);

    // The license probe still runs for diagnostics.
    assert_eq!(transport.count(Endpoint::State), 1);
}

#[tokio::test]
async fn failing_license_probe_only_affects_license() {
    let transport = ScriptedTransport::new(|req| match req.endpoint {
        Endpoint::Health => Ok(HttpResponse::ok(json!([{ "ee_features": ["backup_restore"] }]))),
        Endpoint::Admin => Ok(HttpResponse::ok(json!({ "data": {} }))),
        _ => Err(common::timeout_error("http://localhost:8080/state")),
    });
    let snapshot = detector(transport).detect_capabilities().await;

    assert!(snapshot.namespaces_supported());
    assert_eq!(snapshot.license_type(), LicenseType::Unknown);
    assert_eq!(snapshot.error(), None);
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_reused_until_ttl_expires() {
    let transport = ScriptedTransport::cluster(ClusterMode::Oss, no_data_plane);
    let detector = detector(transport.clone());

    let first = detector.detect_capabilities().await;
    tokio::time::advance(Duration::from_secs(60)).await;
    let second = detector.detect_capabilities().await;

    assert_eq!(first, second);
    assert_eq!(transport.count(Endpoint::Health), 1);

    tokio::time::advance(Duration::from_secs(241)).await;
    detector.detect_capabilities().await;
    assert_eq!(transport.count(Endpoint::Health), 2);
}

#[tokio::test]
async fn refresh_and_cached_accessor() {
    let transport = ScriptedTransport::cluster(ClusterMode::Oss, no_data_plane);
    let detector = detector(transport.clone());

    assert!(detector.cached_capabilities().is_none());

    detector.detect_capabilities().await;
    assert!(detector.cached_capabilities().is_some());

    detector.refresh_capabilities().await;
    assert_eq!(transport.count(Endpoint::Health), 2);
}
