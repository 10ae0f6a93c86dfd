mod common;

use std::time::Duration;

use common::{cache_for, no_data_plane, ClusterMode, ScriptedTransport};
use mims_core::{errors::SUGGESTION_VERIFY_CONFIG, MimsError, NamespaceId, TenancyMode, TenantContext};
use mims_dgraph::{DgraphRequest, DgraphSettings, NamespaceGuard, Validation};

async fn guard_for(mode: ClusterMode) -> NamespaceGuard {
    let cache = cache_for(ScriptedTransport::cluster(mode, no_data_plane), DgraphSettings::default());
    cache.initialize().await;
    NamespaceGuard::new(cache)
}

#[tokio::test]
async fn oss_refuses_test_namespace_with_upgrade_hint() {
    let guard = guard_for(ClusterMode::Oss).await;

    let err = guard.require_namespace_support("add node", Some("0x1")).unwrap_err();

    assert_eq!(err.code(), "NAMESPACE_NOT_SUPPORTED");
    assert_eq!(err.operation(), "add node");
    assert_eq!(err.current_mode(), TenancyMode::OssSingleTenant);
    assert!(err.suggestion().contains("Upgrade"));
}

#[tokio::test]
async fn enterprise_without_namespaces_points_at_configuration() {
    let guard = guard_for(ClusterMode::EnterpriseSingleTenant).await;

    let err = guard.require_namespace_support("add node", Some("0x1")).unwrap_err();

    assert_eq!(err.current_mode(), TenancyMode::EnterpriseSingleTenant);
    assert_eq!(err.suggestion(), SUGGESTION_VERIFY_CONFIG);
    assert!(!err.suggestion().contains("Upgrade"));
}

#[tokio::test]
async fn default_namespace_passes_in_every_mode() {
    for mode in [
        ClusterMode::Unreachable,
        ClusterMode::Oss,
        ClusterMode::EnterpriseSingleTenant,
        ClusterMode::EnterpriseMultiTenant,
    ] {
        let guard = guard_for(mode).await;
        assert!(guard.require_namespace_support("query", Some("0x0")).is_ok());
        assert!(guard.require_namespace_support("query", None).is_ok());
        assert!(guard.check_context("query", &TenantContext::default()).is_ok());
    }
}

#[tokio::test]
async fn explicit_namespace_follows_detected_support() {
    let oss = guard_for(ClusterMode::Oss).await;
    assert!(oss.require_namespace_support("query", Some("0x5")).is_err());

    let multi = guard_for(ClusterMode::EnterpriseMultiTenant).await;
    assert!(multi.require_namespace_support("query", Some("0x5")).is_ok());
    assert!(multi
        .check_context("query", &TenantContext::new("acme").with_namespace("0x5"))
        .is_ok());
}

#[tokio::test]
async fn guard_before_detection_treats_cluster_as_oss() {
    let cache = cache_for(
        ScriptedTransport::cluster(ClusterMode::EnterpriseMultiTenant, no_data_plane),
        DgraphSettings::default(),
    );
    let guard = NamespaceGuard::new(cache);

    let err = guard.check("query", Some(&NamespaceId::new("0x5"))).unwrap_err();
    assert_eq!(err.current_mode(), TenancyMode::OssSingleTenant);
}

#[tokio::test]
async fn require_enterprise_ignores_namespace_support() {
    assert!(guard_for(ClusterMode::EnterpriseSingleTenant)
        .await
        .require_enterprise("backup tenant")
        .is_ok());

    let err = guard_for(ClusterMode::Oss)
        .await
        .require_enterprise("backup tenant")
        .unwrap_err();
    assert_eq!(err.code(), "ENTERPRISE_FEATURE_NOT_AVAILABLE");
    assert_eq!(err.current_mode(), TenancyMode::OssSingleTenant);
}

#[tokio::test]
async fn guarded_scope_binds_or_refuses() {
    let request = DgraphRequest::post_schema("type Node { id: ID! }", Duration::from_secs(10));

    let multi = guard_for(ClusterMode::EnterpriseMultiTenant).await;
    let scoped = Validation::Guarded(&multi)
        .scope("push schema", request.clone(), Some(NamespaceId::new("0x9")))
        .unwrap();
    assert_eq!(scoped.namespace, Some(NamespaceId::new("0x9")));

    let oss = guard_for(ClusterMode::Oss).await;
    assert!(Validation::Guarded(&oss)
        .scope("push schema", request.clone(), Some(NamespaceId::new("0x9")))
        .is_err());

    // The probe path never consults the snapshot.
    let probe = Validation::CapabilityProbe
        .scope("probe", request, Some(NamespaceId::new("0x1")))
        .unwrap();
    assert_eq!(probe.namespace, Some(NamespaceId::new("0x1")));
}

#[tokio::test]
async fn refusal_maps_to_structured_bad_request() {
    let guard = guard_for(ClusterMode::Oss).await;
    let err = guard.require_namespace_support("add node", Some("0x5")).unwrap_err();

    let mims = MimsError::normalize(anyhow::Error::new(err));
    assert_eq!(mims.status(), 400);

    let body = mims.to_json();
    assert_eq!(body["error"], "NAMESPACE_NOT_SUPPORTED");
    assert_eq!(body["details"]["operation"], "add node");
    assert_eq!(body["details"]["currentMode"], "oss-single-tenant");
    assert_eq!(body["details"]["namespace"], "0x5");
}
