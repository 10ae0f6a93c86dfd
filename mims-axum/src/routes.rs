use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use mims_core::{MimsError, TenantId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::MimsAxumError;
use crate::state::MimsAxumState;
use crate::tenant::tenant_from_headers;

type ApiResult<T> = Result<T, MimsAxumError>;

fn map_json_rejection(rejection: JsonRejection) -> MimsAxumError {
    MimsError::bad_request("Failed to parse the request body as JSON")
        .with_code("INVALID_JSON")
        .with_details(json!({ "body": rejection.body_text() }))
        .into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantBody {
    pub tenant_id: String,
}

/// Names a backup file inside the configured backup directory.
#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlBody {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Value>,
}

pub fn router(state: MimsAxumState) -> Router<()> {
    Router::new()
        .route("/system/capabilities", get(capabilities))
        .route("/graphql", post(graphql))
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route("/tenants/{id}", get(tenant_info).delete(delete_tenant))
        .route("/tenants/{id}/backup", post(backup_tenant))
        .route("/tenants/{id}/restore", post(restore_tenant))
        .with_state(state)
}

async fn require_enterprise(state: &MimsAxumState, operation: &str) -> ApiResult<()> {
    state.capabilities.current().await;
    state.guard.require_enterprise(operation)?;
    Ok(())
}

async fn capabilities(State(state): State<MimsAxumState>) -> ApiResult<Json<Value>> {
    let snapshot = state.capabilities.current().await;

    let mut body = serde_json::to_value(&snapshot).map_err(anyhow::Error::from)?;
    body["mode"] = json!(snapshot.mode());
    body["multiTenantSupported"] = json!(snapshot.namespaces_supported());
    Ok(Json(body))
}

async fn graphql(
    State(state): State<MimsAxumState>,
    headers: HeaderMap,
    body: Result<Json<GraphQlBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let ctx = tenant_from_headers(&headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    let client = state.capabilities.create_tenant_from_context(Some(&ctx)).await;
    let data = client
        .execute_graphql(&body.query, body.variables.unwrap_or_else(|| json!({})))
        .await?;
    Ok(Json(json!({ "data": data })))
}

async fn create_tenant(
    State(state): State<MimsAxumState>,
    body: Result<Json<CreateTenantBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let tenant_id = TenantId::parse(body.tenant_id)?;
    require_enterprise(&state, "create tenant").await?;

    let namespace = state.lifecycle.create_tenant(&tenant_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "tenantId": tenant_id, "namespace": namespace })),
    ))
}

async fn list_tenants(State(state): State<MimsAxumState>) -> ApiResult<Json<Value>> {
    let tenants = state.lifecycle.list_tenants().await;
    Ok(Json(json!({ "tenants": tenants })))
}

async fn tenant_info(State(state): State<MimsAxumState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::parse(id)?;
    let record = state.lifecycle.get_tenant_info(&tenant_id).await;
    Ok(Json(serde_json::to_value(record).map_err(anyhow::Error::from)?))
}

async fn delete_tenant(State(state): State<MimsAxumState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::parse(id)?;
    require_enterprise(&state, "delete tenant").await?;

    let report = state.lifecycle.delete_tenant(&tenant_id).await?;
    Ok(Json(serde_json::to_value(report).map_err(anyhow::Error::from)?))
}

async fn backup_tenant(State(state): State<MimsAxumState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::parse(id)?;
    require_enterprise(&state, "backup tenant").await?;

    let path = state.lifecycle.backup_tenant(&tenant_id).await?;
    let file = path.file_name().map(|name| name.to_string_lossy().into_owned());
    Ok(Json(json!({ "tenantId": tenant_id, "file": file })))
}

async fn restore_tenant(
    State(state): State<MimsAxumState>,
    Path(id): Path<String>,
    body: Result<Json<RestoreBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let tenant_id = TenantId::parse(id)?;
    let Json(body) = body.map_err(map_json_rejection)?;
    require_enterprise(&state, "restore tenant").await?;

    let summary = state.lifecycle.restore_tenant(&tenant_id, &body.file).await?;
    Ok(Json(serde_json::to_value(summary).map_err(anyhow::Error::from)?))
}
