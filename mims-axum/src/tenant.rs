use axum::http::HeaderMap;
use mims_core::{MimsError, NamespaceId, TenantContext, TenantId, DEFAULT_TENANT_ID};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const NAMESPACE_HEADER: &str = "x-namespace";

/// Build the request's tenant context from `X-Tenant-Id` and `X-Namespace`.
///
/// A missing tenant header means the default tenant. A present but invalid
/// one is rejected rather than silently defaulted.
pub fn tenant_from_headers(headers: &HeaderMap) -> Result<TenantContext, MimsError> {
    let tenant_id = match header_str(headers, TENANT_HEADER)? {
        Some(raw) => TenantId::parse(raw)?,
        None => TenantId(DEFAULT_TENANT_ID.to_string()),
    };

    let namespace = header_str(headers, NAMESPACE_HEADER)?
        .filter(|ns| !ns.is_empty())
        .map(NamespaceId::new);

    Ok(TenantContext { tenant_id, namespace })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, MimsError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str().map(str::trim).map_err(|_| {
                MimsError::bad_request(format!("Header {name} is not valid UTF-8")).with_code("INVALID_HEADER")
            })
        })
        .transpose()
}
