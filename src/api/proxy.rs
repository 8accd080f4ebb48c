//! The one handler behind every entry in the proxy route table.

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Uri},
};

use super::routes::ProxyRoute;
use super::AppState;
use crate::auth::TenantContext;
use crate::entitlements;
use crate::error::ApiError;
use crate::upstream::{is_json_content_type, ForwardBody, ForwardRequest, Relayed};

/// Resolve, check entitlement, forward, relay.
pub async fn proxy(
    route: &'static ProxyRoute,
    state: AppState,
    tenant: TenantContext,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Relayed, ApiError> {
    let path = route
        .upstream_path(uri.path(), &tenant.tenant_id)
        .ok_or_else(|| {
            tracing::warn!("Refused path {} for route {}", uri.path(), route.path);
            ApiError::NotFound("Route".to_string())
        })?;

    if let Some(feature) = route.entitlement {
        entitlements::require(&state.upstream, &tenant, feature).await?;
    }

    let forward = ForwardRequest {
        backend: route.backend,
        method: route.verb.method(),
        path,
        query: uri.query().map(str::to_string),
        tenant: &tenant,
        accept: headers.get(header::ACCEPT).cloned(),
        body: forward_body(&headers, body)?,
    };

    state.upstream.forward(forward).await
}

/// JSON bodies (or bodies without a content type) must parse; anything
/// else passes through as raw bytes.
fn forward_body(headers: &HeaderMap, body: Bytes) -> Result<Option<ForwardBody>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }

    let content_type = headers.get(header::CONTENT_TYPE);
    if content_type.is_none() || is_json_content_type(content_type) {
        let value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Malformed JSON body: {}", e)))?;
        return Ok(Some(ForwardBody::Json(value)));
    }

    let content_type = content_type
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok(Some(ForwardBody::Raw {
        content_type,
        bytes: body,
    }))
}
