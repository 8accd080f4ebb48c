//! Per-tenant feature entitlements, owned by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::auth::TenantContext;
use crate::error::ApiError;
use crate::upstream::{Backend, UpstreamClient};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entitlements {
    #[serde(default)]
    pub entitlements: Vec<String>,
}

impl Entitlements {
    pub fn allows(&self, feature: &str) -> bool {
        self.entitlements.iter().any(|e| e == feature)
    }
}

pub fn entitlements_path(tenant_id: &str) -> String {
    format!("/v1/tenants/{}/entitlements", tenant_id)
}

pub async fn fetch(upstream: &UpstreamClient, tenant: &TenantContext) -> Result<Entitlements, ApiError> {
    let value = upstream
        .get_json(Backend::Orchestrator, &entitlements_path(&tenant.tenant_id), tenant)
        .await?;
    serde_json::from_value(value)
        .map_err(|e| ApiError::BadGateway(format!("unexpected entitlements payload: {}", e)))
}

/// Fail with 403 unless the tenant holds `feature`.
pub async fn require(
    upstream: &UpstreamClient,
    tenant: &TenantContext,
    feature: &str,
) -> Result<(), ApiError> {
    if fetch(upstream, tenant).await?.allows(feature) {
        Ok(())
    } else {
        tracing::info!(tenant = %tenant.tenant_id, "Blocked request needing {}", feature);
        Err(ApiError::NotEntitled(feature.to_string()))
    }
}
