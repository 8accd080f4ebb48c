use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A third-party system tenants can connect through OAuth.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct IntegrationProvider {
    pub key: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

pub const PROVIDERS: &[IntegrationProvider] = &[
    IntegrationProvider { key: "google", name: "Google Workspace", category: "calendar" },
    IntegrationProvider { key: "microsoft", name: "Microsoft 365", category: "calendar" },
    IntegrationProvider { key: "hubspot", name: "HubSpot", category: "crm" },
    IntegrationProvider { key: "salesforce", name: "Salesforce", category: "crm" },
    IntegrationProvider { key: "shopify", name: "Shopify", category: "commerce" },
    IntegrationProvider { key: "slack", name: "Slack", category: "messaging" },
];

pub fn find_provider(key: &str) -> Option<&'static IntegrationProvider> {
    PROVIDERS.iter().find(|p| p.key == key)
}

/// A tenant's connection to a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrationConnection {
    pub id: Uuid,
    pub tenant_id: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry with the tenant's connection state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub provider: String,
    pub name: String,
    pub category: String,
    pub connected: bool,
    pub connection_id: Option<Uuid>,
    pub connected_at: Option<DateTime<Utc>>,
}

/// Result of starting a connection flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub connection_id: Uuid,
    pub provider: String,
    pub status: String,
    pub connect_url: String,
}
