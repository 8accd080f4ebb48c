use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chat message inside a shared snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareInput {
    #[serde(default)]
    pub title: Option<String>,
    pub messages: Vec<SharedMessage>,
}

/// A read-only copy of a conversation reachable by link until it expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedSnapshot {
    pub id: String,
    /// Owning tenant. Not exposed to link holders.
    #[serde(skip)]
    pub tenant_id: String,
    pub title: Option<String>,
    pub messages: Vec<SharedMessage>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareCreated {
    pub id: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}
