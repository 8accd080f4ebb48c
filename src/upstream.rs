//! HTTP client for the backends the gateway forwards to.
//!
//! Every forwarded call carries service-to-service headers:
//! - `x-internal-api-key` - shared key (when configured)
//! - `x-tenant-id` / `x-user-id` - from the verified session
//! - `x-request-id` - fresh per forwarded call
//!
//! Responses are relayed as-is. Failures map onto [`ApiError`]: upstream
//! non-2xx keeps its status, unreachable backends become 503 and unreadable
//! success bodies become 502.

use axum::{
    body::Bytes,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::config::GatewayConfig;
use crate::error::ApiError;

pub const INTERNAL_KEY_HEADER: &str = "x-internal-api-key";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Which backend a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Orchestrator,
    Agent,
    Python,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Agent => "agent",
            Self::Python => "python",
        }
    }
}

/// Body of a forwarded request.
#[derive(Debug, Clone)]
pub enum ForwardBody {
    Json(Value),
    Raw { content_type: String, bytes: Bytes },
}

#[derive(Debug)]
pub struct ForwardRequest<'a> {
    pub backend: Backend,
    pub method: Method,
    /// Path on the backend, starting with `/`.
    pub path: String,
    pub query: Option<String>,
    pub tenant: &'a TenantContext,
    pub accept: Option<HeaderValue>,
    pub body: Option<ForwardBody>,
}

impl<'a> ForwardRequest<'a> {
    pub fn get(backend: Backend, path: impl Into<String>, tenant: &'a TenantContext) -> Self {
        Self {
            backend,
            method: Method::GET,
            path: path.into(),
            query: None,
            tenant,
            accept: None,
            body: None,
        }
    }
}

/// A successful upstream response ready to hand back to the browser.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub content_disposition: Option<HeaderValue>,
    pub body: Bytes,
}

impl Relayed {
    pub fn is_json(&self) -> bool {
        is_json_content_type(self.content_type.as_ref())
    }

    /// Decode the body as JSON. Empty bodies decode to `null`.
    pub fn json(&self) -> Result<Value, ApiError> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::BadGateway(format!("invalid JSON from upstream: {}", e)))
    }
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        if let Some(disposition) = self.content_disposition {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
        response
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    orchestrator_url: String,
    agent_url: String,
    python_url: String,
    internal_api_key: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.upstream_timeout).build()?;
        Ok(Self {
            client,
            orchestrator_url: config.orchestrator_url.clone(),
            agent_url: config.agent_url.clone(),
            python_url: config.python_url.clone(),
            internal_api_key: config.internal_api_key.clone(),
        })
    }

    pub fn base_url(&self, backend: Backend) -> &str {
        match backend {
            Backend::Orchestrator => &self.orchestrator_url,
            Backend::Agent => &self.agent_url,
            Backend::Python => &self.python_url,
        }
    }

    /// Build a request with service-to-service headers.
    fn request(
        &self,
        backend: Backend,
        method: Method,
        path: &str,
        tenant: &TenantContext,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url(backend), path);
        let mut req = self
            .client
            .request(method, &url)
            .header(TENANT_HEADER, &tenant.tenant_id)
            .header(USER_HEADER, &tenant.user_id)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(ref key) = self.internal_api_key {
            req = req.header(INTERNAL_KEY_HEADER, key);
        }
        req
    }

    pub async fn forward(&self, forward: ForwardRequest<'_>) -> Result<Relayed, ApiError> {
        let backend = forward.backend;
        let path = match forward.query.as_deref().and_then(sanitize_query) {
            Some(query) => format!("{}?{}", forward.path, query),
            None => forward.path,
        };

        tracing::debug!(
            backend = backend.as_str(),
            tenant = %forward.tenant.tenant_id,
            "{} {}",
            forward.method,
            path
        );

        let mut req = self.request(backend, forward.method, &path, forward.tenant);
        req = req.header(
            header::ACCEPT,
            forward
                .accept
                .unwrap_or_else(|| HeaderValue::from_static("application/json")),
        );
        req = match forward.body {
            Some(ForwardBody::Json(mut value)) => {
                scrub_tenant(&mut value, &forward.tenant.tenant_id);
                req.json(&value)
            }
            Some(ForwardBody::Raw { content_type, bytes }) => req
                .header(header::CONTENT_TYPE, content_type)
                .body(bytes),
            None => req,
        };

        let response = req
            .send()
            .await
            .map_err(|e| transport_error(backend.as_str(), e))?;
        relay(backend.as_str(), response).await
    }

    /// GET a backend path and decode its JSON body.
    pub async fn get_json(
        &self,
        backend: Backend,
        path: &str,
        tenant: &TenantContext,
    ) -> Result<Value, ApiError> {
        self.forward(ForwardRequest::get(backend, path, tenant))
            .await?
            .json()
    }
}

/// Convert an upstream response into a [`Relayed`] or an [`ApiError`].
pub(crate) async fn relay(source: &str, response: reqwest::Response) -> Result<Relayed, ApiError> {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let content_disposition = response.headers().get(header::CONTENT_DISPOSITION).cloned();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(source, e))?;

    if !status.is_success() {
        tracing::warn!("{} responded with {}", source, status);
        return Err(ApiError::Upstream {
            status,
            body: error_body(status, &body),
        });
    }

    let relayed = Relayed {
        status,
        content_type,
        content_disposition,
        body,
    };
    if relayed.is_json() {
        relayed.json()?;
    }
    Ok(relayed)
}

/// Upstream error bodies pass through when they are JSON; anything else is
/// wrapped in the standard envelope.
fn error_body(status: StatusCode, body: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if value.is_object() {
            return value;
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Upstream error").to_string()
    } else {
        text
    };
    json!({ "error": "upstream_error", "message": message })
}

pub(crate) fn transport_error(source: &str, e: reqwest::Error) -> ApiError {
    if e.is_connect() || e.is_timeout() {
        tracing::warn!("{} unreachable: {}", source, e);
        ApiError::Unavailable(format!("{} is not reachable", source))
    } else if e.is_decode() || e.is_body() {
        tracing::warn!("{} sent an unreadable response: {}", source, e);
        ApiError::BadGateway(format!("unreadable response from {}", source))
    } else {
        ApiError::Internal(format!("request to {} failed: {}", source, e))
    }
}

pub fn is_json_content_type(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let mime = v.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Drop tenant overrides from a raw query string. Keys are compared after
/// percent-decoding, so `tenant%5Fid` is dropped like `tenant_id`.
pub fn sanitize_query(raw: &str) -> Option<String> {
    let kept: Vec<&str> = raw
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("").replace('+', " ");
            match urlencoding::decode(&key) {
                Ok(key) => !names_tenant(&key),
                // Not UTF-8 once decoded
                Err(_) => false,
            }
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

/// Overwrite top-level tenant keys in a JSON body with the verified tenant.
pub fn scrub_tenant(value: &mut Value, tenant_id: &str) {
    if let Value::Object(map) = value {
        for (key, slot) in map.iter_mut() {
            if names_tenant(key) {
                *slot = Value::String(tenant_id.to_string());
            }
        }
    }
}

/// `tenant_id`, `tenantId`, `TENANT_ID` and friends.
fn names_tenant(key: &str) -> bool {
    let folded: String = key.chars().filter(|c| *c != '_').collect();
    folded.eq_ignore_ascii_case("tenantid")
}
