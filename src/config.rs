//! Gateway configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_ORCHESTRATOR_URL: &str = "http://localhost:8080";
const DEFAULT_AGENT_URL: &str = "http://localhost:8090";
const DEFAULT_PYTHON_URL: &str = "http://localhost:8000";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Shared chat snapshots live for seven days.
pub const DEFAULT_SHARE_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// Orchestrator/gateway backend (from AKLOW_GATEWAY_URL)
    pub orchestrator_url: String,
    /// Agent backend (from AKLOW_AGENT_URL)
    pub agent_url: String,
    /// Python backend (from AKLOW_PYTHON_URL)
    pub python_url: String,
    /// Service-to-service key sent on every forwarded call (from AKLOW_INTERNAL_API_KEY)
    pub internal_api_key: Option<String>,
    /// HMAC secret for session tokens (from AKLOW_SESSION_SECRET)
    pub session_secret: String,
    /// Base URL used to build share links (from AKLOW_PUBLIC_URL)
    pub public_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub chatkit_workflow_id: Option<String>,
    pub share_ttl: chrono::Duration,
    pub upstream_timeout: Duration,
    /// Requests per minute per client IP; `None` disables limiting.
    pub rate_limit: Option<u32>,
    /// Allowed CORS origins; `None` means permissive.
    pub cors_origins: Option<Vec<String>>,
    pub data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("orchestrator_url", &self.orchestrator_url)
            .field("agent_url", &self.agent_url)
            .field("python_url", &self.python_url)
            .field("internal_api_key", &self.internal_api_key.as_ref().map(|_| "***"))
            .field("public_url", &self.public_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("chatkit_workflow_id", &self.chatkit_workflow_id)
            .field("share_ttl", &self.share_ttl)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("rate_limit", &self.rate_limit)
            .field("cors_origins", &self.cors_origins)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session_secret =
            get("AKLOW_SESSION_SECRET").ok_or(ConfigError::Missing("AKLOW_SESSION_SECRET"))?;

        let url = |var: &'static str, default: &str| -> Result<String, ConfigError> {
            let value = get(var).unwrap_or_else(|| default.to_string());
            normalize_url(var, &value)
        };

        let share_ttl_hours = parse_number(&get, "AKLOW_SHARE_TTL_HOURS")?
            .unwrap_or(DEFAULT_SHARE_TTL_HOURS);
        if share_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "AKLOW_SHARE_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        let timeout_secs = parse_number(&get, "AKLOW_UPSTREAM_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        let cors_origins = get("AKLOW_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            orchestrator_url: url("AKLOW_GATEWAY_URL", DEFAULT_ORCHESTRATOR_URL)?,
            agent_url: url("AKLOW_AGENT_URL", DEFAULT_AGENT_URL)?,
            python_url: url("AKLOW_PYTHON_URL", DEFAULT_PYTHON_URL)?,
            internal_api_key: get("AKLOW_INTERNAL_API_KEY"),
            session_secret,
            public_url: url("AKLOW_PUBLIC_URL", DEFAULT_PUBLIC_URL)?,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: url("OPENAI_BASE_URL", DEFAULT_OPENAI_URL)?,
            chatkit_workflow_id: get("AKLOW_CHATKIT_WORKFLOW_ID"),
            share_ttl: chrono::Duration::hours(share_ttl_hours),
            upstream_timeout: Duration::from_secs(timeout_secs),
            rate_limit: parse_number(&get, "AKLOW_RATE_LIMIT")?,
            cors_origins,
            data_dir: get("AKLOW_DATA_DIR").map(PathBuf::from),
        })
    }

    /// Defaults with a fixed secret and no third-party keys (for testing).
    pub fn for_testing(secret: impl Into<String>) -> Self {
        Self {
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            agent_url: DEFAULT_AGENT_URL.to_string(),
            python_url: DEFAULT_PYTHON_URL.to_string(),
            internal_api_key: None,
            session_secret: secret.into(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_URL.to_string(),
            chatkit_workflow_id: None,
            share_ttl: chrono::Duration::hours(DEFAULT_SHARE_TTL_HOURS),
            upstream_timeout: Duration::from_secs(5),
            rate_limit: None,
            cors_origins: None,
            data_dir: None,
        }
    }

    /// Point all three backends at one base URL.
    pub fn with_backends(mut self, base_url: impl Into<String>) -> Self {
        let base_url = trim_slash(base_url.into());
        self.orchestrator_url = base_url.clone();
        self.agent_url = base_url.clone();
        self.python_url = base_url;
        self
    }

    pub fn with_orchestrator_url(mut self, url: impl Into<String>) -> Self {
        self.orchestrator_url = trim_slash(url.into());
        self
    }

    pub fn with_agent_url(mut self, url: impl Into<String>) -> Self {
        self.agent_url = trim_slash(url.into());
        self
    }

    pub fn with_python_url(mut self, url: impl Into<String>) -> Self {
        self.python_url = trim_slash(url.into());
        self
    }

    pub fn with_internal_api_key(mut self, key: impl Into<String>) -> Self {
        self.internal_api_key = Some(key.into());
        self
    }

    pub fn with_openai(mut self, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.openai_base_url = trim_slash(base_url.into());
        self.openai_api_key = Some(api_key.into());
        self
    }

    pub fn with_chatkit_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.chatkit_workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_share_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.share_ttl = ttl;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32) -> Self {
        self.rate_limit = Some(max_requests);
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }
}

fn parse_number<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn normalize_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(value).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(trim_slash(value.to_string()))
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
