//! Verified tenant context.
//!
//! Browsers authenticate with a signed session token, sent either as a
//! bearer token or in the `aklow_session` cookie. The token format is
//! `v1.<claims>.<signature>` where claims are base64url JSON and the
//! signature is HMAC-SHA256 over `v1.<claims>`.
//!
//! The tenant id forwarded to backends always comes from these claims,
//! never from request bodies or query strings.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::api::AppState;
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "aklow_session";
const TOKEN_VERSION: &str = "v1";

/// Claims carried in a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiry as unix seconds.
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Expired => ApiError::SessionExpired,
            SessionError::Malformed | SessionError::BadSignature => ApiError::InvalidSession,
        }
    }
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    key: Arc<[u8]>,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    pub fn issue(&self, claims: &SessionClaims) -> Result<String, serde_json::Error> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{}.{}", TOKEN_VERSION, payload);

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Issue a token for `tenant_id`/`user_id` valid for `ttl` from `now`.
    pub fn issue_for(
        &self,
        tenant_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, serde_json::Error> {
        self.issue(&SessionClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            email: None,
            exp: (now + ttl).timestamp(),
        })
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let mut parts = token.trim().splitn(3, '.');
        let (version, payload, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(p), Some(s)) => (v, p, s),
            _ => return Err(SessionError::Malformed),
        };
        if version != TOKEN_VERSION {
            return Err(SessionError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac();
        mac.update(version.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let claims: SessionClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(SessionError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}

/// Tenant and user on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
    pub email: Option<String>,
}

impl TenantContext {
    pub fn from_claims(claims: SessionClaims) -> Result<Self, ApiError> {
        let tenant_id = claims.tenant_id.trim();
        if tenant_id.is_empty() {
            return Err(ApiError::MissingTenant);
        }
        Ok(Self {
            tenant_id: tenant_id.to_string(),
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            tracing::debug!("Request without session token");
            return Err(ApiError::MissingTenant);
        };

        let claims = state.signer.verify(token, state.clock.now()).map_err(|e| {
            tracing::warn!("Rejected session token: {}", e);
            ApiError::from(e)
        })?;

        Self::from_claims(claims)
    }
}

/// Bearer token first, then the session cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signer() -> SessionSigner {
        SessionSigner::new("unit-test-secret")
    }

    #[test]
    fn issued_tokens_verify() {
        let now = Utc::now();
        let token = signer()
            .issue_for("tenant-1", "user-1", now, Duration::hours(1))
            .unwrap();

        let claims = signer().verify(&token, now).unwrap();
        assert_eq!(claims.tenant_id, "tenant-1");
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let now = Utc::now();
        let token = SessionSigner::new("other-secret")
            .issue_for("tenant-1", "user-1", now, Duration::hours(1))
            .unwrap();

        assert_eq!(signer().verify(&token, now), Err(SessionError::BadSignature));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let now = Utc::now();
        let token = signer()
            .issue_for("tenant-1", "user-1", now, Duration::hours(1))
            .unwrap();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&SessionClaims {
                sub: "user-1".into(),
                tenant_id: "tenant-2".into(),
                email: None,
                exp: (now + Duration::hours(1)).timestamp(),
            })
            .unwrap(),
        );
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        assert_eq!(signer().verify(&tampered, now), Err(SessionError::BadSignature));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let now = Utc::now();
        let token = signer()
            .issue_for("tenant-1", "user-1", now, Duration::minutes(5))
            .unwrap();

        assert_eq!(
            signer().verify(&token, now + Duration::minutes(5)),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let now = Utc::now();
        assert_eq!(signer().verify("not-a-token", now), Err(SessionError::Malformed));
        assert_eq!(signer().verify("v2.abc.def", now), Err(SessionError::Malformed));
        assert_eq!(signer().verify("v1.abc.!!!", now), Err(SessionError::Malformed));
    }

    #[test]
    fn blank_tenant_is_missing_tenant() {
        let claims = SessionClaims {
            sub: "user-1".into(),
            tenant_id: "  ".into(),
            email: None,
            exp: 0,
        };
        assert!(matches!(
            TenantContext::from_claims(claims),
            Err(ApiError::MissingTenant)
        ));
    }

    #[test]
    fn reads_bearer_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("aklow_session=xyz"));
        assert_eq!(session_token(&headers), Some("abc"));
    }

    #[test]
    fn reads_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; aklow_session=xyz; locale=en"),
        );
        assert_eq!(session_token(&headers), Some("xyz"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(session_token(&headers), None);
    }
}
