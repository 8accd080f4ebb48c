//! Proxy route table.
//!
//! Each entry maps one local method + path onto a backend path. `{name}`
//! segments in `path` are captured and substituted into `upstream`;
//! `{tenant}` in `upstream` is always the verified tenant id.

use axum::{http::Method, routing::MethodFilter};

use crate::upstream::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }

    pub fn filter(&self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Put => MethodFilter::PUT,
            Self::Patch => MethodFilter::PATCH,
            Self::Delete => MethodFilter::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProxyRoute {
    pub verb: Verb,
    pub path: &'static str,
    pub backend: Backend,
    pub upstream: &'static str,
    /// Entitlement the tenant must hold, if any.
    pub entitlement: Option<&'static str>,
}

impl ProxyRoute {
    /// Resolve the backend path for a concrete request path.
    ///
    /// Returns `None` when `request_path` does not match this route or a
    /// capture is not a single plain segment (`..`, `%2e%2e`, `a%2Fb`).
    pub fn upstream_path(&self, request_path: &str, tenant_id: &str) -> Option<String> {
        let pattern: Vec<&str> = self.path.trim_matches('/').split('/').collect();
        let actual: Vec<&str> = request_path.trim_matches('/').split('/').collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (p, a) in pattern.iter().zip(&actual) {
            match p.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => captures.push((name, path_segment(a)?)),
                None if p == a => {}
                None => return None,
            }
        }

        let mut upstream = self
            .upstream
            .replace("{tenant}", &urlencoding::encode(tenant_id));
        for (name, value) in captures {
            upstream = upstream.replace(&format!("{{{}}}", name), &value);
        }
        Some(upstream)
    }
}

/// Decode a captured segment, refuse anything that could step out of its
/// place in the backend path, and re-encode it.
fn path_segment(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    if decoded.is_empty()
        || decoded == "."
        || decoded == ".."
        || decoded.contains('/')
        || decoded.contains('\\')
    {
        return None;
    }
    Some(urlencoding::encode(&decoded).into_owned())
}

const fn route(
    verb: Verb,
    path: &'static str,
    backend: Backend,
    upstream: &'static str,
) -> ProxyRoute {
    ProxyRoute {
        verb,
        path,
        backend,
        upstream,
        entitlement: None,
    }
}

const fn gated(
    verb: Verb,
    path: &'static str,
    upstream: &'static str,
    entitlement: &'static str,
) -> ProxyRoute {
    ProxyRoute {
        verb,
        path,
        backend: Backend::Orchestrator,
        upstream,
        entitlement: Some(entitlement),
    }
}

use crate::upstream::Backend::{Agent, Orchestrator, Python};
use self::Verb::{Delete, Get, Patch, Post, Put};

pub const PROXY_ROUTES: &[ProxyRoute] = &[
    // Inbox
    route(Get, "/api/inbox/conversations", Orchestrator, "/v1/inbox/conversations"),
    route(Get, "/api/inbox/conversations/{id}", Orchestrator, "/v1/inbox/conversations/{id}"),
    route(Patch, "/api/inbox/conversations/{id}", Orchestrator, "/v1/inbox/conversations/{id}"),
    route(Get, "/api/inbox/conversations/{id}/messages", Orchestrator, "/v1/inbox/conversations/{id}/messages"),
    route(Post, "/api/inbox/conversations/{id}/messages", Orchestrator, "/v1/inbox/conversations/{id}/messages"),
    route(Post, "/api/inbox/conversations/{id}/assign", Orchestrator, "/v1/inbox/conversations/{id}/assign"),
    route(Post, "/api/inbox/conversations/{id}/close", Orchestrator, "/v1/inbox/conversations/{id}/close"),
    route(Post, "/api/inbox/conversations/{id}/reopen", Orchestrator, "/v1/inbox/conversations/{id}/reopen"),
    // Marketing
    gated(Get, "/api/marketing/campaigns", "/v1/marketing/campaigns", "marketing"),
    gated(Post, "/api/marketing/campaigns", "/v1/marketing/campaigns", "marketing"),
    gated(Get, "/api/marketing/campaigns/{id}", "/v1/marketing/campaigns/{id}", "marketing"),
    gated(Patch, "/api/marketing/campaigns/{id}", "/v1/marketing/campaigns/{id}", "marketing"),
    gated(Delete, "/api/marketing/campaigns/{id}", "/v1/marketing/campaigns/{id}", "marketing"),
    gated(Post, "/api/marketing/campaigns/{id}/send", "/v1/marketing/campaigns/{id}/send", "marketing"),
    gated(Get, "/api/marketing/campaigns/{id}/stats", "/v1/marketing/campaigns/{id}/stats", "marketing"),
    gated(Get, "/api/marketing/audiences", "/v1/marketing/audiences", "marketing"),
    // Telephony
    gated(Get, "/api/telephony/calls", "/v1/telephony/calls", "telephony"),
    gated(Get, "/api/telephony/calls/{id}", "/v1/telephony/calls/{id}", "telephony"),
    gated(Post, "/api/telephony/calls/{id}/callback", "/v1/telephony/calls/{id}/callback", "telephony"),
    gated(Get, "/api/telephony/calls/{id}/recording", "/v1/telephony/calls/{id}/recording", "telephony"),
    gated(Get, "/api/telephony/numbers", "/v1/telephony/numbers", "telephony"),
    gated(Get, "/api/telephony/settings", "/v1/telephony/settings", "telephony"),
    gated(Put, "/api/telephony/settings", "/v1/telephony/settings", "telephony"),
    // Reviews
    gated(Get, "/api/reviews", "/v1/reviews", "reviews"),
    gated(Get, "/api/reviews/stats", "/v1/reviews/stats", "reviews"),
    gated(Post, "/api/reviews/{id}/reply", "/v1/reviews/{id}/reply", "reviews"),
    gated(Post, "/api/reviews/sync", "/v1/reviews/sync", "reviews"),
    // Documents
    route(Get, "/api/documents", Orchestrator, "/v1/documents"),
    route(Post, "/api/documents", Orchestrator, "/v1/documents"),
    route(Get, "/api/documents/{id}", Orchestrator, "/v1/documents/{id}"),
    route(Patch, "/api/documents/{id}", Orchestrator, "/v1/documents/{id}"),
    route(Delete, "/api/documents/{id}", Orchestrator, "/v1/documents/{id}"),
    route(Get, "/api/documents/{id}/download", Orchestrator, "/v1/documents/{id}/content"),
    route(Post, "/api/documents/{id}/ingest", Python, "/ingest/documents/{id}"),
    // Settings
    route(Get, "/api/settings/business", Orchestrator, "/v1/tenants/{tenant}/profile"),
    route(Put, "/api/settings/business", Orchestrator, "/v1/tenants/{tenant}/profile"),
    route(Get, "/api/settings/notifications", Orchestrator, "/v1/tenants/{tenant}/notifications"),
    route(Put, "/api/settings/notifications", Orchestrator, "/v1/tenants/{tenant}/notifications"),
    route(Get, "/api/settings/team", Orchestrator, "/v1/tenants/{tenant}/members"),
    route(Post, "/api/settings/team/invite", Orchestrator, "/v1/tenants/{tenant}/invitations"),
    route(Delete, "/api/settings/team/{member_id}", Orchestrator, "/v1/tenants/{tenant}/members/{member_id}"),
    route(Get, "/api/settings/billing", Orchestrator, "/v1/tenants/{tenant}/billing"),
    // Entitlements
    route(Get, "/api/entitlements", Orchestrator, "/v1/tenants/{tenant}/entitlements"),
    // Agent
    route(Post, "/api/agent/chat", Agent, "/agent/chat"),
    route(Get, "/api/agent/threads", Agent, "/agent/threads"),
    route(Get, "/api/agent/threads/{id}", Agent, "/agent/threads/{id}"),
    route(Delete, "/api/agent/threads/{id}", Agent, "/agent/threads/{id}"),
    route(Get, "/api/agent/threads/{id}/messages", Agent, "/agent/threads/{id}/messages"),
    route(Post, "/api/agent/actions/{id}/approve", Agent, "/agent/actions/{id}/approve"),
    route(Post, "/api/agent/actions/{id}/reject", Agent, "/agent/actions/{id}/reject"),
    route(Get, "/api/agent/suggestions", Agent, "/agent/suggestions"),
    // Analytics
    route(Get, "/api/analytics/dashboard", Python, "/analytics/dashboard"),
    route(Post, "/api/analytics/query", Python, "/analytics/query"),
];
