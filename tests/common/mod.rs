#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use aklow_gateway::api::{create_router, AppState};
use aklow_gateway::auth::SessionSigner;
use aklow_gateway::clock::{Clock, ManualClock};
use aklow_gateway::config::GatewayConfig;
use aklow_gateway::db::Database;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode},
    response::Response,
    Router,
};
use axum_test::TestServer;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SECRET: &str = "integration-test-secret";
pub const INTERNAL_KEY: &str = "internal-test-key";

/// A request the mock backend received.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("captured body is not JSON")
    }
}

#[derive(Debug, Clone)]
struct MockResponse {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

/// Stand-in for every backend: records requests and replies with canned
/// responses keyed by path. Unconfigured paths answer 200 `{"ok":true}`.
#[derive(Clone)]
pub struct MockUpstream {
    pub url: String,
    captured: Arc<Mutex<Vec<Captured>>>,
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let captured: Arc<Mutex<Vec<Captured>>> = Arc::default();
        let responses: Arc<Mutex<HashMap<String, MockResponse>>> = Arc::default();

        let app = {
            let captured = captured.clone();
            let responses = responses.clone();
            Router::new().fallback(move |request: Request| {
                let captured = captured.clone();
                let responses = responses.clone();
                async move {
                    let (parts, body) = request.into_parts();
                    let body = to_bytes(body, usize::MAX).await.unwrap();
                    let path = parts.uri.path().to_string();
                    captured.lock().unwrap().push(Captured {
                        method: parts.method.to_string(),
                        path: path.clone(),
                        query: parts.uri.query().map(str::to_string),
                        headers: parts
                            .headers
                            .iter()
                            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
                            .collect(),
                        body: body.to_vec(),
                    });

                    let canned = responses.lock().unwrap().get(&path).cloned();
                    let canned = canned.unwrap_or_else(|| MockResponse {
                        status: StatusCode::OK,
                        content_type: "application/json".to_string(),
                        body: serde_json::to_vec(&json!({ "ok": true, "path": path })).unwrap(),
                    });
                    Response::builder()
                        .status(canned.status)
                        .header(header::CONTENT_TYPE, canned.content_type)
                        .body(Body::from(canned.body))
                        .unwrap()
                }
            })
        };

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            captured,
            responses,
        }
    }

    pub fn respond_json(&self, path: &str, status: u16, body: Value) {
        self.respond_bytes(
            path,
            status,
            "application/json",
            &serde_json::to_vec(&body).unwrap(),
        );
    }

    pub fn respond_bytes(&self, path: &str, status: u16, content_type: &str, body: &[u8]) {
        self.responses.lock().unwrap().insert(
            path.to_string(),
            MockResponse {
                status: StatusCode::from_u16(status).unwrap(),
                content_type: content_type.to_string(),
                body: body.to_vec(),
            },
        );
    }

    /// Grant `features` to `tenant` on the entitlements endpoint.
    pub fn entitle(&self, tenant: &str, features: &[&str]) {
        self.respond_json(
            &format!("/v1/tenants/{}/entitlements", tenant),
            200,
            json!({ "entitlements": features }),
        );
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Captured> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn last_request(&self) -> Captured {
        self.requests().pop().expect("upstream received no requests")
    }
}

/// A base URL nothing is listening on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub struct Harness {
    pub server: TestServer,
    pub upstream: MockUpstream,
    pub clock: ManualClock,
    /// The same router served on a real socket.
    pub addr: SocketAddr,
    signer: SessionSigner,
}

impl Harness {
    pub fn token(&self, tenant: &str, user: &str) -> String {
        self.signer
            .issue_for(tenant, user, self.clock.now(), chrono::Duration::hours(1))
            .unwrap()
    }

    pub fn bearer(&self, tenant: &str, user: &str) -> String {
        format!("Bearer {}", self.token(tenant, user))
    }

    /// Send `target` as the request line exactly as written. HTTP clients
    /// normalize dot segments before sending, so this goes over a bare socket.
    /// Returns the response status.
    pub async fn raw_get(&self, target: &str, authorization: &str) -> u16 {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nAuthorization: {}\r\nConnection: close\r\n\r\n",
            target, self.addr, authorization
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response)
            .split_whitespace()
            .nth(1)
            .and_then(|status| status.parse().ok())
            .expect("response has no status line")
    }
}

pub async fn harness() -> Harness {
    harness_with(|config| config).await
}

/// Gateway wired to a fresh mock upstream, with `configure` applied last.
pub async fn harness_with(configure: impl FnOnce(GatewayConfig) -> GatewayConfig) -> Harness {
    let upstream = MockUpstream::start().await;
    let config = configure(
        GatewayConfig::for_testing(SECRET)
            .with_backends(upstream.url.clone())
            .with_internal_api_key(INTERNAL_KEY)
            .with_openai(format!("{}/openai", upstream.url), "sk-test")
            .with_chatkit_workflow("wf_test"),
    );

    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");

    let clock = ManualClock::default();
    let state = AppState::with_clock(config, db, Arc::new(clock.clone()))
        .expect("Failed to build state");
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let server = TestServer::new(router).expect("Failed to create test server");

    Harness {
        server,
        upstream,
        clock,
        addr,
        signer: SessionSigner::new(SECRET),
    }
}
