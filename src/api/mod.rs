mod handlers;
mod middleware;
mod proxy;
pub mod routes;
mod state;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderValue, Uri},
    routing::{delete, get, on, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TenantContext;

pub use middleware::RateLimiter;
pub use state::AppState;

/// Largest audio upload accepted for transcription.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let mut api = Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        // Share
        .route("/api/share", post(handlers::create_share))
        .route("/api/share/{id}", get(handlers::get_share))
        // Preferences
        .route("/api/preferences/autopilot", get(handlers::get_autopilot))
        .route("/api/preferences/autopilot", put(handlers::set_autopilot))
        .route("/api/preferences/recent-commands", get(handlers::list_recent_commands))
        .route("/api/preferences/recent-commands", post(handlers::push_recent_command))
        // Integrations
        .route("/api/integrations", get(handlers::list_integrations))
        .route("/api/integrations/{provider}/connect", post(handlers::connect_integration))
        .route("/api/integrations/{provider}", delete(handlers::disconnect_integration))
        // Voice & ChatKit
        .route(
            "/api/voice/transcribe",
            post(handlers::transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/api/voice/speech", post(handlers::speech))
        .route("/api/chatkit/session", post(handlers::chatkit_session));

    // Backend proxies
    for route in routes::PROXY_ROUTES {
        api = api.route(
            route.path,
            on(
                route.verb.filter(),
                move |State(state): State<AppState>,
                      tenant: TenantContext,
                      uri: Uri,
                      headers: HeaderMap,
                      body: Bytes| {
                    proxy::proxy(route, state, tenant, uri, headers, body)
                },
            ),
        );
    }

    let mut router = api.fallback(handlers::not_found);

    if let Some(max_requests) = state.config.rate_limit {
        router = router.layer(axum::middleware::from_fn_with_state(
            RateLimiter::per_minute(max_requests),
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.cors_origins.as_deref()))
        .with_state(state)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}
