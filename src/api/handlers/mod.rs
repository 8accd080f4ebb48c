use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::AppState;
use crate::auth::TenantContext;
use crate::error::ApiError;
use crate::models::*;
use crate::openai::{AudioUpload, ChatKitSession, SpeechInput, Transcription};
use crate::upstream::Relayed;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route".to_string())
}

// ============================================================
// Share
// ============================================================

pub async fn create_share(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<CreateShareInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ShareCreated>), ApiError> {
    let Json(input) = payload?;
    let snapshot = state.shares.create(&tenant.tenant_id, input)?;

    tracing::info!(tenant = %tenant.tenant_id, "Shared conversation {}", snapshot.id);

    Ok((
        StatusCode::CREATED,
        Json(ShareCreated {
            url: format!("{}/share/{}", state.config.public_url, snapshot.id),
            id: snapshot.id,
            expires_at: snapshot.expires_at,
        }),
    ))
}

/// Public: anyone holding the link can read the snapshot until it expires.
pub async fn get_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SharedSnapshot>, ApiError> {
    state
        .shares
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Shared conversation".to_string()))
}

// ============================================================
// Preferences
// ============================================================

pub async fn get_autopilot(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<AutopilotSettings>, ApiError> {
    Ok(Json(
        state
            .db
            .get_autopilot_settings(&tenant.tenant_id, &tenant.user_id)?,
    ))
}

pub async fn set_autopilot(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<SetAutopilotLevelInput>, JsonRejection>,
) -> Result<Json<AutopilotSettings>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(state.db.set_autopilot_level(
        &tenant.tenant_id,
        &tenant.user_id,
        input,
    )?))
}

pub async fn list_recent_commands(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<RecentCommand>>, ApiError> {
    Ok(Json(
        state
            .db
            .get_recent_commands(&tenant.tenant_id, &tenant.user_id)?,
    ))
}

pub async fn push_recent_command(
    State(state): State<AppState>,
    tenant: TenantContext,
    payload: Result<Json<PushRecentCommandInput>, JsonRejection>,
) -> Result<Json<Vec<RecentCommand>>, ApiError> {
    let Json(input) = payload?;
    if input.command.trim().is_empty() {
        return Err(ApiError::BadRequest("Command must not be empty".to_string()));
    }
    Ok(Json(state.db.push_recent_command(
        &tenant.tenant_id,
        &tenant.user_id,
        &input.command,
    )?))
}

// ============================================================
// Integrations
// ============================================================

pub async fn list_integrations(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<Vec<IntegrationSummary>>, ApiError> {
    let connections = state.db.get_connections(&tenant.tenant_id)?;

    let summaries = PROVIDERS
        .iter()
        .map(|provider| {
            let connection = connections.iter().find(|c| c.provider == provider.key);
            IntegrationSummary {
                provider: provider.key.to_string(),
                name: provider.name.to_string(),
                category: provider.category.to_string(),
                connected: connection.is_some(),
                connection_id: connection.map(|c| c.id),
                connected_at: connection.map(|c| c.created_at),
            }
        })
        .collect();

    Ok(Json(summaries))
}

/// Connection flows are mocked: the connection is recorded immediately.
pub async fn connect_integration(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(provider): Path<String>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let provider = find_provider(&provider)
        .ok_or_else(|| ApiError::NotFound("Integration provider".to_string()))?;

    let connection = state.db.create_connection(&tenant.tenant_id, provider.key)?;
    tracing::info!(tenant = %tenant.tenant_id, "Connected integration {}", provider.key);

    Ok(Json(ConnectResponse {
        connection_id: connection.id,
        provider: connection.provider,
        status: "connected".to_string(),
        connect_url: format!(
            "{}/settings/integrations?connected={}",
            state.config.public_url, provider.key
        ),
    }))
}

pub async fn disconnect_integration(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(provider): Path<String>,
) -> Result<StatusCode, ApiError> {
    let provider = find_provider(&provider)
        .ok_or_else(|| ApiError::NotFound("Integration provider".to_string()))?;

    if state.db.delete_connection(&tenant.tenant_id, provider.key)? {
        tracing::info!(tenant = %tenant.tenant_id, "Disconnected integration {}", provider.key);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Integration connection".to_string()))
    }
}

// ============================================================
// Voice & ChatKit
// ============================================================

pub async fn transcribe(
    State(state): State<AppState>,
    _tenant: TenantContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Transcription>, ApiError> {
    let mut multipart = multipart?;
    let mut file = None;
    let mut language = None;
    let mut prompt = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some((file_name, content_type, bytes));
            }
            "language" => language = Some(field.text().await?),
            "prompt" => prompt = Some(field.text().await?),
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("Missing audio file".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Audio file is empty".to_string()));
    }

    let upload = AudioUpload {
        file_name,
        content_type,
        bytes,
        language: language.filter(|l| !l.trim().is_empty()),
        prompt: prompt.filter(|p| !p.trim().is_empty()),
    };
    state.openai.transcribe(upload).await.map(Json)
}

pub async fn speech(
    State(state): State<AppState>,
    _tenant: TenantContext,
    payload: Result<Json<SpeechInput>, JsonRejection>,
) -> Result<Relayed, ApiError> {
    let Json(input) = payload?;
    state.openai.speech(&input).await
}

pub async fn chatkit_session(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> Result<Json<ChatKitSession>, ApiError> {
    state.openai.create_chatkit_session(&tenant).await.map(Json)
}
