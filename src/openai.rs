//! OpenAI client for voice and ChatKit.
//!
//! Configuration comes from [`GatewayConfig`]:
//! - `OPENAI_API_KEY` - required for every call
//! - `OPENAI_BASE_URL` - default `https://api.openai.com/v1`
//! - `AKLOW_CHATKIT_WORKFLOW_ID` - required for ChatKit sessions

use axum::body::Bytes;
use axum::http::HeaderValue;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::TenantContext;
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::upstream::{relay, transport_error, Relayed};

pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const SPEECH_MODEL: &str = "tts-1";
pub const DEFAULT_VOICE: &str = "alloy";
/// Longest input the speech endpoint accepts.
pub const MAX_SPEECH_CHARS: usize = 4096;

const VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

const SOURCE: &str = "openai";

/// Output encodings for synthesized speech.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpeechFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl SpeechFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Aac => "audio/aac",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechInput {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub format: Option<SpeechFormat>,
}

impl SpeechInput {
    /// Check the input and return the voice to use.
    pub fn validate(&self) -> Result<&str, ApiError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ApiError::BadRequest("Text must not be empty".to_string()));
        }
        if text.chars().count() > MAX_SPEECH_CHARS {
            return Err(ApiError::BadRequest(format!(
                "Text must be at most {} characters",
                MAX_SPEECH_CHARS
            )));
        }
        let voice = self.voice.as_deref().unwrap_or(DEFAULT_VOICE);
        if !VOICES.contains(&voice) {
            return Err(ApiError::BadRequest(format!("Unknown voice {}", voice)));
        }
        Ok(voice)
    }
}

/// An uploaded audio clip.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatKitSession {
    pub client_secret: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    chatkit_workflow_id: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &GatewayConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.upstream_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            chatkit_workflow_id: config.chatkit_workflow_id.clone(),
        })
    }

    fn request(&self, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ApiError::NotConfigured("OpenAI".to_string()))?;
        let url = format!("{}{}", self.base_url, path);
        Ok(self.client.post(url).bearer_auth(key))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Relayed, ApiError> {
        let response = req.send().await.map_err(|e| transport_error(SOURCE, e))?;
        relay(SOURCE, response).await
    }

    pub async fn transcribe(&self, upload: AudioUpload) -> Result<Transcription, ApiError> {
        let req = self.request("/audio/transcriptions")?;

        let mut file = multipart::Part::stream(upload.bytes).file_name(upload.file_name);
        if let Some(content_type) = upload.content_type.as_deref() {
            file = file
                .mime_str(content_type)
                .map_err(|_| ApiError::BadRequest(format!("Invalid content type {}", content_type)))?;
        }
        let mut form = multipart::Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .part("file", file);
        if let Some(language) = upload.language {
            form = form.text("language", language);
        }
        if let Some(prompt) = upload.prompt {
            form = form.text("prompt", prompt);
        }

        let relayed = self.send(req.multipart(form)).await?;
        serde_json::from_value(relayed.json()?)
            .map_err(|e| ApiError::BadGateway(format!("unexpected transcription payload: {}", e)))
    }

    /// Synthesize speech and return the audio ready to relay.
    pub async fn speech(&self, input: &SpeechInput) -> Result<Relayed, ApiError> {
        let voice = input.validate()?;
        let format = input.format.unwrap_or_default();
        let req = self.request("/audio/speech")?.json(&json!({
            "model": SPEECH_MODEL,
            "input": input.text.trim(),
            "voice": voice,
            "response_format": format.as_str(),
        }));

        let mut relayed = self.send(req).await?;
        if relayed.content_type.is_none() {
            relayed.content_type = Some(HeaderValue::from_static(format.content_type()));
        }
        Ok(relayed)
    }

    pub async fn create_chatkit_session(&self, tenant: &TenantContext) -> Result<ChatKitSession, ApiError> {
        let workflow_id = self
            .chatkit_workflow_id
            .as_ref()
            .ok_or_else(|| ApiError::NotConfigured("ChatKit workflow".to_string()))?;
        let req = self
            .request("/chatkit/sessions")?
            .header("OpenAI-Beta", "chatkit_beta=v1")
            .json(&json!({
                "workflow": { "id": workflow_id },
                "user": format!("{}:{}", tenant.tenant_id, tenant.user_id),
            }));

        let relayed = self.send(req).await?;
        serde_json::from_value(relayed.json()?)
            .map_err(|e| ApiError::BadGateway(format!("unexpected ChatKit payload: {}", e)))
    }
}
