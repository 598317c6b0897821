//! LLM backend trait and concrete implementations.
//!
//! All three backends speak the OpenAI chat-completions wire format and only
//! differ in endpoint and authentication:
//! - `OpenAiCompatibleBackend`: any compatible endpoint (DashScope compatible
//!   mode, vLLM, LMStudio, OpenRouter)
//! - `OpenAiBackend`: api.openai.com
//! - `OllamaBackend`: local Ollama

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.5;
/// Request timeout used by the `new` constructors.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,   // "system" | "user" | "assistant"
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Provider-specific fields merged into the request body
    /// (e.g. `{"enable_thinking": false}` for Qwen).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<serde_json::Value>,
}

impl LlmRequest {
    /// A system + user chat turn.
    pub fn chat(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message { role: "system".to_string(), content: system.into() },
                Message { role: "user".to_string(), content: user.into() },
            ],
            model: None,
            max_tokens: None,
            temperature: None,
            extra_body: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Reply text, trimmed. May be empty.
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl<'a> ChatBody<'a> {
    fn new(req: &'a LlmRequest, default_model: &'a str) -> Self {
        Self {
            model: req.model.as_deref().unwrap_or(default_model),
            messages: &req.messages,
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            stream: false,
            extra: req
                .extra_body
                .as_ref()
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl ChatCompletion {
    fn into_response(self, fallback_model: &str) -> LlmResponse {
        let usage = self.usage.unwrap_or_default();
        LlmResponse {
            content: self
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|c| c.trim().to_string())
                .unwrap_or_default(),
            model: self.model.unwrap_or_else(|| fallback_model.to_string()),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

/// Best-effort error text from a failed response body, JSON or not.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.and_then(|e| e.message).or(b.message))
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                "unknown API error".to_string()
            } else {
                text.chars().take(200).collect()
            }
        })
}

/// One chat-completions URL plus optional bearer token.
struct ChatEndpoint {
    url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl ChatEndpoint {
    fn new(url: String, api_key: Option<SecretString>, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, api_key, client })
    }

    async fn send(&self, req: &LlmRequest, default_model: &str) -> Result<LlmResponse, LlmError> {
        let mut builder = self.client.post(&self.url).json(&ChatBody::new(req, default_model));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(LlmError::ApiError { status: status.as_u16(), message: error_message(&body) });
        }
        let completion: ChatCompletion = serde_json::from_str(&body)?;
        Ok(completion.into_response(default_model))
    }
}

/// `{base}/chat/completions`, adding `/v1` unless the base already ends with it.
fn completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

// ── 1. OpenAI-Compatible ──────────────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub model: String,
    endpoint: ChatEndpoint,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Result<Self, LlmError> {
        Self::with_timeout(base_url, model, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            model: model.into(),
            endpoint: ChatEndpoint::new(completions_url(&base_url.into()), api_key, timeout)?,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.endpoint.send(&req, &self.model).await
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 2. OpenAI ─────────────────────────────────────────────────────────────────

pub struct OpenAiBackend {
    pub model: String,
    endpoint: ChatEndpoint,
}

impl OpenAiBackend {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(api_key, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: SecretString, model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            model: model.into(),
            endpoint: ChatEndpoint::new(OPENAI_URL.to_string(), Some(api_key), timeout)?,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.endpoint.send(&req, &self.model).await
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── 3. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaBackend {
    pub model: String,
    endpoint: ChatEndpoint,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(base_url, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            model: model.into(),
            endpoint: ChatEndpoint::new(completions_url(&base_url.into()), None, timeout)?,
        })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.endpoint.send(&req, &self.model).await
    }

    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { true }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
