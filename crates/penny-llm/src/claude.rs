//! Claude BYOK adapter.
//!
//! `x-api-key`-keyed messages API. Text deltas arrive as
//! `content_block_delta` events; every other event type (message start,
//! block boundaries, ping) carries no text and is ignored.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use penny_core::turns::Role;

use crate::call::AuditCall;
use crate::error::{status_error, ProviderError, ProviderResult, QuotaScope};
use crate::provider::{FragmentStream, Provider, ProviderKind};
use crate::sse::{data_frames, decode_frame};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Pinned API version header value.
const API_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Claude adapter configuration.
#[derive(Clone, Debug)]
pub struct ClaudeConfig {
    /// Caller-supplied API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Origin override, used by tests.
    pub base_url: Option<String>,
}

/// Claude BYOK provider.
pub struct ClaudeProvider {
    config: ClaudeConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessageParam<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<MessageParam<'a>>,
    stream: bool,
    temperature: f64,
}

#[derive(Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<EventDelta>,
}

#[derive(Deserialize)]
struct EventDelta {
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl ClaudeProvider {
    /// Create an adapter with its own HTTP client.
    #[must_use]
    pub fn new(config: ClaudeConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create an adapter sharing an HTTP client.
    #[must_use]
    pub fn with_client(config: ClaudeConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let key = HeaderValue::from_str(&self.config.api_key).map_err(|e| ProviderError::Auth {
            message: format!("invalid API key: {e}"),
        })?;
        let _ = headers.insert("x-api-key", key);
        Ok(headers)
    }

    fn build_request<'a>(&'a self, call: &'a AuditCall, stream: bool) -> MessagesRequest<'a> {
        let mut messages = Vec::with_capacity(call.history.len() + 1);
        for turn in &call.history {
            messages.push(MessageParam {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(MessageParam {
            role: "user",
            content: &call.snapshot,
        });
        MessagesRequest {
            model: &call.model,
            max_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system: &call.system_prompt,
            messages,
            stream,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    async fn send(&self, call: &AuditCall, stream: bool) -> ProviderResult<reqwest::Response> {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base}/v1/messages");
        debug!(model = %call.model, stream, "sending messages request");
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&self.build_request(call, stream))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "messages request failed");
            return Err(status_error(
                status.as_u16(),
                &body,
                QuotaScope::ProviderThrottle,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "claude", model = %self.config.model))]
    async fn stream(&self, call: &AuditCall) -> ProviderResult<FragmentStream> {
        let response = self.send(call, true).await?;
        let frames = data_frames(response.bytes_stream(), false);
        let fragments = frames.filter_map(|frame| async move {
            match frame {
                Err(e) => Some(Err(e)),
                Ok(payload) => decode_frame::<SseEvent>(&payload, "claude")
                    .filter(|event| event.event_type == "content_block_delta")
                    .and_then(|event| event.delta)
                    .and_then(|delta| delta.text)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
            }
        });
        Ok(Box::pin(fragments))
    }

    #[instrument(skip_all, fields(provider = "claude", model = %self.config.model))]
    async fn complete(&self, call: &AuditCall) -> ProviderResult<String> {
        let response = self.send(call, false).await?;
        let body: MessagesResponse = response.json().await?;
        body.content
            .into_iter()
            .find_map(|block| block.text)
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
