//! `OpenAI` BYOK adapter.
//!
//! Bearer-keyed chat completions. Reasoning-class models take their output
//! budget through `max_completion_tokens` and reject a custom temperature;
//! standard chat models use `max_tokens` plus a low temperature suited to
//! structured output.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use penny_core::turns::Role;

use crate::call::AuditCall;
use crate::error::{status_error, ProviderError, ProviderResult, QuotaScope};
use crate::provider::{FragmentStream, Provider, ProviderKind};
use crate::sse::{data_frames, decode_frame};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Output token budget when the caller does not override it.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

/// Low temperature: audits want structured, repeatable output.
const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Whether a model takes the reasoning-class request shape.
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
        || model.starts_with("gpt-5")
}

/// `OpenAI` adapter configuration.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Caller-supplied API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Origin override, used by tests.
    pub base_url: Option<String>,
}

/// `OpenAI` BYOK provider.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create an adapter with its own HTTP client.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create an adapter sharing an HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.config.api_key);
        let auth = HeaderValue::from_str(&bearer).map_err(|e| ProviderError::Auth {
            message: format!("invalid API key: {e}"),
        })?;
        let _ = headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    fn build_request<'a>(&'a self, call: &'a AuditCall, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(call.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &call.system_prompt,
        });
        for turn in &call.history {
            messages.push(ChatMessage {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &call.snapshot,
        });

        let reasoning = is_reasoning_model(&call.model);
        ChatRequest {
            model: &call.model,
            messages,
            stream,
            max_tokens: (!reasoning).then_some(DEFAULT_MAX_OUTPUT_TOKENS),
            max_completion_tokens: reasoning.then_some(DEFAULT_MAX_OUTPUT_TOKENS),
            temperature: (!reasoning).then_some(DEFAULT_TEMPERATURE),
        }
    }

    async fn send(&self, call: &AuditCall, stream: bool) -> ProviderResult<reqwest::Response> {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base}/v1/chat/completions");
        debug!(
            model = %call.model,
            reasoning = is_reasoning_model(&call.model),
            stream,
            "sending chat completion request"
        );
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
            error!(status = status.as_u16(), "chat completion request failed");
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
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "openai", model = %self.config.model))]
    async fn stream(&self, call: &AuditCall) -> ProviderResult<FragmentStream> {
        let response = self.send(call, true).await?;
        let frames = data_frames(response.bytes_stream(), false);
        let fragments = frames.filter_map(|frame| async move {
            match frame {
                Err(e) => Some(Err(e)),
                Ok(payload) => decode_frame::<ChatChunk>(&payload, "openai")
                    .and_then(|chunk| chunk.choices.into_iter().next())
                    .and_then(|choice| choice.delta.content)
                    .filter(|delta| !delta.is_empty())
                    .map(Ok),
            }
        });
        Ok(Box::pin(fragments))
    }

    #[instrument(skip_all, fields(provider = "openai", model = %self.config.model))]
    async fn complete(&self, call: &AuditCall) -> ProviderResult<String> {
        let response = self.send(call, false).await?;
        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, model: &str) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            api_key: "sk-test".into(),
            model: model.into(),
            base_url: Some(base_url.into()),
        })
    }

    fn call(model: &str) -> AuditCall {
        AuditCall::new("snapshot text", "system text", model)
    }

    // ── Request shape ────────────────────────────────────────────────────

    #[test]
    fn reasoning_models_detected_by_prefix() {
        assert!(is_reasoning_model("o3-mini"));
        assert!(is_reasoning_model("gpt-5"));
        assert!(!is_reasoning_model("gpt-4o"));
    }

    #[test]
    fn standard_model_uses_max_tokens_and_temperature() {
        let provider = provider("http://unused", "gpt-4o");
        let call = call("gpt-4o");
        let request = provider.build_request(&call, true);
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_OUTPUT_TOKENS));
        assert_eq!(request.max_completion_tokens, None);
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
    }

    #[test]
    fn reasoning_model_uses_completion_token_budget() {
        let provider = provider("http://unused", "o3-mini");
        let call = call("o3-mini");
        let request = provider.build_request(&call, true);
        assert_eq!(request.max_tokens, None);
        assert_eq!(
            request.max_completion_tokens,
            Some(DEFAULT_MAX_OUTPUT_TOKENS)
        );
        assert_eq!(request.temperature, None);
    }

    #[test]
    fn messages_order_system_history_snapshot() {
        let provider = provider("http://unused", "gpt-4o");
        let mut call = call("gpt-4o");
        call.history
            .push(penny_core::ConversationTurn::user("q1"));
        call.history
            .push(penny_core::ConversationTurn::model("a1"));
        let request = provider.build_request(&call, false);
        let roles: Vec<&str> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(request.messages.last().unwrap().content, "snapshot text");
    }

    // ── HTTP behavior ────────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "stream": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "full audit text"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "gpt-4o");
        assert_eq!(
            provider.complete(&call("gpt-4o")).await.unwrap(),
            "full audit text"
        );
    }

    #[tokio::test]
    async fn stream_extracts_choice_deltas() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{}}]}\n\n\
                    not-a-frame\n\
                    data: corrupt{{\n\n\
                    data: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "gpt-4o");
        let fragments: Vec<String> = provider
            .stream(&call("gpt-4o"))
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn byok_429_is_provider_throttle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit reached for requests"}
            })))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "gpt-4o");
        let err = provider.stream(&call("gpt-4o")).await.err().unwrap();
        assert_matches!(
            err,
            ProviderError::Quota {
                scope: QuotaScope::ProviderThrottle,
                ..
            }
        );
    }

    #[tokio::test]
    async fn missing_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), "gpt-4o");
        assert_matches!(
            provider.complete(&call("gpt-4o")).await,
            Err(ProviderError::EmptyResponse)
        );
    }
}
