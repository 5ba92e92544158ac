//! First-party relay adapter.
//!
//! The relay proxies to upstream model providers on the caller's behalf.
//! Requests carry an opaque per-install device identifier (server-side
//! quota accounting) and an upstream family hint so the backend routes to
//! the right model family. HTTP 429 from the relay means the device's hard
//! daily limit, not a transient throttle.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use penny_core::turns::{ConversationTurn, Role};

use crate::call::AuditCall;
use crate::error::{status_error, ProviderError, ProviderResult, QuotaScope};
use crate::provider::{FragmentStream, Provider, ProviderCaps, ProviderKind};
use crate::sse::{data_frames, decode_frame};

/// Header carrying the per-install identifier used for rate limiting.
const DEVICE_ID_HEADER: &str = "X-Device-ID";

/// Which upstream model family the relay should route to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamFamily {
    /// Google Gemini.
    Gemini,
    /// `OpenAI`.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Claude.
    Claude,
}

/// Relay adapter configuration.
#[derive(Clone, Debug)]
pub struct ManagedConfig {
    /// Relay origin, e.g. `https://api.penny.app`.
    pub base_url: String,
    /// Opaque per-install identifier.
    pub device_id: String,
    /// Model to request upstream.
    pub model: String,
    /// Routing hint for the relay.
    pub upstream: UpstreamFamily,
}

/// The managed relay provider.
pub struct ManagedProvider {
    config: ManagedConfig,
    client: reqwest::Client,
}

/// Wire shape of one history entry.
#[derive(Serialize)]
struct RelayTurn<'a> {
    role: &'static str,
    content: &'a str,
}

/// Relay request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    snapshot: &'a str,
    system_prompt: &'a str,
    history: Vec<RelayTurn<'a>>,
    model: &'a str,
    stream: bool,
    provider: UpstreamFamily,
}

/// Non-streaming success body.
#[derive(Deserialize)]
struct RelayResponse {
    result: String,
}

/// One streaming frame.
#[derive(Deserialize)]
struct RelayFrame {
    delta: Option<String>,
}

impl ManagedProvider {
    /// Create a relay adapter with its own HTTP client.
    #[must_use]
    pub fn new(config: ManagedConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a relay adapter sharing an HTTP client.
    #[must_use]
    pub fn with_client(config: ManagedConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let device_id =
            HeaderValue::from_str(&self.config.device_id).map_err(|e| ProviderError::Auth {
                message: format!("invalid device identifier: {e}"),
            })?;
        let _ = headers.insert(DEVICE_ID_HEADER, device_id);
        Ok(headers)
    }

    fn build_request<'a>(&'a self, call: &'a AuditCall, stream: bool) -> RelayRequest<'a> {
        let history = call
            .history
            .iter()
            .map(|turn: &ConversationTurn| RelayTurn {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                },
                content: &turn.content,
            })
            .collect();
        RelayRequest {
            snapshot: &call.snapshot,
            system_prompt: &call.system_prompt,
            history,
            model: &call.model,
            stream,
            provider: self.config.upstream,
        }
    }

    async fn send(&self, call: &AuditCall, stream: bool) -> ProviderResult<reqwest::Response> {
        let url = format!("{}/v1/audit", self.config.base_url);
        debug!(
            model = %call.model,
            history_len = call.history.len(),
            stream,
            "sending relay request"
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
            error!(status = status.as_u16(), "relay request failed");
            return Err(status_error(
                status.as_u16(),
                &body,
                QuotaScope::DailyLimit,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for ManagedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Managed
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn caps(&self) -> ProviderCaps {
        ProviderCaps {
            supports_streaming: true,
            managed: true,
        }
    }

    #[instrument(skip_all, fields(provider = "managed", model = %self.config.model))]
    async fn stream(&self, call: &AuditCall) -> ProviderResult<FragmentStream> {
        let response = self.send(call, true).await?;
        let frames = data_frames(response.bytes_stream(), false);
        let fragments = frames.filter_map(|frame| async move {
            match frame {
                Err(e) => Some(Err(e)),
                Ok(payload) => decode_frame::<RelayFrame>(&payload, "managed")
                    .and_then(|f| f.delta)
                    .filter(|delta| !delta.is_empty())
                    .map(Ok),
            }
        });
        Ok(Box::pin(fragments))
    }

    #[instrument(skip_all, fields(provider = "managed", model = %self.config.model))]
    async fn complete(&self, call: &AuditCall) -> ProviderResult<String> {
        let response = self.send(call, false).await?;
        let body: RelayResponse = response.json().await?;
        if body.result.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(body.result)
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

    fn config(base_url: &str) -> ManagedConfig {
        ManagedConfig {
            base_url: base_url.into(),
            device_id: "device-123".into(),
            model: "gemini-2.5-flash".into(),
            upstream: UpstreamFamily::Gemini,
        }
    }

    fn call() -> AuditCall {
        let mut call = AuditCall::new("Snapshot: Credit Card 1", "You are an auditor", "gemini-2.5-flash");
        call.history.push(ConversationTurn::user("earlier question"));
        call.history.push(ConversationTurn::model("earlier answer"));
        call
    }

    #[test]
    fn caps_mark_managed() {
        let provider = ManagedProvider::new(config("http://unused"));
        assert!(provider.caps().managed);
        assert!(provider.caps().supports_streaming);
        assert_eq!(provider.kind(), ProviderKind::Managed);
    }

    #[tokio::test]
    async fn complete_sends_wire_shape_and_device_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audit"))
            .and(header(DEVICE_ID_HEADER, "device-123"))
            .and(body_partial_json(serde_json::json!({
                "snapshot": "Snapshot: Credit Card 1",
                "systemPrompt": "You are an auditor",
                "model": "gemini-2.5-flash",
                "stream": false,
                "provider": "gemini",
                "history": [
                    { "role": "user", "content": "earlier question" },
                    { "role": "model", "content": "earlier answer" },
                ],
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = ManagedProvider::new(config(&server.uri()));
        assert_eq!(provider.complete(&call()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn stream_extracts_deltas() {
        let server = MockServer::start().await;
        let body = "data: {\"delta\":\"Pay down \"}\n\n\
                    data: {\"delta\":\"Credit Card 1\"}\n\n\
                    data: {\"notDelta\":true}\n\n\
                    data: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/audit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let provider = ManagedProvider::new(config(&server.uri()));
        let fragments: Vec<String> = provider
            .stream(&call())
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(fragments, vec!["Pay down ", "Credit Card 1"]);
    }

    #[tokio::test]
    async fn relay_429_is_daily_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audit"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": "daily quota exhausted"})),
            )
            .mount(&server)
            .await;

        let provider = ManagedProvider::new(config(&server.uri()));
        let err = provider.complete(&call()).await.unwrap_err();
        assert_matches!(
            err,
            ProviderError::Quota {
                scope: QuotaScope::DailyLimit,
                ..
            }
        );
        assert!(err.to_string().contains("daily quota exhausted"));
    }

    #[tokio::test]
    async fn relay_error_body_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audit"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "upstream exploded"})),
            )
            .mount(&server)
            .await;

        let provider = ManagedProvider::new(config(&server.uri()));
        let err = provider.stream(&call()).await.err().unwrap();
        assert_matches!(err, ProviderError::Api { status: 500, .. });
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn empty_result_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": ""})),
            )
            .mount(&server)
            .await;

        let provider = ManagedProvider::new(config(&server.uri()));
        assert_matches!(
            provider.complete(&call()).await,
            Err(ProviderError::EmptyResponse)
        );
    }
}
