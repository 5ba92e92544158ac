//! Gemini BYOK adapter.
//!
//! `x-goog-api-key`-keyed `generateContent` API. Unlike the other dialects
//! Gemini sends no end-of-stream sentinel, so the frame reader flushes the
//! trailing buffered line when the connection closes. Text deltas live at
//! `candidates[0].content.parts[*].text`.

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Gemini adapter configuration.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Caller-supplied API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Origin override, used by tests.
    pub base_url: Option<String>,
}

/// Gemini BYOK provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemInstruction<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiProvider {
    /// Create an adapter with its own HTTP client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create an adapter sharing an HTTP client.
    #[must_use]
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&self.config.api_key).map_err(|e| ProviderError::Auth {
            message: format!("invalid API key: {e}"),
        })?;
        let _ = headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    fn api_url(&self, call: &AuditCall, stream: bool) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let verb = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        format!("{base}/v1beta/models/{}:{verb}", call.model)
    }

    fn build_request<'a>(&'a self, call: &'a AuditCall) -> GenerateRequest<'a> {
        let mut contents = Vec::with_capacity(call.history.len() + 1);
        for turn in &call.history {
            contents.push(Content {
                role: match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                },
                parts: vec![TextPart {
                    text: &turn.content,
                }],
            });
        }
        contents.push(Content {
            role: "user",
            parts: vec![TextPart {
                text: &call.snapshot,
            }],
        });
        GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: &call.system_prompt,
                }],
            },
            contents,
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            },
        }
    }

    async fn send(&self, call: &AuditCall, stream: bool) -> ProviderResult<reqwest::Response> {
        let url = self.api_url(call, stream);
        debug!(model = %call.model, stream, "sending generateContent request");
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&self.build_request(call))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "generateContent request failed");
            return Err(status_error(
                status.as_u16(),
                &body,
                QuotaScope::ProviderThrottle,
            ));
        }
        Ok(response)
    }
}

/// Concatenated text of a chunk's first candidate, if any.
fn candidate_text(chunk: GenerateChunk) -> Option<String> {
    let content = chunk.candidates.into_iter().next()?.content?;
    let mut text = String::new();
    for part in content.parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
    }
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.config.model))]
    async fn stream(&self, call: &AuditCall) -> ProviderResult<FragmentStream> {
        let response = self.send(call, true).await?;
        // No [DONE] marker in this dialect; flush the trailing line.
        let frames = data_frames(response.bytes_stream(), true);
        let fragments = frames.filter_map(|frame| async move {
            match frame {
                Err(e) => Some(Err(e)),
                Ok(payload) => decode_frame::<GenerateChunk>(&payload, "gemini")
                    .and_then(candidate_text)
                    .map(Ok),
            }
        });
        Ok(Box::pin(fragments))
    }

    #[instrument(skip_all, fields(provider = "gemini", model = %self.config.model))]
    async fn complete(&self, call: &AuditCall) -> ProviderResult<String> {
        let response = self.send(call, false).await?;
        let body: GenerateChunk = response.json().await?;
        candidate_text(body).ok_or(ProviderError::EmptyResponse)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
