//! The provider trait every backend adapter implements.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::call::AuditCall;
use crate::error::{ProviderError, ProviderResult};

/// Lazy, finite, non-restartable sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Which backend dialect an adapter speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// First-party relay with server-side quota accounting.
    Managed,
    /// `OpenAI` chat completions, caller-supplied key.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages API, caller-supplied key.
    Claude,
    /// Google Gemini `generateContent`, caller-supplied key.
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Managed => "managed",
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// Capability flags the registry reports for a resolved adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderCaps {
    /// Whether the adapter can deliver incremental fragments.
    pub supports_streaming: bool,
    /// Whether requests go through the first-party relay.
    pub managed: bool,
}

/// A streaming chat backend.
///
/// Implementations differ only in authentication header shape, request-body
/// shape, and where the dialect nests its text deltas.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which dialect this adapter speaks.
    fn kind(&self) -> ProviderKind;

    /// Model the adapter is configured for.
    fn model(&self) -> &str;

    /// Capability flags.
    fn caps(&self) -> ProviderCaps {
        ProviderCaps {
            supports_streaming: true,
            managed: false,
        }
    }

    /// Perform the call with streaming enabled.
    ///
    /// The returned stream yields text fragments as they arrive. Malformed
    /// frames are skipped; transport failures surface as an `Err` item and
    /// terminate the stream.
    async fn stream(&self, call: &AuditCall) -> ProviderResult<FragmentStream>;

    /// Perform the same call with streaming disabled, returning the full
    /// text in one response.
    async fn complete(&self, call: &AuditCall) -> ProviderResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
