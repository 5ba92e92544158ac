//! Provider selection.
//!
//! The orchestrator never names an adapter type; it hands the registry a
//! logical route and receives a `dyn Provider`. Adding a backend means
//! adding one adapter module and one match arm here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::claude::{ClaudeConfig, ClaudeProvider};
use crate::error::{ProviderError, ProviderResult};
use crate::gemini::{GeminiConfig, GeminiProvider};
use crate::managed::{ManagedConfig, ManagedProvider, UpstreamFamily};
use crate::openai::{OpenAiConfig, OpenAiProvider};
use crate::provider::{Provider, ProviderKind};

/// Logical selection of a backend for one audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ProviderRoute {
    /// First-party relay.
    #[serde(rename_all = "camelCase")]
    Managed {
        /// Relay origin.
        base_url: String,
        /// Per-install identifier for server-side quota accounting.
        device_id: String,
        /// Model to request upstream.
        model: String,
        /// Upstream family routing hint.
        upstream: UpstreamFamily,
    },
    /// Direct call with a caller-supplied key.
    #[serde(rename_all = "camelCase")]
    Byok {
        /// Which dialect to speak. `Managed` is invalid here.
        kind: ProviderKind,
        /// The caller's API key.
        api_key: String,
        /// Model identifier.
        model: String,
        /// Origin override, used by tests.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl ProviderRoute {
    /// The model this route requests.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Managed { model, .. } | Self::Byok { model, .. } => model,
        }
    }
}

/// Detect the dialect a bare model identifier belongs to.
///
/// Used when the caller stores a model string but not a provider choice.
/// Unknown families return `None` rather than guessing.
#[must_use]
pub fn kind_for_model(model: &str) -> Option<ProviderKind> {
    if model.starts_with("claude-") {
        return Some(ProviderKind::Claude);
    }
    if model.starts_with("gemini-") {
        return Some(ProviderKind::Gemini);
    }
    if model.starts_with("gpt-")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
    {
        return Some(ProviderKind::OpenAi);
    }
    None
}

/// Anything that can turn a route into a live provider.
///
/// The orchestrator depends on this seam rather than on `ProviderRegistry`
/// directly so tests can hand it scripted backends.
pub trait ProviderSource: Send + Sync {
    /// Resolve a route to an adapter.
    fn create(&self, route: &ProviderRoute) -> ProviderResult<Arc<dyn Provider>>;
}

/// Builds adapters from routes, sharing one HTTP client.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    client: reqwest::Client,
}

impl ProviderRegistry {
    /// Registry with a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolve a route to an adapter.
    pub fn create(&self, route: &ProviderRoute) -> ProviderResult<Arc<dyn Provider>> {
        debug!(model = route.model(), "resolving provider route");
        match route {
            ProviderRoute::Managed {
                base_url,
                device_id,
                model,
                upstream,
            } => Ok(Arc::new(ManagedProvider::with_client(
                ManagedConfig {
                    base_url: base_url.clone(),
                    device_id: device_id.clone(),
                    model: model.clone(),
                    upstream: *upstream,
                },
                self.client.clone(),
            ))),
            ProviderRoute::Byok {
                kind,
                api_key,
                model,
                base_url,
            } => match kind {
                ProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::with_client(
                    OpenAiConfig {
                        api_key: api_key.clone(),
                        model: model.clone(),
                        base_url: base_url.clone(),
                    },
                    self.client.clone(),
                ))),
                ProviderKind::Claude => Ok(Arc::new(ClaudeProvider::with_client(
                    ClaudeConfig {
                        api_key: api_key.clone(),
                        model: model.clone(),
                        base_url: base_url.clone(),
                    },
                    self.client.clone(),
                ))),
                ProviderKind::Gemini => Ok(Arc::new(GeminiProvider::with_client(
                    GeminiConfig {
                        api_key: api_key.clone(),
                        model: model.clone(),
                        base_url: base_url.clone(),
                    },
                    self.client.clone(),
                ))),
                ProviderKind::Managed => Err(ProviderError::Route {
                    message: "the managed backend does not take a caller-supplied key".into(),
                }),
            },
        }
    }
}

impl ProviderSource for ProviderRegistry {
    fn create(&self, route: &ProviderRoute) -> ProviderResult<Arc<dyn Provider>> {
        Self::create(self, route)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn byok(kind: ProviderKind, model: &str) -> ProviderRoute {
        ProviderRoute::Byok {
            kind,
            api_key: "key".into(),
            model: model.into(),
            base_url: None,
        }
    }

    #[test]
    fn managed_route_resolves_to_managed_caps() {
        let registry = ProviderRegistry::new();
        let provider = registry
            .create(&ProviderRoute::Managed {
                base_url: "http://relay".into(),
                device_id: "d1".into(),
                model: "gemini-2.5-flash".into(),
                upstream: UpstreamFamily::Gemini,
            })
            .unwrap();
        assert_eq!(provider.kind(), ProviderKind::Managed);
        assert!(provider.caps().managed);
    }

    #[test]
    fn byok_routes_resolve_to_their_kinds() {
        let registry = ProviderRegistry::new();
        for (kind, model) in [
            (ProviderKind::OpenAi, "gpt-4o"),
            (ProviderKind::Claude, "claude-sonnet-4-5"),
            (ProviderKind::Gemini, "gemini-2.5-flash"),
        ] {
            let provider = registry.create(&byok(kind, model)).unwrap();
            assert_eq!(provider.kind(), kind);
            assert_eq!(provider.model(), model);
            assert!(!provider.caps().managed);
        }
    }

    #[test]
    fn byok_managed_is_rejected() {
        let registry = ProviderRegistry::new();
        assert_matches!(
            registry.create(&byok(ProviderKind::Managed, "any")).err(),
            Some(ProviderError::Route { .. })
        );
    }

    #[test]
    fn kind_detection_by_model_prefix() {
        assert_eq!(kind_for_model("claude-sonnet-4-5"), Some(ProviderKind::Claude));
        assert_eq!(kind_for_model("gemini-2.5-flash"), Some(ProviderKind::Gemini));
        assert_eq!(kind_for_model("gpt-4o"), Some(ProviderKind::OpenAi));
        assert_eq!(kind_for_model("o3-mini"), Some(ProviderKind::OpenAi));
        assert_eq!(kind_for_model("mystery-model"), None);
    }

    #[test]
    fn route_serde_roundtrip() {
        let route = ProviderRoute::Byok {
            kind: ProviderKind::Claude,
            api_key: "k".into(),
            model: "claude-sonnet-4-5".into(),
            base_url: None,
        };
        let json = serde_json::to_string(&route).unwrap();
        let back: ProviderRoute = serde_json::from_str(&json).unwrap();
        assert_eq!(back, route);
    }

    #[test]
    fn route_model_accessor() {
        assert_eq!(byok(ProviderKind::OpenAi, "gpt-4o").model(), "gpt-4o");
    }
}
