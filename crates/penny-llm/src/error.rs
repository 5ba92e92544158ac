//! Provider error taxonomy.
//!
//! Adapters translate HTTP failures into these variants; the orchestrator
//! classifies them further (background interruption vs genuine failure)
//! before surfacing to the caller. Nothing in this crate retries.

use serde_json::Value;

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Which quota was exhausted when a backend answered HTTP 429.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaScope {
    /// The managed relay's hard per-device daily limit. Retrying today will
    /// not help.
    DailyLimit,
    /// A BYOK provider is throttling. Retrying shortly usually succeeds.
    ProviderThrottle,
}

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed before or during the response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request body could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP 429.
    #[error("{message}")]
    Quota {
        /// Daily limit vs provider throttle.
        scope: QuotaScope,
        /// User-presentable description.
        message: String,
    },

    /// Any other non-success status.
    #[error("backend error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Best-effort server message.
        message: String,
    },

    /// Credential could not be turned into a valid header.
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// The route cannot be built (e.g. BYOK to the managed backend).
    #[error("invalid provider route: {message}")]
    Route {
        /// Error description.
        message: String,
    },

    /// Transport succeeded but the response carried no text.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether a caller-driven retry is plausible.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Quota { scope, .. } => *scope == QuotaScope::ProviderThrottle,
            Self::Api { status, .. } => *status >= 500,
            Self::Json(_) | Self::Auth { .. } | Self::Route { .. } | Self::EmptyResponse => false,
        }
    }

    /// Whether a transport failure looks like a torn-down connection
    /// rather than a refused or misaddressed one.
    ///
    /// The message sniff covers error shapes reqwest does not flag
    /// structurally; it is a best-effort heuristic and only feeds the
    /// caller's suspension disambiguation, never retry logic.
    #[must_use]
    pub fn is_connection_drop(&self) -> bool {
        let Self::Http(source) = self else {
            return false;
        };
        if source.is_timeout() || source.is_body() || source.is_request() {
            return true;
        }
        let message = source.to_string().to_lowercase();
        [
            "connection reset",
            "broken pipe",
            "unexpected eof",
            "connection closed",
        ]
        .iter()
        .any(|needle| message.contains(needle))
    }

    /// Category string for structured logging.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) => "parse",
            Self::Quota { .. } => "quota",
            Self::Api { .. } => "api",
            Self::Auth { .. } => "auth",
            Self::Route { .. } => "route",
            Self::EmptyResponse => "empty",
        }
    }
}

/// Map a non-success HTTP response to a [`ProviderError`].
///
/// 429 becomes [`ProviderError::Quota`] with scope chosen by the adapter;
/// anything else becomes [`ProviderError::Api`] carrying the status and the
/// best server message the body offers.
pub(crate) fn status_error(status: u16, body: &str, quota_scope: QuotaScope) -> ProviderError {
    if status == 429 {
        let message = match quota_scope {
            QuotaScope::DailyLimit => server_message(body)
                .unwrap_or_else(|| "Daily audit limit reached for this device.".into()),
            QuotaScope::ProviderThrottle => {
                let detail = server_message(body).unwrap_or_else(|| "rate limit exceeded".into());
                format!("Provider is throttling requests ({detail}). Retry shortly.")
            }
        };
        return ProviderError::Quota {
            scope: quota_scope,
            message,
        };
    }
    ProviderError::Api {
        status,
        message: server_message(body).unwrap_or_else(|| format!("HTTP {status}")),
    }
}

/// Best-effort extraction of a human message from a JSON error body.
///
/// Providers disagree on shape: `{"error": {"message": ...}}`,
/// `{"error": "..."}`, or plain text.
fn server_message(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return Some(message.to_string());
        }
        if let Some(message) = json["error"].as_str() {
            return Some(message.to_string());
        }
        if let Some(message) = json["message"].as_str() {
            return Some(message.to_string());
        }
        return None;
    }
    Some(body.trim().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
