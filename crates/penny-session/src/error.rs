//! Session-level failure taxonomy.
//!
//! Backend errors arrive as `ProviderError`; this layer folds in the
//! states only the session can know about (busy, cancel-vs-suspend,
//! unreadable reply) and keeps the distinctions the UI renders
//! differently.

use penny_core::report::ReportParseError;
use penny_llm::{ProviderError, QuotaScope};
use thiserror::Error;

/// Why an audit session could not produce a report.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A second submission arrived while one was in flight.
    #[error("an audit is already in progress")]
    Busy,

    /// A quota boundary was hit. The scope says whose.
    #[error("{message}")]
    Quota {
        /// Whether the device's daily allowance or the provider's own
        /// rate limiting was hit.
        scope: QuotaScope,
        /// User-facing message.
        message: String,
    },

    /// The connection dropped because the host suspended the app, not
    /// because the backend failed. Rendered as "retry when back", never
    /// as a provider error.
    #[error("connection dropped while the app was suspended; retry after returning")]
    Interrupted,

    /// The reply arrived but no report could be read from it.
    #[error("audit reply was not a readable report: {0}")]
    Malformed(#[from] ReportParseError),

    /// Any other backend failure, unchanged.
    #[error(transparent)]
    Provider(ProviderError),

    /// The audit task stopped without reporting an outcome.
    #[error("audit task failed unexpectedly: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether retrying the same intake could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy | Self::Interrupted => true,
            Self::Quota { scope, .. } => *scope == QuotaScope::ProviderThrottle,
            Self::Provider(error) => error.is_retryable(),
            Self::Malformed(_) | Self::Internal(_) => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
