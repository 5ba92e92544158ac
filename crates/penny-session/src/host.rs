//! # Host signals
//!
//! Mobile hosts suspend the process when the user backgrounds the app,
//! which tears down in-flight connections. Those teardowns must read as
//! "come back and retry", never as backend failures. The host tells us
//! whether it is (or just was) suspended; we combine that with the shape
//! of the transport error to pick between the two readings.

use penny_llm::ProviderError;
use tracing::debug;

use crate::error::SessionError;

/// What the embedding host can tell us about its lifecycle.
pub trait HostSignals: Send + Sync {
    /// Whether the app is suspended, or a request began before the most
    /// recent suspension. Defaults to `false` for hosts with no lifecycle
    /// to report.
    fn is_suspended(&self) -> bool {
        false
    }
}

/// A host with no lifecycle. Transport errors are taken at face value.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHostSignals;

impl HostSignals for NoHostSignals {}

/// Fold a provider error into the session taxonomy.
///
/// A dropped connection while the host reports suspension becomes
/// [`SessionError::Interrupted`]; everything else passes through with its
/// own classification intact.
pub(crate) fn classify(error: ProviderError, host: &dyn HostSignals) -> SessionError {
    match error {
        ProviderError::Quota { scope, message } => SessionError::Quota { scope, message },
        other if host.is_suspended() && other.is_connection_drop() => {
            debug!("transport failure during suspension, treating as interruption");
            SessionError::Interrupted
        }
        other => SessionError::Provider(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
