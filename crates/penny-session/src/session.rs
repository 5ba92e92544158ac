//! # Session surface
//!
//! The handle a caller holds for one in-flight audit: a status feed, an
//! event feed, a cancel switch, and the final outcome.

use penny_core::events::AuditEvent;
use penny_core::report::AuditRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SessionError;

/// Where an audit session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// No attempt in flight.
    Idle,
    /// Scrubbing, building the request, waiting for first byte.
    Submitting,
    /// Fragments arriving.
    Streaming,
    /// Stream complete, extracting the report.
    Parsing,
    /// Report parsed and archived.
    Success,
    /// The attempt failed.
    Error,
    /// The user cancelled mid-stream.
    Cancelled,
}

impl AuditStatus {
    /// Whether the session has finished, one way or another.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// How a session that did not fail ended.
#[derive(Clone, Debug)]
pub enum AuditOutcome {
    /// The report parsed and was archived.
    Completed {
        /// The archived record.
        record: AuditRecord,
        /// Wall-clock duration of the attempt.
        elapsed_seconds: u64,
    },
    /// The user cancelled. Cancellation is an outcome, not an error.
    Cancelled {
        /// Unscrubbed text accumulated before the cancel, possibly empty.
        partial_text: String,
        /// Wall-clock duration of the attempt.
        elapsed_seconds: u64,
    },
}

/// Caller's grip on one in-flight audit.
///
/// Dropping the handle detaches the attempt; it keeps running and its
/// record still reaches the sink. Use [`AuditHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct AuditHandle {
    pub(crate) session_id: Uuid,
    pub(crate) cancel: CancellationToken,
    pub(crate) events: mpsc::UnboundedReceiver<AuditEvent>,
    pub(crate) status: watch::Receiver<AuditStatus>,
    pub(crate) task: JoinHandle<Result<AuditOutcome, SessionError>>,
}

impl AuditHandle {
    /// Identifier of this attempt, for log correlation.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> AuditStatus {
        *self.status.borrow()
    }

    /// Request cancellation. Idempotent; takes effect at the next
    /// fragment boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next lifecycle event, or `None` once the session is finished and
    /// drained.
    pub async fn next_event(&mut self) -> Option<AuditEvent> {
        self.events.recv().await
    }

    /// Wait for the attempt to end and take its outcome.
    pub async fn finish(self) -> Result<AuditOutcome, SessionError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(SessionError::Internal(join_error.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
