//! Session lifecycle events.
//!
//! The orchestrator publishes these over an explicit channel instead of
//! mutating ambient UI state. Observers only ever see unscrubbed text —
//! tokens exist on the wire, real names exist here.

use serde::{Deserialize, Serialize};

use crate::report::AuditReport;

/// Lifecycle notification for one audit session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AuditEvent {
    /// The request was accepted and is being built/sent.
    Submitted,

    /// New text arrived. Carries the full unscrubbed buffer, not the delta,
    /// so observers never see a token split across a chunk boundary.
    Fragment {
        /// Unscrubbed view of everything accumulated so far.
        text: String,
    },

    /// The session finished and the report parsed.
    Completed {
        /// The parsed report.
        report: AuditReport,
    },

    /// The session failed.
    Failed {
        /// Human-readable failure summary.
        summary: String,
    },

    /// The user cancelled mid-stream.
    Cancelled {
        /// Whatever unscrubbed text had accumulated before cancellation.
        partial_text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_by_type() {
        let json = serde_json::to_value(AuditEvent::Submitted).unwrap();
        assert_eq!(json["type"], "submitted");

        let json = serde_json::to_value(AuditEvent::Fragment {
            text: "partial".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "fragment");
        assert_eq!(json["text"], "partial");
    }

    #[test]
    fn cancelled_carries_partial_text() {
        let json = serde_json::to_value(AuditEvent::Cancelled {
            partial_text: "so far".into(),
        })
        .unwrap();
        assert_eq!(json["partialText"], "so far");
    }
}
