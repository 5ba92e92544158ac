//! Conversation turn types.
//!
//! Turns form the trailing conversation window the orchestrator sends with
//! each audit request. A turn pair is appended only once an exchange
//! completes; failed and cancelled attempts record nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (the financial snapshot side of the exchange).
    User,
    /// The model's reply.
    Model,
}

/// One completed exchange entry in the conversation window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    /// Turn author.
    pub role: Role,
    /// Turn text. Stored scrubbed — real entity names never enter the window.
    pub content: String,
    /// When the turn completed.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    #[must_use]
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn stamped with the current time.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::now(Role::User, content)
    }

    /// Create a model turn stamped with the current time.
    #[must_use]
    pub fn model(content: impl Into<String>) -> Self {
        Self::now(Role::Model, content)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }

    #[test]
    fn turn_constructors_set_role() {
        assert_eq!(ConversationTurn::user("hi").role, Role::User);
        assert_eq!(ConversationTurn::model("hello").role, Role::Model);
    }

    #[test]
    fn turn_serde_roundtrip() {
        let turn = ConversationTurn::user("Pay down Credit Card 1");
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn turn_wire_format_uses_camel_case() {
        let turn = ConversationTurn::model("ok");
        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("role").is_some());
        assert!(json.get("content").is_some());
        assert!(json.get("timestamp").is_some());
    }
}
