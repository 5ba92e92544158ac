//! # Session configuration
//!
//! Tunables for one orchestrator instance. Defaults match the shipped
//! product behavior; tests override individual fields.

use serde::{Deserialize, Serialize};

/// Orchestrator tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// How many prior turns accompany each request.
    pub history_sent: usize,
    /// How many turns the cache retains per provider.
    pub history_stored: usize,
    /// Prefer streaming when the provider supports it.
    pub streaming: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_sent: 6,
            history_stored: 8,
            streaming: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
