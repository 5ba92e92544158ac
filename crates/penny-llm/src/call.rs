//! The canonical request every adapter consumes.

use penny_core::ConversationTurn;

/// One audit request, already scrubbed.
///
/// Adapters translate this into their provider's wire shape; none of the
/// fields are provider-specific.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditCall {
    /// The user's financial snapshot (the "user message").
    pub snapshot: String,
    /// Fully-rendered system instructions.
    pub system_prompt: String,
    /// Trailing conversation window, oldest first.
    pub history: Vec<ConversationTurn>,
    /// Model identifier to request.
    pub model: String,
}

impl AuditCall {
    /// A call with no history.
    #[must_use]
    pub fn new(
        snapshot: impl Into<String>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            snapshot: snapshot.into(),
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            model: model.into(),
        }
    }
}
