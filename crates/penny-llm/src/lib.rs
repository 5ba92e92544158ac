//! # penny-llm
//!
//! Provider abstraction for the audit pipeline.
//!
//! Four backends speak four different streaming-chat dialects. Each adapter
//! converts the canonical [`AuditCall`] into its provider's wire format and
//! converts the provider's incremental output into one canonical lazy
//! sequence of text fragments:
//!
//! - **Managed relay** — first-party backend, per-device quota accounting
//! - **`OpenAI` BYOK** — bearer-keyed chat completions
//! - **Claude BYOK** — `x-api-key` messages API
//! - **Gemini BYOK** — `x-goog-api-key` `generateContent` API
//!
//! The [`registry`] selects an adapter from a logical route, so adding a
//! provider means adding one module, not touching the orchestrator.
//!
//! Text entering this crate is already scrubbed; nothing here ever sees a
//! real entity name.

#![deny(unsafe_code)]

pub mod call;
pub mod claude;
pub mod error;
pub mod gemini;
pub mod managed;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod sse;

pub use call::AuditCall;
pub use error::{ProviderError, ProviderResult, QuotaScope};
pub use managed::UpstreamFamily;
pub use provider::{FragmentStream, Provider, ProviderCaps, ProviderKind};
pub use registry::{ProviderRegistry, ProviderRoute, ProviderSource};
