//! # penny-session
//!
//! The audit session layer: one orchestrator that takes an intake
//! (prompt, snapshot, records, route), runs the privacy pipeline around
//! a provider call, and reports progress over an explicit event channel.
//!
//! Responsibilities, in order per attempt:
//!
//! 1. Build a fresh entity catalog and scrub everything outbound
//! 2. Reconcile the per-provider conversation window against the
//!    instruction fingerprint
//! 3. Call the routed provider, preferring streaming
//! 4. Republish fragments as unscrubbed full-buffer views
//! 5. Parse the final text into a report and archive the record
//!
//! Single-flight: one attempt at a time, later submissions rejected.
//! Cancellation is an outcome that keeps the partial text; a connection
//! torn down by host suspension is reported as an interruption, not a
//! backend failure.

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod error;
pub mod host;
pub mod intake;
pub mod orchestrator;
pub mod session;
pub mod sink;

pub use cache::{instruction_hash, CacheSnapshot, CacheStore, InstructionCache, MemoryStore};
pub use config::SessionConfig;
pub use error::SessionError;
pub use host::{HostSignals, NoHostSignals};
pub use intake::{AuditIntake, FinancialRecords};
pub use orchestrator::Orchestrator;
pub use session::{AuditHandle, AuditOutcome, AuditStatus};
pub use sink::{AuditSink, MemorySink};
