//! # penny-core
//!
//! Foundation types for the Penny audit pipeline.
//!
//! This crate provides the shared vocabulary the other Penny crates depend on:
//!
//! - **Turns**: `ConversationTurn` and `Role` — the conversation window sent
//!   alongside each audit request
//! - **Reports**: `AuditReport` parsed from model output, `AuditRecord` handed
//!   to the persistence collaborator
//! - **Events**: `AuditEvent` lifecycle notifications published by the
//!   session orchestrator
//! - **Text utilities**: log-preview truncation

#![deny(unsafe_code)]

pub mod events;
pub mod report;
pub mod text;
pub mod turns;

pub use events::AuditEvent;
pub use report::{AuditRecord, AuditReport, Finding, ReportParseError};
pub use turns::{ConversationTurn, Role};
