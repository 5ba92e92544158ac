//! # penny-scrub
//!
//! Reversible entity-name substitution for outbound audit text.
//!
//! Before any network call, the user's real account, institution, debt,
//! income, and budget names are replaced with synthetic tokens
//! (`"Chase Sapphire Preferred"` → `"Credit Card 1"`). The model only ever
//! sees tokens; the inverse substitution restores real names in everything
//! shown to the user.
//!
//! This is obfuscation against a trusted-but-external processor, not a
//! security boundary: tokens are generated fresh per audit attempt and are
//! never persisted.

#![deny(unsafe_code)]

pub mod catalog;
pub mod engine;

pub use catalog::{CatalogBuilder, EntityCatalog, EntityCategory, SensitiveEntity};
pub use engine::Scrubber;
