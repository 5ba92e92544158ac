//! # Audit intake
//!
//! Everything the orchestrator needs for one attempt: prompt, snapshot,
//! the raw form for the archive record, the record names to scrub, and
//! the route to reach a backend.

use penny_llm::ProviderRoute;
use penny_scrub::catalog::{EntityCatalog, EntityCategory};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Names pulled from the user's financial records, grouped by category.
///
/// These feed the catalog builder; anything listed here is replaced by a
/// placeholder token before text leaves the device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialRecords {
    pub cards: Vec<String>,
    pub institutions: Vec<String>,
    pub subscriptions: Vec<String>,
    pub loans: Vec<String>,
    pub income_sources: Vec<String>,
    pub budget_categories: Vec<String>,
}

impl FinancialRecords {
    /// Build a fresh catalog from the current records.
    ///
    /// Built once per audit attempt so renames and deletions between
    /// attempts are always reflected.
    #[must_use]
    pub fn catalog(&self) -> EntityCatalog {
        EntityCatalog::builder()
            .add_all(EntityCategory::Card, &self.cards)
            .add_all(EntityCategory::Institution, &self.institutions)
            .add_all(EntityCategory::Subscription, &self.subscriptions)
            .add_all(EntityCategory::Loan, &self.loans)
            .add_all(EntityCategory::IncomeSource, &self.income_sources)
            .add_all(EntityCategory::BudgetCategory, &self.budget_categories)
            .build()
    }
}

/// One audit request, as handed to [`crate::Orchestrator::submit`].
#[derive(Clone, Debug)]
pub struct AuditIntake {
    /// System instructions, pre-scrub.
    pub system_prompt: String,
    /// The textual financial snapshot sent as the user message, pre-scrub.
    pub snapshot: String,
    /// The raw form state archived alongside the parsed report.
    pub form_snapshot: Value,
    /// Record names to scrub for this attempt.
    pub records: FinancialRecords,
    /// Which backend to call.
    pub route: ProviderRoute,
    /// Marks the archived record as a rehearsal run.
    pub is_test_run: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
