//! Sensitive-entity catalog construction.
//!
//! The catalog is the source of truth for one scrub map. It is rebuilt from
//! the user's current financial records on every audit attempt — records can
//! change between attempts, so the catalog is never cached.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Real names shorter than this are never substituted. Two-letter bank
/// acronyms appear inside ordinary words far too often to match safely.
pub const MIN_NAME_LEN: usize = 3;

/// What kind of financial record a sensitive name came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityCategory {
    /// Credit card.
    Card,
    /// Bank or other financial institution.
    Institution,
    /// Recurring charge.
    Subscription,
    /// Non-card debt.
    Loan,
    /// Income source.
    IncomeSource,
    /// Budget category.
    BudgetCategory,
}

impl EntityCategory {
    /// Human-readable token label for this category.
    #[must_use]
    pub fn token_label(self) -> &'static str {
        match self {
            Self::Card => "Credit Card",
            Self::Institution => "Bank",
            Self::Subscription => "Subscription",
            Self::Loan => "Loan",
            Self::IncomeSource => "Income Source",
            Self::BudgetCategory => "Budget Category",
        }
    }
}

/// One real-world name and the token standing in for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveEntity {
    /// The user's real name for the record.
    pub real_name: String,
    /// Record category.
    pub category: EntityCategory,
    /// Synthetic stand-in, e.g. `"Credit Card 1"`. Unique within one catalog.
    pub token: String,
}

/// A complete scrub vocabulary for one audit attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityCatalog {
    entities: Vec<SensitiveEntity>,
}

impl EntityCatalog {
    /// Start building a catalog.
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// All entities, in insertion order.
    #[must_use]
    pub fn entities(&self) -> &[SensitiveEntity] {
        &self.entities
    }

    /// Whether the catalog has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }
}

/// Accumulates real names per category and assigns tokens.
///
/// Names shorter than [`MIN_NAME_LEN`] are skipped. A name already seen in
/// any category (case-insensitive) keeps its first-assigned token; later
/// occurrences are dropped.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entities: Vec<SensitiveEntity>,
    seen: HashSet<String>,
    counters: [usize; 6],
}

impl CatalogBuilder {
    /// Add one real name under a category.
    pub fn add(&mut self, category: EntityCategory, real_name: &str) -> &mut Self {
        let trimmed = real_name.trim();
        if trimmed.len() < MIN_NAME_LEN {
            debug!(name_len = trimmed.len(), "skipping short entity name");
            return self;
        }
        if !self.seen.insert(trimmed.to_lowercase()) {
            return self;
        }
        let counter = &mut self.counters[Self::slot(category)];
        *counter += 1;
        self.entities.push(SensitiveEntity {
            real_name: trimmed.to_string(),
            category,
            token: format!("{} {}", category.token_label(), counter),
        });
        self
    }

    /// Add every name in an iterator under one category.
    pub fn add_all<I>(&mut self, category: EntityCategory, names: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for name in names {
            let _ = self.add(category, name.as_ref());
        }
        self
    }

    /// Finish and return the catalog.
    #[must_use]
    pub fn build(&mut self) -> EntityCatalog {
        EntityCatalog {
            entities: std::mem::take(&mut self.entities),
        }
    }

    fn slot(category: EntityCategory) -> usize {
        match category {
            EntityCategory::Card => 0,
            EntityCategory::Institution => 1,
            EntityCategory::Subscription => 2,
            EntityCategory::Loan => 3,
            EntityCategory::IncomeSource => 4,
            EntityCategory::BudgetCategory => 5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
