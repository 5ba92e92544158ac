//! # Instruction cache
//!
//! Per-provider conversation windows keyed by a fingerprint of the active
//! system instructions. The fingerprint is the **sole** invalidation
//! trigger: when it changes, the stored window is discarded before the
//! next request is built, so a reworded prompt is never answered against
//! history produced under the old one. Model switches within a provider,
//! elapsed time, and app restarts all leave the window intact.
//!
//! Everything stored here is scrubbed text. Windows are replayed verbatim
//! into provider requests, so a real name must never land in a turn.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use penny_core::turns::{ConversationTurn, Role};
use penny_llm::ProviderKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Fingerprint of a post-scrub system prompt.
///
/// Hex SHA-256 of the exact bytes sent to the provider. Scrub tokens are
/// deterministic per catalog, so the same records and prompt always hash
/// the same.
#[must_use]
pub fn instruction_hash(system_prompt: &str) -> String {
    let digest = Sha256::digest(system_prompt.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// One provider's cached state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheEntry {
    /// Fingerprint of the instructions the stored turns were produced under.
    pub instruction_hash: Option<String>,
    /// Oldest-first conversation window, scrubbed.
    pub turns: VecDeque<ConversationTurn>,
}

/// The full persisted cache, one entry per logical provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSnapshot {
    pub entries: HashMap<ProviderKind, CacheEntry>,
}

/// Durable backing for the cache.
///
/// The cache writes the whole snapshot after every mutation; the store
/// decides where it lands. Persistence is best-effort, so the trait is
/// infallible and implementations log their own failures.
pub trait CacheStore: Send + Sync {
    /// Read the last saved snapshot, or a default when none exists.
    fn load(&self) -> CacheSnapshot;
    /// Replace the saved snapshot.
    fn save(&self, snapshot: &CacheSnapshot);
}

/// In-memory store. The default for tests and for hosts that wire their
/// own persistence above this crate.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: parking_lot::Mutex<CacheSnapshot>,
}

impl CacheStore for MemoryStore {
    fn load(&self) -> CacheSnapshot {
        self.snapshot.lock().clone()
    }

    fn save(&self, snapshot: &CacheSnapshot) {
        *self.snapshot.lock() = snapshot.clone();
    }
}

/// Conversation windows with hash-keyed invalidation.
pub struct InstructionCache {
    store: Arc<dyn CacheStore>,
    snapshot: CacheSnapshot,
    stored_limit: usize,
}

impl InstructionCache {
    /// Load the cache from a store, keeping at most `stored_limit` turns
    /// per provider.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, stored_limit: usize) -> Self {
        let snapshot = store.load();
        Self {
            store,
            snapshot,
            stored_limit,
        }
    }

    /// Reconcile a provider's window with the current instruction hash.
    ///
    /// Clears the stored turns when the hash differs from the recorded
    /// one, then records the new hash. Returns `true` when the window was
    /// invalidated. A first sync against an empty entry records the hash
    /// without reporting an invalidation.
    pub fn sync_instructions(&mut self, kind: ProviderKind, hash: &str) -> bool {
        let entry = self.snapshot.entries.entry(kind).or_default();
        let invalidated = match entry.instruction_hash.as_deref() {
            Some(stored) if stored != hash => {
                debug!(provider = %kind, "instructions changed, dropping conversation window");
                entry.turns.clear();
                true
            }
            _ => false,
        };
        entry.instruction_hash = Some(hash.to_owned());
        self.persist();
        invalidated
    }

    /// Append the user side of an exchange.
    ///
    /// When the window already ends with that exact user turn, nothing is
    /// appended; re-running an unchanged snapshot never stacks duplicate
    /// user turns.
    pub fn record_user_turn(&mut self, kind: ProviderKind, content: &str) {
        let entry = self.snapshot.entries.entry(kind).or_default();
        if entry
            .turns
            .back()
            .is_some_and(|turn| turn.role == Role::User && turn.content == content)
        {
            debug!(provider = %kind, "identical trailing user turn, skipping append");
            return;
        }
        entry.turns.push_back(ConversationTurn::user(content));
        Self::trim(entry, self.stored_limit);
        self.persist();
    }

    /// Append the model side of an exchange.
    pub fn record_model_turn(&mut self, kind: ProviderKind, content: &str) {
        let entry = self.snapshot.entries.entry(kind).or_default();
        entry.turns.push_back(ConversationTurn::model(content));
        Self::trim(entry, self.stored_limit);
        self.persist();
    }

    /// The most recent `n` turns, oldest first, excluding a trailing user
    /// turn equal to `current_user` (that turn rides in the request body
    /// as the live message, not as history).
    #[must_use]
    pub fn window(&self, kind: ProviderKind, n: usize, current_user: &str) -> Vec<ConversationTurn> {
        let Some(entry) = self.snapshot.entries.get(&kind) else {
            return Vec::new();
        };
        let mut turns: Vec<ConversationTurn> = entry.turns.iter().cloned().collect();
        if turns
            .last()
            .is_some_and(|turn| turn.role == Role::User && turn.content == current_user)
        {
            let _ = turns.pop();
        }
        let skip = turns.len().saturating_sub(n);
        turns.split_off(skip)
    }

    /// Number of stored turns for a provider.
    #[must_use]
    pub fn len(&self, kind: ProviderKind) -> usize {
        self.snapshot
            .entries
            .get(&kind)
            .map_or(0, |entry| entry.turns.len())
    }

    /// Whether a provider has no stored turns.
    #[must_use]
    pub fn is_empty(&self, kind: ProviderKind) -> bool {
        self.len(kind) == 0
    }

    fn trim(entry: &mut CacheEntry, limit: usize) {
        while entry.turns.len() > limit {
            let _ = entry.turns.pop_front();
        }
    }

    fn persist(&self) {
        self.store.save(&self.snapshot);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
