//! The bidirectional substitution engine.
//!
//! Forward (`scrub`) replaces whole-word, case-insensitive occurrences of
//! each real name with its token, longest name first so
//! `"Chase Sapphire Reserve"` wins over `"Chase"`. Inverse (`unscrub`)
//! replaces exact, case-sensitive occurrences of each token, longest token
//! first. Tokens are engine-generated with fixed casing, so exact matching
//! cannot accidentally rewrite user-typed text that merely resembles a
//! token.
//!
//! Neither direction can fail: an unmatched entry is a no-op.

use regex::Regex;
use tracing::warn;

use crate::catalog::EntityCatalog;

struct ScrubEntry {
    pattern: Regex,
    token: String,
    name_len: usize,
}

struct UnscrubEntry {
    token: String,
    real_name: String,
}

/// Precompiled scrub/unscrub transform for one catalog.
///
/// Built fresh per audit attempt; valid only for the lifetime of that
/// attempt's token vocabulary.
pub struct Scrubber {
    scrub_entries: Vec<ScrubEntry>,
    unscrub_entries: Vec<UnscrubEntry>,
}

impl Scrubber {
    /// Compile the transform from a catalog.
    #[must_use]
    pub fn new(catalog: &EntityCatalog) -> Self {
        let mut scrub_entries: Vec<ScrubEntry> = catalog
            .entities()
            .iter()
            .filter_map(|entity| {
                let pattern = match whole_word_pattern(&entity.real_name) {
                    Ok(p) => p,
                    Err(e) => {
                        // Escaped input should always compile; skip rather
                        // than fail the whole catalog if it ever does not.
                        warn!(error = %e, "dropping unmatchable entity name");
                        return None;
                    }
                };
                Some(ScrubEntry {
                    pattern,
                    token: entity.token.clone(),
                    name_len: entity.real_name.len(),
                })
            })
            .collect();
        // Longest real name first, so a long match is consumed before any
        // of its substrings.
        scrub_entries.sort_by(|a, b| b.name_len.cmp(&a.name_len));

        let mut unscrub_entries: Vec<UnscrubEntry> = catalog
            .entities()
            .iter()
            .map(|entity| UnscrubEntry {
                token: entity.token.clone(),
                real_name: entity.real_name.clone(),
            })
            .collect();
        // Longest token first: "Credit Card 10" before "Credit Card 1".
        unscrub_entries.sort_by(|a, b| b.token.len().cmp(&a.token.len()));

        Self {
            scrub_entries,
            unscrub_entries,
        }
    }

    /// Replace real names with tokens.
    #[must_use]
    pub fn scrub(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut out = text.to_string();
        for entry in &self.scrub_entries {
            if let std::borrow::Cow::Owned(replaced) =
                entry.pattern.replace_all(&out, entry.token.as_str())
            {
                out = replaced;
            }
        }
        out
    }

    /// Replace tokens with real names.
    #[must_use]
    pub fn unscrub(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut out = text.to_string();
        for entry in &self.unscrub_entries {
            if out.contains(&entry.token) {
                out = out.replace(&entry.token, &entry.real_name);
            }
        }
        out
    }
}

/// Case-insensitive whole-word pattern for a literal name.
///
/// `\b` only means something next to a word character, so the anchors are
/// applied conditionally — a name like `"Netflix+"` ends at a symbol and
/// must not demand a trailing boundary.
fn whole_word_pattern(name: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(name.len() + 12);
    pattern.push_str("(?i)");
    if name.chars().next().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(name));
    if name.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityCategory;

    fn scrubber(entries: &[(&str, EntityCategory)]) -> Scrubber {
        let mut builder = EntityCatalog::builder();
        for (name, category) in entries {
            let _ = builder.add(*category, name);
        }
        Scrubber::new(&builder.build())
    }

    #[test]
    fn scrub_replaces_whole_words_case_insensitively() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        assert_eq!(s.scrub("Move money to ALLY now"), "Move money to Bank 1 now");
        assert_eq!(s.scrub("ally savings"), "Bank 1 savings");
    }

    #[test]
    fn scrub_never_matches_inside_longer_words() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        assert_eq!(s.scrub("Actually, rally the funds"), "Actually, rally the funds");
    }

    #[test]
    fn scrub_longest_name_wins() {
        let s = scrubber(&[
            ("Chase", EntityCategory::Institution),
            ("Chase Sapphire Reserve", EntityCategory::Card),
        ]);
        let out = s.scrub("Pay the Chase Sapphire Reserve from Chase checking");
        assert_eq!(out, "Pay the Credit Card 1 from Bank 1 checking");
    }

    #[test]
    fn scrub_matches_at_punctuation() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        assert_eq!(s.scrub("Transfer from Ally."), "Transfer from Bank 1.");
        assert_eq!(s.scrub("(Ally)"), "(Bank 1)");
    }

    #[test]
    fn scrub_handles_names_ending_in_symbols() {
        let s = scrubber(&[("Netflix+", EntityCategory::Subscription)]);
        assert_eq!(s.scrub("Cancel Netflix+ today"), "Cancel Subscription 1 today");
    }

    #[test]
    fn scrub_empty_and_no_match_are_noops() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        assert_eq!(s.scrub(""), "");
        assert_eq!(s.scrub("no names here"), "no names here");
    }

    #[test]
    fn scrub_is_idempotent_on_clean_text() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        let once = s.scrub("funds at Ally");
        assert_eq!(s.scrub(&once), once);
    }

    #[test]
    fn unscrub_is_exact_and_case_sensitive() {
        let s = scrubber(&[("Ally", EntityCategory::Institution)]);
        assert_eq!(s.unscrub("Use Bank 1 for savings"), "Use Ally for savings");
        // User-typed lowercase text is never unscrubbed.
        assert_eq!(s.unscrub("my bank 1 account"), "my bank 1 account");
    }

    #[test]
    fn unscrub_longest_token_first() {
        let mut builder = EntityCatalog::builder();
        for i in 0..10 {
            let _ = builder.add(EntityCategory::Card, &format!("Card Number {i}"));
        }
        let _ = builder.add(EntityCategory::Card, "Final Card");
        let s = Scrubber::new(&builder.build());
        // "Credit Card 11" must not be rewritten as "<Card Number 0> 1".
        assert_eq!(s.unscrub("balance on Credit Card 11"), "balance on Final Card");
    }

    #[test]
    fn round_trip_spec_scenario() {
        let s = scrubber(&[
            ("Chase Sapphire Preferred", EntityCategory::Card),
            ("Ally", EntityCategory::Institution),
        ]);
        let original = "Pay down Chase Sapphire Preferred using funds from Ally.";
        let scrubbed = s.scrub(original);
        assert_eq!(scrubbed, "Pay down Credit Card 1 using funds from Bank 1.");
        assert_eq!(s.unscrub(&scrubbed), original);
    }

    #[test]
    fn incremental_unscrub_converges_for_any_chunking() {
        let s = scrubber(&[
            ("Chase Sapphire Preferred", EntityCategory::Card),
            ("Ally", EntityCategory::Institution),
        ]);
        let wire = "Pay down Credit Card 1 using funds from Bank 1.";
        let expected = "Pay down Chase Sapphire Preferred using funds from Ally.";

        // The orchestrator re-runs unscrub over the whole buffer on every
        // fragment, so wherever the chunk boundaries fall the final view
        // must equal the one-shot result.
        for a in 0..wire.len() {
            for b in a..wire.len() {
                let mut buffer = String::new();
                for chunk in [&wire[..a], &wire[a..b], &wire[b..]] {
                    buffer.push_str(chunk);
                    let _ = s.unscrub(&buffer);
                }
                assert_eq!(s.unscrub(&buffer), expected);
            }
        }
    }

    // ── Property: round trip over name/filler concatenations ───────────

    mod props {
        use super::*;
        use proptest::prelude::*;

        const NAMES: &[&str] = &[
            "Chase Sapphire Preferred",
            "Chase",
            "Ally",
            "Sallie Mae",
            "Netflix",
            "Acme Corp",
        ];
        const FILLERS: &[&str] =
            &["pay", "down", "using", "funds", "from", "toward", "the", "balance"];

        fn word() -> impl Strategy<Value = String> {
            prop_oneof![
                proptest::sample::select(NAMES).prop_map(str::to_string),
                proptest::sample::select(FILLERS).prop_map(str::to_string),
            ]
        }

        fn full_scrubber() -> Scrubber {
            let mut builder = EntityCatalog::builder();
            let _ = builder
                .add(EntityCategory::Card, "Chase Sapphire Preferred")
                .add(EntityCategory::Institution, "Chase")
                .add(EntityCategory::Institution, "Ally")
                .add(EntityCategory::Loan, "Sallie Mae")
                .add(EntityCategory::Subscription, "Netflix")
                .add(EntityCategory::IncomeSource, "Acme Corp");
            Scrubber::new(&builder.build())
        }

        proptest! {
            #[test]
            fn unscrub_inverts_scrub(words in proptest::collection::vec(word(), 1..24)) {
                let text = words.join(" ");
                let s = full_scrubber();
                prop_assert_eq!(s.unscrub(&s.scrub(&text)), text);
            }

            #[test]
            fn scrub_leaves_no_real_name_behind(words in proptest::collection::vec(word(), 1..24)) {
                let text = words.join(" ");
                let s = full_scrubber();
                let scrubbed = s.scrub(&text);
                for name in NAMES {
                    let lowered = scrubbed.to_lowercase();
                    // Whole-word occurrences are gone; substrings of other
                    // words were never in the input (words are space-joined).
                    prop_assert!(!lowered.split_whitespace().any(|w| w == name.to_lowercase()));
                }
            }
        }
    }
}
