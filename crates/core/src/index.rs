use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, separator_variants};

/// Presentation grouping derived from the tier label prefix, exactly as the
/// membership sheets name their tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Charge,
    Plan,
    Nft,
    Greet,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Charge => "charge",
            Category::Plan => "plan",
            Category::Nft => "nft",
            Category::Greet => "greet",
        }
    }
}

/// One tier of one category, e.g. `チャージ確定` or `挨拶早押し②`. Ordering of
/// tiers is fixed by configuration and never derived from sheet data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierLabel(pub String);

impl TierLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn category(&self) -> Category {
        if self.0.starts_with("チャージ") {
            Category::Charge
        } else if self.0.starts_with("企画") {
            Category::Plan
        } else if self.0.starts_with("NFT") {
            Category::Nft
        } else {
            Category::Greet
        }
    }
}

impl fmt::Display for TierLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of probing the index with one query. Fetch failures are a separate
/// state owned by the lookup session; an index probe can only say found,
/// not-found, or that the query normalized to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(Vec<TierLabel>),
    NotFound,
    EmptyQuery,
}

/// Normalized identifier -> set of tier positions. Rebuilt per fetch cycle and
/// owned by the session; there is no ambient global copy.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    order: Vec<TierLabel>,
    entries: HashMap<String, BTreeSet<usize>>,
}

impl MembershipIndex {
    /// Build from per-tier rows. The sequence order of `tables` is the
    /// configured tier order; rows are assumed header-stripped. The first cell
    /// of each row is the candidate identifier; rows whose normal form is
    /// empty are skipped.
    pub fn build(tables: Vec<(TierLabel, Vec<Vec<String>>)>) -> Self {
        let mut order: Vec<TierLabel> = Vec::new();
        let mut entries: HashMap<String, BTreeSet<usize>> = HashMap::new();
        for (tier, rows) in tables {
            let position = match order.iter().position(|t| *t == tier) {
                Some(pos) => pos,
                None => {
                    order.push(tier);
                    order.len() - 1
                }
            };
            for row in rows {
                let Some(first) = row.first() else { continue };
                let key = normalize(first);
                if key.is_empty() {
                    continue;
                }
                entries.entry(key).or_default().insert(position);
            }
        }
        Self { order, entries }
    }

    pub fn tiers(&self) -> &[TierLabel] {
        &self.order
    }

    pub fn identifier_count(&self) -> usize {
        self.entries.len()
    }

    /// Probe with a raw query. The canonical form is tried first; the
    /// underscore/hyphen swapped spellings only if it is absent.
    pub fn lookup(&self, raw_query: &str) -> LookupOutcome {
        let canonical = normalize(raw_query);
        if canonical.is_empty() {
            return LookupOutcome::EmptyQuery;
        }
        for variant in separator_variants(&canonical) {
            if let Some(positions) = self.entries.get(&variant) {
                let labels = positions
                    .iter()
                    .map(|&pos| self.order[pos].clone())
                    .collect();
                return LookupOutcome::Found(labels);
            }
        }
        LookupOutcome::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(names: &[&str]) -> Vec<Vec<String>> {
        names.iter().map(|n| vec![n.to_string()]).collect()
    }

    fn sample_index() -> MembershipIndex {
        MembershipIndex::build(vec![
            (TierLabel::new("チャージ確定"), rows(&["alice", "carol"])),
            (TierLabel::new("企画確定"), rows(&["Alice", "me_moon"])),
            (TierLabel::new("挨拶早押し①"), rows(&["bob"])),
        ])
    }

    #[test]
    fn membership_in_configured_order() {
        let index = sample_index();
        let outcome = index.lookup("ALICE");
        assert_eq!(
            outcome,
            LookupOutcome::Found(vec![
                TierLabel::new("チャージ確定"),
                TierLabel::new("企画確定"),
            ])
        );
    }

    #[test]
    fn set_semantics_no_duplicates() {
        let index = MembershipIndex::build(vec![(
            TierLabel::new("NFT確定"),
            rows(&["dave", "@Dave", "ＤＡＶＥ"]),
        )]);
        assert_eq!(index.identifier_count(), 1);
        assert_eq!(
            index.lookup("dave"),
            LookupOutcome::Found(vec![TierLabel::new("NFT確定")])
        );
    }

    #[test]
    fn separator_tolerance_both_directions() {
        let index = sample_index();
        assert!(matches!(index.lookup("me-moon"), LookupOutcome::Found(_)));
        assert!(matches!(index.lookup("me_moon"), LookupOutcome::Found(_)));
    }

    #[test]
    fn not_found_vs_empty() {
        let index = sample_index();
        assert_eq!(index.lookup("eve"), LookupOutcome::NotFound);
        assert_eq!(index.lookup("   "), LookupOutcome::EmptyQuery);
        assert_eq!(index.lookup("@"), LookupOutcome::EmptyQuery);
    }

    #[test]
    fn empty_first_cells_skipped() {
        let index = MembershipIndex::build(vec![(
            TierLabel::new("挨拶確定"),
            vec![vec!["".to_string()], vec![], vec!["  @ ".to_string()]],
        )]);
        assert_eq!(index.identifier_count(), 0);
    }

    #[test]
    fn category_from_prefix() {
        assert_eq!(TierLabel::new("チャージ早押し").category(), Category::Charge);
        assert_eq!(TierLabel::new("企画早押し").category(), Category::Plan);
        assert_eq!(TierLabel::new("NFT確定").category(), Category::Nft);
        assert_eq!(TierLabel::new("挨拶早押し②").category(), Category::Greet);
    }
}
