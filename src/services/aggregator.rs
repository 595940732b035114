//! Ranking aggregator for top-N services and mechanics

use crate::types::{RankEntry, RankedEntry};
use std::collections::HashMap;

/// Aggregator for computing ranked totals
pub struct Aggregator;

impl Aggregator {
    /// Accumulate entries by key (in first-seen order)
    pub fn accumulate(entries: &[RankEntry]) -> Vec<RankedEntry> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut totals: Vec<RankedEntry> = Vec::new();

        for entry in entries {
            let slot = *index.entry(entry.key.as_str()).or_insert_with(|| {
                totals.push(RankedEntry {
                    key: entry.key.clone(),
                    quantity: 0.0,
                    total: 0.0,
                });
                totals.len() - 1
            });
            totals[slot].quantity += entry.quantity;
            totals[slot].total += entry.value;
        }

        totals
    }

    /// Top `n` keys by total, descending. Exact ties keep first-seen order.
    pub fn rank(entries: &[RankEntry], n: usize) -> Vec<RankedEntry> {
        let mut ranked = Self::accumulate(entries);
        // sort_by is stable
        ranked.sort_by(|a, b| b.total.total_cmp(&a.total));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, quantity: f64, value: f64) -> RankEntry {
        RankEntry::new(key, quantity, value)
    }

    // ========== accumulate() tests ==========

    #[test]
    fn test_accumulate_empty() {
        assert!(Aggregator::accumulate(&[]).is_empty());
    }

    #[test]
    fn test_accumulate_sums_by_key() {
        let entries = vec![
            entry("Revisão", 1.0, 50.0),
            entry("Freio", 2.0, 30.0),
            entry("Revisão", 2.0, 100.0),
        ];

        let result = Aggregator::accumulate(&entries);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].key, "Revisão");
        assert_eq!(result[0].quantity, 3.0);
        assert_eq!(result[0].total, 150.0);
        assert_eq!(result[1].key, "Freio");
    }

    // ========== rank() tests ==========

    #[test]
    fn test_rank_descending_by_total() {
        let entries = vec![
            entry("a", 1.0, 10.0),
            entry("b", 1.0, 30.0),
            entry("c", 1.0, 20.0),
        ];

        let keys: Vec<String> = Aggregator::rank(&entries, 3)
            .into_iter()
            .map(|r| r.key)
            .collect();

        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_tie_keeps_first_seen() {
        let entries = vec![entry("A", 1.0, 100.0), entry("B", 1.0, 100.0)];

        for _ in 0..5 {
            let result = Aggregator::rank(&entries, 1);
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].key, "A");
        }
    }

    #[test]
    fn test_rank_tie_uses_first_seen_not_quantity() {
        // B has more quantity but A was seen first
        let entries = vec![
            entry("A", 1.0, 60.0),
            entry("B", 5.0, 100.0),
            entry("A", 1.0, 40.0),
        ];

        let result = Aggregator::rank(&entries, 2);
        assert_eq!(result[0].key, "A");
        assert_eq!(result[1].key, "B");
    }

    #[test]
    fn test_rank_fewer_keys_than_n() {
        let entries = vec![entry("x", 1.0, 1.0)];
        assert_eq!(Aggregator::rank(&entries, 10).len(), 1);
    }

    #[test]
    fn test_rank_zero_returns_nothing() {
        let entries = vec![entry("x", 1.0, 1.0)];
        assert!(Aggregator::rank(&entries, 0).is_empty());
    }
}
