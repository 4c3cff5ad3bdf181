//! Exhaustive term-at-a-time evaluation and shared query machinery.
//!
//! The exhaustive evaluator walks every posting of every query term and sums
//! contributions into a did-indexed accumulator map. It is the reference the
//! WAND evaluator must agree with, and the path taken when a query asks for
//! all results rather than a top-k.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ScoringConfig;
use crate::postings::TermList;
use crate::ranking;

/// A scored document before the headline is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub did: i64,
    pub score: f64,
}

impl Eq for ScoredDoc {}

impl Ord for ScoredDoc {
    /// Ascending by score; between equal scores the larger did orders first,
    /// so the minimum of a bounded heap is always the hit that presentation
    /// order (descending score, ascending did) would drop first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.did.cmp(&self.did))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort hits into presentation order.
pub fn sort_descending(hits: &mut [ScoredDoc]) {
    hits.sort_unstable_by(|a, b| b.cmp(a));
}

/// Cooperative cancellation flag, checked between evaluation steps. Cloning
/// shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Score every document matching at least one query term.
pub fn evaluate_exhaustive(
    terms: &TermList,
    config: &ScoringConfig,
    max_page: i64,
) -> Vec<ScoredDoc> {
    let mut accumulators: HashMap<i64, f64> = HashMap::new();
    for entry in terms.entries() {
        for posting in entry.list.postings() {
            let boost = ranking::document_boost(config, posting.page, posting.date, max_page);
            *accumulators.entry(posting.did).or_insert(0.0) +=
                posting.weight as f64 * entry.idf * boost;
        }
    }
    let mut hits: Vec<ScoredDoc> = accumulators
        .into_iter()
        .map(|(did, score)| ScoredDoc { did, score })
        .collect();
    sort_descending(&mut hits);
    hits
}

/// Reduce hits to the `k` best via a bounded min-heap, returned in
/// presentation order. `k = 0` yields nothing.
pub fn take_top_k(hits: Vec<ScoredDoc>, k: usize) -> Vec<ScoredDoc> {
    let mut heap: BinaryHeap<Reverse<ScoredDoc>> = BinaryHeap::with_capacity(k + 1);
    for hit in hits {
        if heap.len() < k {
            heap.push(Reverse(hit));
        } else if let Some(Reverse(min)) = heap.peek() {
            if hit > *min {
                heap.pop();
                heap.push(Reverse(hit));
            }
        }
    }
    let mut top: Vec<ScoredDoc> = heap.into_iter().map(|r| r.0).collect();
    sort_descending(&mut top);
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::{Posting, PostingList, TermEntry};

    fn hit(did: i64, score: f64) -> ScoredDoc {
        ScoredDoc { did, score }
    }

    fn entry(term: &str, idf: f64, postings: &[(i64, i64)]) -> TermEntry {
        let postings: Vec<Posting> = postings
            .iter()
            .map(|&(did, weight)| Posting {
                did,
                weight,
                date: 20000101,
                page: 1,
            })
            .collect();
        TermEntry {
            upper_bound: postings.iter().map(|p| p.weight).max().unwrap_or(0) as f64 * idf,
            list: PostingList::new(term.into(), postings.len() as i64, postings),
            idf,
        }
    }

    #[test]
    fn test_ordering_prefers_score_then_small_did() {
        let mut hits = vec![hit(3, 1.0), hit(1, 2.0), hit(2, 1.0)];
        sort_descending(&mut hits);
        assert_eq!(
            hits.iter().map(|h| h.did).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_exhaustive_accumulates_across_terms() {
        // neutral boosts: page 1 of max_page 1 with page_weight 0 and a
        // flat date weight
        let config = ScoringConfig {
            page_weight: 0.0,
            date_weight: 1.0,
            date_offset: 1.0,
            ..Default::default()
        };
        let mut terms = TermList::new();
        terms.push(entry("a", 1.0, &[(1, 2), (2, 1)]));
        terms.push(entry("b", 2.0, &[(2, 3)]));

        let hits = evaluate_exhaustive(&terms, &config, 1);
        assert_eq!(hits.len(), 2);
        // doc 2: 1·1 + 3·2 = 7, doc 1: 2·1 = 2 (date boost 1.0 at epoch)
        assert_eq!(hits[0].did, 2);
        assert!((hits[0].score - 7.0).abs() < 1e-9);
        assert_eq!(hits[1].did, 1);
        assert!((hits[1].score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_never_shrinks_with_term_frequency() {
        let config = ScoringConfig {
            date_offset: 1.0,
            ..Default::default()
        };
        let mut previous = 0.0;
        for weight in 1..=8 {
            let mut terms = TermList::new();
            terms.push(entry("a", 1.5, &[(1, weight)]));
            let score = evaluate_exhaustive(&terms, &config, 1)[0].score;
            assert!(score >= previous, "weight {weight}");
            previous = score;
        }
    }

    #[test]
    fn test_take_top_k_bounds_and_orders() {
        let hits = vec![hit(1, 1.0), hit(2, 5.0), hit(3, 3.0), hit(4, 4.0)];
        let top = take_top_k(hits.clone(), 2);
        assert_eq!(top.iter().map(|h| h.did).collect::<Vec<_>>(), vec![2, 4]);

        assert!(take_top_k(hits.clone(), 0).is_empty());
        assert_eq!(take_top_k(hits, 10).len(), 4);
    }

    #[test]
    fn test_take_top_k_breaks_ties_by_did() {
        let hits = vec![hit(9, 1.0), hit(2, 1.0), hit(5, 1.0)];
        let top = take_top_k(hits, 2);
        assert_eq!(top.iter().map(|h| h.did).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
