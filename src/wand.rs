//! WAND document-at-a-time evaluation.
//!
//! The evaluator keeps one posting iterator per query term, sorted by
//! current did. Each round it finds the pivot: the first term at which the
//! cumulative per-term score upper bound beats the heap threshold. Documents
//! before the pivot cannot reach the top-k, so lagging iterators skip
//! straight to the pivot did instead of scoring every posting. A fully
//! aligned pivot gets its exact score and enters the bounded min-heap, which
//! in turn raises the threshold for the next round.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::config::ScoringConfig;
use crate::postings::{TermEntry, TermList, DID_MAX};
use crate::ranking;
use crate::search::{sort_descending, CancelToken, ScoredDoc};

/// The query was cancelled between rounds; partial results are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Evaluate the top-`k` documents for the given term list.
///
/// Returns hits in presentation order (descending score, ties by ascending
/// did). The term list is consumed in the sense that its cursors end up
/// exhausted.
pub fn evaluate_wand(
    terms: &mut TermList,
    k: usize,
    config: &ScoringConfig,
    max_page: i64,
    cancel: &CancelToken,
) -> Result<Vec<ScoredDoc>, Cancelled> {
    if k == 0 || terms.is_empty() {
        return Ok(Vec::new());
    }

    let mut heap: BinaryHeap<Reverse<ScoredDoc>> = BinaryHeap::with_capacity(k + 1);
    // Negative infinity rather than zero so documents whose score is zero
    // (a term appearing in every document has idf 0) still surface, exactly
    // as they do under exhaustive evaluation.
    let mut threshold = f64::NEG_INFINITY;
    let mut cur_doc: i64 = -1;

    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        terms.sort_by_current();

        let Some(pivot) = select_pivot(terms.entries(), threshold) else {
            break;
        };
        let pivot_did = terms.entries()[pivot].list.did();
        if pivot_did == DID_MAX {
            break;
        }

        if pivot_did <= cur_doc {
            // The pivot document was already evaluated; push one preceding
            // iterator past it. With no preceding iterator the pivot itself
            // must move.
            let chosen = pick_min_df(terms.entries(), 0..pivot).unwrap_or(pivot);
            terms.entries_mut()[chosen].list.seek(cur_doc + 1);
        } else if terms.entries()[..pivot]
            .iter()
            .all(|e| e.list.did() == pivot_did)
        {
            // Fully aligned: this document's exact score is worth computing.
            cur_doc = pivot_did;
            let score = score_aligned(terms.entries(), pivot_did, config, max_page);
            offer(&mut heap, &mut threshold, k, ScoredDoc { did: cur_doc, score });
            for entry in terms.entries_mut() {
                if entry.list.did() == pivot_did {
                    entry.list.advance();
                }
            }
        } else {
            // Some iterator before the pivot still lags; skip the rarest one
            // forward, maximising the expected jump.
            let lagging = (0..pivot).filter(|&i| terms.entries()[i].list.did() < pivot_did);
            if let Some(chosen) = pick_min_df(terms.entries(), lagging) {
                terms.entries_mut()[chosen].list.seek(pivot_did);
            }
        }
    }

    let mut hits: Vec<ScoredDoc> = heap.into_iter().map(|r| r.0).collect();
    sort_descending(&mut hits);
    Ok(hits)
}

/// First index at which the running upper-bound sum beats the threshold.
/// `None` means no remaining document can enter the heap.
fn select_pivot(entries: &[TermEntry], threshold: f64) -> Option<usize> {
    let mut acc = 0.0;
    for (i, entry) in entries.iter().enumerate() {
        acc += entry.upper_bound;
        if acc > threshold {
            return Some(i);
        }
    }
    None
}

/// Among the eligible positions, the term with the smallest document
/// frequency; position order breaks ties. Rare terms skip furthest.
fn pick_min_df(entries: &[TermEntry], eligible: impl Iterator<Item = usize>) -> Option<usize> {
    eligible.min_by_key(|&i| (entries[i].list.df(), i))
}

/// Exact score of a document every aligned iterator currently points at.
fn score_aligned(
    entries: &[TermEntry],
    did: i64,
    config: &ScoringConfig,
    max_page: i64,
) -> f64 {
    let mut sum = 0.0;
    let mut boost_fields = None;
    for entry in entries {
        if entry.list.did() == did {
            let posting = entry.list.current();
            sum += posting.weight as f64 * entry.idf;
            boost_fields.get_or_insert((posting.page, posting.date));
        }
    }
    match boost_fields {
        Some((page, date)) => sum * ranking::document_boost(config, page, date, max_page),
        None => 0.0,
    }
}

/// Push a candidate into the bounded heap, evicting the minimum when full,
/// and keep the threshold equal to the k-th best score seen.
fn offer(
    heap: &mut BinaryHeap<Reverse<ScoredDoc>>,
    threshold: &mut f64,
    k: usize,
    hit: ScoredDoc,
) {
    if heap.len() < k {
        heap.push(Reverse(hit));
    } else if let Some(Reverse(min)) = heap.peek() {
        if hit > *min {
            heap.pop();
            heap.push(Reverse(hit));
        }
    }
    if heap.len() == k {
        if let Some(Reverse(min)) = heap.peek() {
            *threshold = min.score;
        }
    }
}
