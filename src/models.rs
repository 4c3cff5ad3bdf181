//! Article model and the rows it contributes to the index.
//!
//! An `Article` is built once by ingestion and never mutated. Term counters
//! for body and headline are computed on construction so the indexing pass
//! can emit term-frequency rows without re-tokenizing.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::tokenize::{tokenize, tokenize_paragraphs};

/// Sentinel headline for articles whose XML carries no title element.
pub const NO_TITLE: &str = "NO TITLE FOUND";

/// A parsed newspaper article.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub did: i64,
    pub title: String,
    pub url: String,
    /// Body paragraphs in reading order, untokenized.
    pub content: Vec<String>,
    /// Publication date as a YYYYMMDD integer.
    pub date: i64,
    /// Print page number, 1-based.
    pub page: i64,
    content_counter: HashMap<String, i64>,
    title_counter: HashMap<String, i64>,
}

/// One `(did, term, tf)` row destined for the `tfs` table. The weight folds
/// the title boost in, so query-time scoring never revisits the headline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfRow {
    pub did: i64,
    pub term: String,
    pub tf: i64,
}

/// A scored query result with the headline attached for display.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub did: i64,
    pub score: f64,
    pub title: String,
}

impl Article {
    pub fn new(
        did: i64,
        title: String,
        url: String,
        content: Vec<String>,
        date: i64,
        page: i64,
    ) -> Self {
        let content_counter = count_tokens(tokenize_paragraphs(&content));
        let title_counter = count_tokens(tokenize(&title));
        Self {
            did,
            title,
            url,
            content,
            date,
            page,
            content_counter,
            title_counter,
        }
    }

    /// Occurrences of `term` in the tokenized body.
    pub fn content_count(&self, term: &str) -> i64 {
        self.content_counter.get(term).copied().unwrap_or(0)
    }

    /// Occurrences of `term` in the tokenized headline.
    pub fn title_count(&self, term: &str) -> i64 {
        self.title_counter.get(term).copied().unwrap_or(0)
    }

    /// Term-frequency rows over the union of body and headline vocabulary.
    pub fn tf_rows(&self, config: &ScoringConfig) -> Vec<TfRow> {
        let mut terms: Vec<&String> = self.content_counter.keys().collect();
        terms.extend(
            self.title_counter
                .keys()
                .filter(|t| !self.content_counter.contains_key(*t)),
        );
        terms
            .into_iter()
            .map(|term| TfRow {
                did: self.did,
                term: term.clone(),
                tf: config.content_weight * self.content_count(term)
                    + config.title_weight * self.title_count(term),
            })
            .collect()
    }
}

fn count_tokens(tokens: Vec<String>) -> HashMap<String, i64> {
    let mut counter = HashMap::new();
    for token in tokens {
        *counter.entry(token).or_insert(0) += 1;
    }
    counter
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article::new(
            7,
            "Bridge between nations".into(),
            "https://nyt.example/bridge".into(),
            vec!["denmark sweden bridge opens".into(), "the bridge links nations".into()],
            20000702,
            3,
        )
    }

    #[test]
    fn test_counters_span_paragraphs() {
        let a = article();
        assert_eq!(a.content_count("bridge"), 2);
        assert_eq!(a.content_count("denmark"), 1);
        assert_eq!(a.title_count("bridge"), 1);
        assert_eq!(a.content_count("missing"), 0);
    }

    #[test]
    fn test_tf_rows_fold_title_weight() {
        let a = article();
        let rows = a.tf_rows(&ScoringConfig::default());
        let tf = |term: &str| rows.iter().find(|r| r.term == term).map(|r| r.tf);
        // body 2 + title 1 * weight 2
        assert_eq!(tf("bridge"), Some(4));
        // body-only term
        assert_eq!(tf("denmark"), Some(1));
        // title-only term still indexed
        assert_eq!(tf("between"), Some(2));
        assert!(rows.iter().all(|r| r.did == 7));
    }

    #[test]
    fn test_tf_rows_have_unique_terms() {
        let a = article();
        let rows = a.tf_rows(&ScoringConfig::default());
        let mut terms: Vec<&str> = rows.iter().map(|r| r.term.as_str()).collect();
        let before = terms.len();
        terms.sort_unstable();
        terms.dedup();
        assert_eq!(before, terms.len());
    }
}
