//! `ArchiveStore` — the facade tying ingestion, the index store and the two
//! query evaluators together.
//!
//! Build flow: walk the corpus directory → parse articles → batched raw-table
//! inserts → statistics builder → lookup indexes. Query flow: tokenize →
//! per-term posting iterators with memoised scoring constants → WAND for
//! top-k requests, exhaustive evaluation otherwise → headlines attached for
//! display.

use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::ScoringConfig;
use crate::database::{Database, DatabaseError};
use crate::models::{Article, SearchHit, NO_TITLE};
use crate::parser::{self, ParserError};
use crate::postings::{PostingList, TermEntry, TermList};
use crate::ranking;
use crate::search::{self, CancelToken, ScoredDoc};
use crate::tokenize::tokenize;
use crate::wand;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Database(#[from] DatabaseError),
    #[error("ingestion error: {0}")]
    Parser(#[from] ParserError),
    #[error("corpus walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("query cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A built index plus the scoring configuration it was built with.
pub struct ArchiveStore {
    db: Database,
    config: ScoringConfig,
}

impl ArchiveStore {
    /// Create a fresh store at `db_path` and index every article found under
    /// `corpus_dir`.
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
        db_path: P,
        corpus_dir: Q,
        config: ScoringConfig,
    ) -> EngineResult<Self> {
        let mut db = Database::create(db_path)?;
        let articles = collect_articles(corpus_dir.as_ref())?;
        info!("indexing {} articles", articles.len());
        db.insert_articles(&articles)?;
        db.insert_term_frequencies(&articles, &config)?;
        db.insert_boosts(&articles)?;
        db.compute_statistics()?;
        db.create_indices()?;
        Ok(Self { db, config })
    }

    /// Open an existing store for querying. Refuses a store whose derived
    /// statistics tables were never built.
    pub fn open<P: AsRef<Path>>(db_path: P, config: ScoringConfig) -> EngineResult<Self> {
        let db = Database::open(db_path)?;
        db.ensure_statistics()?;
        Ok(Self { db, config })
    }

    /// Number of distinct indexed documents.
    pub fn collection_size(&self) -> EngineResult<i64> {
        Ok(self.db.collection_size()?)
    }

    /// Evaluate a free-text query. `k = Some(n)` returns the top n documents
    /// via WAND; `k = None` returns every matching document, exhaustively
    /// scored.
    pub fn query(&self, query: &str, k: Option<usize>) -> EngineResult<Vec<SearchHit>> {
        self.query_with_cancel(query, k, &CancelToken::new())
    }

    /// Like [`query`](Self::query), but cancellable between WAND rounds.
    /// A cancelled query discards partial results.
    pub fn query_with_cancel(
        &self,
        query: &str,
        k: Option<usize>,
        cancel: &CancelToken,
    ) -> EngineResult<Vec<SearchHit>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            debug!("query produced no tokens");
            return Ok(Vec::new());
        }
        if k == Some(0) {
            return Ok(Vec::new());
        }

        let mut terms = self.term_list(&tokens)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let max_page = self.db.max_page()?;

        let hits = match k {
            Some(k) => wand::evaluate_wand(&mut terms, k, &self.config, max_page, cancel)
                .map_err(|wand::Cancelled| EngineError::Cancelled)?,
            None => search::evaluate_exhaustive(&terms, &self.config, max_page),
        };
        self.attach_headlines(hits)
    }

    /// Build the per-query term list: tokens deduplicated, one posting
    /// iterator per known term, idf and score upper bound memoised per entry.
    /// Unknown terms contribute no postings.
    fn term_list(&self, tokens: &[String]) -> EngineResult<TermList> {
        let n = self.db.collection_size()?;
        let mut terms = TermList::new();
        for token in tokens {
            if terms.position(token).is_some() {
                continue;
            }
            let df = match self.db.df(token) {
                Ok(df) => df,
                Err(DatabaseError::TermNotFound(_)) => {
                    debug!("query term {token:?} not in index");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let postings = self.db.postings(token)?;
            let max_weight = self.db.term_upper_bound(token)?;
            let idf = ranking::idf(n, df);
            terms.push(TermEntry {
                list: PostingList::new(token.clone(), df, postings),
                idf,
                upper_bound: ranking::term_upper_bound(&self.config, max_weight, idf),
            });
        }
        Ok(terms)
    }

    fn attach_headlines(&self, hits: Vec<ScoredDoc>) -> EngineResult<Vec<SearchHit>> {
        hits.into_iter()
            .map(|h| {
                let title = self
                    .db
                    .headline(h.did)?
                    .unwrap_or_else(|| NO_TITLE.to_string());
                Ok(SearchHit {
                    did: h.did,
                    score: h.score,
                    title,
                })
            })
            .collect()
    }
}

/// Walk `dir` recursively and parse every `.xml` file. Files that fail to
/// parse are logged and skipped; ingestion continues.
fn collect_articles(dir: &Path) -> EngineResult<Vec<Article>> {
    let mut articles = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().map_or(true, |ext| ext != "xml") {
            continue;
        }
        match parser::parse_article(entry.path()) {
            Ok(article) => articles.push(article),
            Err(err) => warn!("skipping {}: {err}", entry.path().display()),
        }
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn article_xml(did: i64, title: &str, body: &str, page: i64, date: &str) -> String {
        format!(
            r#"<nitf><head><title>{title}</title>
  <meta name="print_page_number" content="{page}"/>
  <docdata><doc-id id-string="{did}"/></docdata>
  <pubdata ex-ref="https://nyt.example/{did}" date.publication="{date}T000000"/></head>
  <body><body.content><block class="full_text"><p>{body}</p></block></body.content></body></nitf>"#
        )
    }

    fn write_corpus(dir: &Path) {
        fs::write(
            dir.join("a1.xml"),
            article_xml(1, "Olympic ceremony", "opening ceremony held", 1, "20000915"),
        )
        .unwrap();
        fs::write(
            dir.join("a2.xml"),
            article_xml(2, "Bridge between nations", "denmark sweden bridge opens", 3, "20000702"),
        )
        .unwrap();
        fs::write(dir.join("broken.xml"), "<nitf><head>").unwrap();
        fs::write(dir.join("notes.txt"), "not an article").unwrap();
    }

    fn built_store(dir: &tempfile::TempDir) -> ArchiveStore {
        let corpus = dir.path().join("corpus");
        fs::create_dir(&corpus).unwrap();
        write_corpus(&corpus);
        ArchiveStore::build(
            dir.path().join("index.sqlite"),
            &corpus,
            ScoringConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_skips_unparseable_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        assert_eq!(store.collection_size().unwrap(), 2);
    }

    #[test]
    fn test_query_finds_matching_article() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        let hits = store.query("denmark bridge", Some(10)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].did, 2);
        assert_eq!(hits[0].title, "Bridge between nations");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_query_modes_agree() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        let wand = store.query("ceremony bridge opening", Some(10)).unwrap();
        let exhaustive = store.query("ceremony bridge opening", None).unwrap();
        assert_eq!(wand.len(), exhaustive.len());
        for (w, e) in wand.iter().zip(&exhaustive) {
            assert_eq!(w.did, e.did);
            assert!((w.score - e.score).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_and_unknown_queries() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        assert!(store.query("", Some(10)).unwrap().is_empty());
        assert!(store.query("?!,", Some(10)).unwrap().is_empty());
        assert!(store.query("xyzzy plugh", Some(10)).unwrap().is_empty());
        assert!(store.query("bridge", Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_query_terms_count_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        let once = store.query("bridge", Some(10)).unwrap();
        let twice = store.query("bridge bridge", Some(10)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_open_rejects_unbuilt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.sqlite");
        Database::create(&path).unwrap();
        assert!(matches!(
            ArchiveStore::open(&path, ScoringConfig::default()),
            Err(EngineError::Database(DatabaseError::IndexIncomplete(_)))
        ));
    }

    #[test]
    fn test_reopen_after_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite");
        {
            let corpus = dir.path().join("corpus");
            fs::create_dir(&corpus).unwrap();
            write_corpus(&corpus);
            ArchiveStore::build(&path, &corpus, ScoringConfig::default()).unwrap();
        }
        let store = ArchiveStore::open(&path, ScoringConfig::default()).unwrap();
        let hits = store.query("olympic ceremony", Some(5)).unwrap();
        assert_eq!(hits[0].did, 1);
    }

    #[test]
    fn test_cancelled_query_discards_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = built_store(&dir);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            store.query_with_cancel("bridge", Some(5), &cancel),
            Err(EngineError::Cancelled)
        ));
    }
}
