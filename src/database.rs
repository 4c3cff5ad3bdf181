//! SQLite index store.
//!
//! Raw tables are filled during ingestion (`docs`, `tfs`, `boost`); the
//! statistics builder derives `dls`, `dfs`, `d`, `max_page` and `ub` from
//! them with one aggregate query each, after which `create_indices` adds the
//! lookup indexes the query path relies on. Everything is read-only once
//! built.

use std::path::Path;

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::config::ScoringConfig;
use crate::models::Article;
use crate::postings::Posting;

/// Rows per insert transaction. Larger chunks amortize fsync cost; one
/// transaction per chunk keeps write amplification bounded.
const CHUNK_SIZE: usize = 1000;

/// Derived tables that must exist before a query can run.
const DERIVED_TABLES: [&str; 5] = ["dls", "dfs", "d", "max_page", "ub"];

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("term {0:?} is not in the index")]
    TermNotFound(String),
    #[error("derived table {0:?} is missing, rebuild the index")]
    IndexIncomplete(&'static str),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Handle on the single-file index store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new store at `path` with the raw-table schema. Fails if the
    /// tables already exist.
    pub fn create<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let db = Self::open(path)?;
        db.create_schema()?;
        Ok(db)
    }

    /// Open an existing store without touching the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests and benchmarks.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        let db = Self { conn };
        db.create_schema()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> DatabaseResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;
        Ok(())
    }

    fn create_schema(&self) -> DatabaseResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE docs (
                did INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL
            );
            CREATE TABLE tfs (
                did INTEGER,
                term TEXT NOT NULL,
                tf INTEGER
            );
            CREATE TABLE boost (
                did INTEGER,
                date INTEGER,
                page INTEGER
            );",
        )?;
        info!("created raw tables docs, tfs, boost");
        Ok(())
    }

    // ── Ingestion ────────────────────────────────────────────────

    /// Insert identity rows for all articles, batched per chunk.
    pub fn insert_articles(&mut self, articles: &[Article]) -> DatabaseResult<()> {
        let mut inserted = 0usize;
        for chunk in articles.chunks(CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT INTO docs (did, title, url) VALUES (?1, ?2, ?3)")?;
                for article in chunk {
                    stmt.execute(params![article.did, article.title, article.url])?;
                }
            }
            tx.commit()?;
            inserted += chunk.len();
            debug!("[{inserted}/{}] docs inserted", articles.len());
        }
        Ok(())
    }

    /// Insert the weighted term-frequency rows of all articles.
    pub fn insert_term_frequencies(
        &mut self,
        articles: &[Article],
        config: &ScoringConfig,
    ) -> DatabaseResult<()> {
        let mut inserted = 0usize;
        for chunk in articles.chunks(CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT INTO tfs (did, term, tf) VALUES (?1, ?2, ?3)")?;
                for article in chunk {
                    for row in article.tf_rows(config) {
                        stmt.execute(params![row.did, row.term, row.tf])?;
                    }
                }
            }
            tx.commit()?;
            inserted += chunk.len();
            debug!("[{inserted}/{}] doc term frequencies inserted", articles.len());
        }
        Ok(())
    }

    /// Insert the date/page boost row of every article.
    pub fn insert_boosts(&mut self, articles: &[Article]) -> DatabaseResult<()> {
        let mut inserted = 0usize;
        for chunk in articles.chunks(CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT INTO boost (did, date, page) VALUES (?1, ?2, ?3)")?;
                for article in chunk {
                    stmt.execute(params![article.did, article.date, article.page])?;
                }
            }
            tx.commit()?;
            inserted += chunk.len();
            debug!("[{inserted}/{}] boosts inserted", articles.len());
        }
        Ok(())
    }

    // ── Statistics builder ───────────────────────────────────────

    /// Derive the statistics tables from the raw rows. Each statement is a
    /// single aggregate query; their relative order does not matter.
    pub fn compute_statistics(&self) -> DatabaseResult<()> {
        info!("creating table dls");
        self.conn.execute_batch(
            "CREATE TABLE dls AS
             SELECT did, SUM(tf) AS len FROM tfs GROUP BY did",
        )?;
        info!("creating table dfs");
        self.conn.execute_batch(
            "CREATE TABLE dfs AS
             SELECT term, COUNT(tf) AS df FROM tfs GROUP BY term",
        )?;
        info!("creating table d");
        self.conn.execute_batch(
            "CREATE TABLE d AS
             SELECT COUNT(DISTINCT did) AS size FROM tfs",
        )?;
        info!("creating table max_page");
        self.conn.execute_batch(
            "CREATE TABLE max_page AS
             SELECT MAX(page) AS max_page FROM boost",
        )?;
        info!("creating table ub");
        self.conn.execute_batch(
            "CREATE TABLE ub AS
             SELECT term, MAX(tf) AS max FROM tfs GROUP BY term",
        )?;
        Ok(())
    }

    /// Create the auxiliary lookup indexes.
    pub fn create_indices(&self) -> DatabaseResult<()> {
        info!("creating lookup indexes");
        self.conn.execute_batch(
            "CREATE INDEX tfs_idx ON tfs (term, did);
             CREATE INDEX docs_idx ON docs (did);
             CREATE INDEX dfs_idx ON dfs (term, df);
             CREATE INDEX dls_idx ON dls (did, len);
             CREATE INDEX ub_idx ON ub (term);
             CREATE INDEX boost_idx ON boost (did, date, page);",
        )?;
        Ok(())
    }

    /// Verify that every derived table exists. Queries are refused against a
    /// store whose build never ran the statistics pass.
    pub fn ensure_statistics(&self) -> DatabaseResult<()> {
        for table in DERIVED_TABLES {
            let found: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_none() {
                return Err(DatabaseError::IndexIncomplete(table));
            }
        }
        Ok(())
    }

    // ── Scalar lookups ───────────────────────────────────────────

    /// Document frequency of `term`, or `TermNotFound`.
    pub fn df(&self, term: &str) -> DatabaseResult<i64> {
        self.conn
            .query_row("SELECT df FROM dfs WHERE term = ?1", [term], |row| row.get(0))
            .optional()?
            .ok_or_else(|| DatabaseError::TermNotFound(term.to_string()))
    }

    /// Number of distinct documents in the index.
    pub fn collection_size(&self) -> DatabaseResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT size FROM d", [], |row| row.get(0))?)
    }

    /// Length of a document in weighted term occurrences.
    pub fn doc_length(&self, did: i64) -> DatabaseResult<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT len FROM dls WHERE did = ?1", [did], |row| row.get(0))
            .optional()?)
    }

    pub fn page(&self, did: i64) -> DatabaseResult<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT page FROM boost WHERE did = ?1", [did], |row| row.get(0))
            .optional()?)
    }

    pub fn date(&self, did: i64) -> DatabaseResult<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT date FROM boost WHERE did = ?1", [did], |row| row.get(0))
            .optional()?)
    }

    /// Highest print page across the corpus; 1 for an empty corpus.
    pub fn max_page(&self) -> DatabaseResult<i64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT max_page FROM max_page", [], |row| row.get(0))?;
        Ok(max.unwrap_or(1))
    }

    /// Maximum stored weight of `term` across its postings.
    pub fn term_upper_bound(&self, term: &str) -> DatabaseResult<i64> {
        self.conn
            .query_row("SELECT \"max\" FROM ub WHERE term = ?1", [term], |row| row.get(0))
            .optional()?
            .ok_or_else(|| DatabaseError::TermNotFound(term.to_string()))
    }

    /// Headline of a document, if it exists.
    pub fn headline(&self, did: i64) -> DatabaseResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT title FROM docs WHERE did = ?1", [did], |row| row.get(0))
            .optional()?)
    }

    /// All postings of `term` in ascending did order, carrying the boost
    /// fields so scoring needs no further lookups.
    pub fn postings(&self, term: &str) -> DatabaseResult<Vec<Posting>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.did, t.tf, b.date, b.page
             FROM tfs t JOIN boost b ON b.did = t.did
             WHERE t.term = ?1
             ORDER BY t.did",
        )?;
        let postings = stmt
            .query_map([term], |row| {
                Ok(Posting {
                    did: row.get(0)?,
                    weight: row.get(1)?,
                    date: row.get(2)?,
                    page: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(postings)
    }
}
