//! Ranking collaborators feeding the fusion step.
//!
//! A [`RankingSource`] turns a query into document ids ordered best-first.
//! Scores stay inside the source; fusion only consumes positions.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{HsError, Result};
use crate::search::embeddings::Embedder;
use crate::search::expand::QueryExpansion;
use crate::search::hybrid::DocId;
use crate::storage::Database;

/// What a source is asked for.
#[derive(Debug, Clone, Copy)]
pub struct RankingRequest<'a> {
    /// Trimmed raw query, for sources that embed it.
    pub query: &'a str,
    /// Expanded terms, for sources that match keywords.
    pub expansion: &'a QueryExpansion,
    /// Maximum number of ids to return.
    pub limit: usize,
    /// Restrict results to documents of this book.
    pub book_id: Option<i64>,
}

/// A black-box ranking function.
pub trait RankingSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn rank(&self, request: &RankingRequest<'_>) -> impl Future<Output = Result<Vec<DocId>>> + Send;
}

/// Build an FTS5 query matching any of the expanded terms.
///
/// Every term becomes a quoted phrase so FTS5 operators inside user input are
/// treated as text.
#[must_use]
pub fn fts_match_expression(expansion: &QueryExpansion) -> Option<String> {
    if expansion.expanded.is_empty() {
        return None;
    }
    let phrases: Vec<String> = expansion
        .expanded
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    Some(phrases.join(" OR "))
}

/// Keyword ranking through the corpus FTS5 index (BM25 order).
///
/// Queries run on a blocking thread holding the source's connection. A
/// query that outlives its timeout keeps that connection busy, so callers
/// that also read the corpus should give the source its own connection
/// through [`FtsSource::open_readonly`].
#[derive(Clone)]
pub struct FtsSource {
    db: Arc<Mutex<Database>>,
}

impl FtsSource {
    #[must_use]
    pub const fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    /// Rank over a dedicated read-only connection to the corpus at `path`.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open_readonly(path)?;
        Ok(Self::new(Arc::new(Mutex::new(db))))
    }
}

impl RankingSource for FtsSource {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn rank(&self, request: &RankingRequest<'_>) -> Result<Vec<DocId>> {
        let Some(expr) = fts_match_expression(request.expansion) else {
            return Ok(Vec::new());
        };
        let db = Arc::clone(&self.db);
        let (book_id, limit) = (request.book_id, request.limit);
        let ids = tokio::task::spawn_blocking(move || db.lock().fts_search(&expr, book_id, limit))
            .await
            .map_err(|err| HsError::Source(format!("fts task: {err}")))??;
        debug!(hits = ids.len(), "fts ranking complete");
        Ok(ids)
    }
}

/// A stored document embedding and the book it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct DocVector {
    pub doc_id: DocId,
    pub book_id: Option<i64>,
    pub vector: Vec<f32>,
}

impl DocVector {
    #[must_use]
    pub const fn new(doc_id: DocId, book_id: Option<i64>, vector: Vec<f32>) -> Self {
        Self {
            doc_id,
            book_id,
            vector,
        }
    }
}

/// Embedding-similarity ranking over stored document vectors.
#[derive(Clone)]
pub struct VectorSource {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<Vec<DocVector>>,
}

impl VectorSource {
    pub fn new(embedder: Arc<dyn Embedder>, vectors: Vec<DocVector>) -> Self {
        Self {
            embedder,
            vectors: Arc::new(vectors),
        }
    }

    /// Load stored vectors, with their books, from the corpus database.
    pub fn from_database(embedder: Arc<dyn Embedder>, db: &Database) -> Result<Self> {
        let dims = embedder.dims();
        let vectors: Vec<DocVector> = db
            .load_book_embeddings()?
            .into_iter()
            .filter(|(_, _, v)| v.len() == dims)
            .map(|(doc_id, book_id, vector)| DocVector::new(doc_id, book_id, vector))
            .collect();
        Ok(Self::new(embedder, vectors))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Ids with positive dot-product similarity, best first, ties by id.
/// With `book_id` set, vectors of other books are skipped.
#[must_use]
pub fn nearest(
    vectors: &[DocVector],
    query: &[f32],
    book_id: Option<i64>,
    limit: usize,
) -> Vec<DocId> {
    let mut scored: Vec<(DocId, f32)> = vectors
        .par_iter()
        .filter(|dv| book_id.is_none() || dv.book_id == book_id)
        .filter(|dv| dv.vector.len() == query.len())
        .map(|dv| {
            let score = dv.vector.iter().zip(query).map(|(a, b)| a * b).sum::<f32>();
            (dv.doc_id, score)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().take(limit).map(|(id, _)| id).collect()
}

impl RankingSource for VectorSource {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn rank(&self, request: &RankingRequest<'_>) -> Result<Vec<DocId>> {
        let query = self.embedder.embed(request.query);
        if query.iter().all(|x| *x == 0.0) {
            return Ok(Vec::new());
        }
        let vectors = Arc::clone(&self.vectors);
        let (book_id, limit) = (request.book_id, request.limit);
        let ids = tokio::task::spawn_blocking(move || nearest(&vectors, &query, book_id, limit))
            .await
            .map_err(|err| HsError::Source(format!("vector task: {err}")))?;
        debug!(hits = ids.len(), "vector ranking complete");
        Ok(ids)
    }
}
