//! Hybrid search: expansion, concurrent ranking, fusion.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HsError, Result};
use crate::search::expand::{QueryExpander, QueryExpansion};
use crate::search::hybrid::{FusedResult, RankedItem, RrfConfig, fuse, ranked_from_ids};
use crate::search::script::LangTag;
use crate::search::sources::{RankingRequest, RankingSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Lexical,
    Semantic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        })
    }
}

/// Which sources take part in a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Lexical,
    Semantic,
}

impl SearchMode {
    const fn uses(self, kind: SourceKind) -> bool {
        matches!(
            (self, kind),
            (Self::Hybrid, _)
                | (Self::Lexical, SourceKind::Lexical)
                | (Self::Semantic, SourceKind::Semantic)
        )
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hybrid => "hybrid",
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        })
    }
}

impl std::str::FromStr for SearchMode {
    type Err = HsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "lexical" | "bm25" | "fulltext" => Ok(Self::Lexical),
            "semantic" | "vector" => Ok(Self::Semantic),
            other => Err(HsError::InvalidArgument(format!(
                "unknown search mode {other} (expected hybrid|lexical|semantic)"
            ))),
        }
    }
}

/// A source that contributed nothing to this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub source: SourceKind,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    pub language: LangTag,
    pub expansion: QueryExpansion,
    pub count: usize,
    pub results: Vec<FusedResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<Degradation>,
}

impl SearchOutcome {
    fn empty(query: &str, book_id: Option<i64>, expansion: QueryExpansion) -> Self {
        Self {
            query: query.to_string(),
            book_id,
            language: expansion.language,
            expansion,
            count: 0,
            results: Vec::new(),
            degraded: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub rrf: RrfConfig,
    pub mode: SearchMode,
    /// Ids requested from each source; raised to the result limit if lower.
    pub candidates: usize,
    pub source_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            rrf: RrfConfig::default(),
            mode: SearchMode::Hybrid,
            candidates: 50,
            source_timeout: Duration::from_secs(2),
        }
    }
}

/// Expands a query, asks both sources concurrently and fuses their rankings.
pub struct HybridSearcher<L, S> {
    expander: Arc<QueryExpander>,
    lexical: L,
    semantic: S,
    settings: SearchSettings,
}

impl<L: RankingSource, S: RankingSource> HybridSearcher<L, S> {
    pub const fn new(
        expander: Arc<QueryExpander>,
        lexical: L,
        semantic: S,
        settings: SearchSettings,
    ) -> Self {
        Self {
            expander,
            lexical,
            semantic,
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    #[must_use]
    pub const fn expander(&self) -> &Arc<QueryExpander> {
        &self.expander
    }

    /// Run one search over the whole corpus. Source timeouts and failures
    /// degrade that source to an empty ranking; only invalid parameters are
    /// errors.
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchOutcome> {
        self.search_in(query, None, limit).await
    }

    /// Like [`search`](Self::search), restricted to one book when `book_id`
    /// is set. Both sources apply the restriction before ranking.
    pub async fn search_in(
        &self,
        query: &str,
        book_id: Option<i64>,
        limit: usize,
    ) -> Result<SearchOutcome> {
        if limit == 0 {
            return Err(HsError::InvalidArgument("limit must be > 0".to_string()));
        }
        self.settings.rrf.validate()?;

        let query = query.trim();
        let expansion = self.expander.expand(query);
        if query.is_empty() {
            return Ok(SearchOutcome::empty(query, book_id, expansion));
        }

        let request = RankingRequest {
            query,
            expansion: &expansion,
            limit: self.settings.candidates.max(limit),
            book_id,
        };
        let ((lexical, lexical_issue), (semantic, semantic_issue)) = tokio::join!(
            self.run_source(SourceKind::Lexical, &self.lexical, &request),
            self.run_source(SourceKind::Semantic, &self.semantic, &request),
        );

        let results = fuse(&lexical, &semantic, &self.settings.rrf, limit)?;
        debug!(
            query,
            book_id,
            lexical = lexical.len(),
            semantic = semantic.len(),
            results = results.len(),
            "hybrid search complete"
        );

        Ok(SearchOutcome {
            query: query.to_string(),
            book_id,
            language: expansion.language,
            count: results.len(),
            results,
            degraded: lexical_issue.into_iter().chain(semantic_issue).collect(),
            expansion,
        })
    }

    async fn run_source<R: RankingSource>(
        &self,
        kind: SourceKind,
        source: &R,
        request: &RankingRequest<'_>,
    ) -> (Vec<RankedItem>, Option<Degradation>) {
        if !self.settings.mode.uses(kind) {
            return (Vec::new(), None);
        }

        let timeout = self.settings.source_timeout;
        let err = match tokio::time::timeout(timeout, source.rank(request)).await {
            Ok(Ok(ids)) => return (ranked_from_ids(ids), None),
            Ok(Err(err)) => err,
            Err(_) => HsError::SourceTimeout {
                source_name: source.name().to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        warn!(source = %kind, error = %err, "ranking source degraded to empty result");
        let degradation = Degradation {
            source: kind,
            code: err.code(),
            reason: err.to_string(),
        };
        (Vec::new(), Some(degradation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpansionConfig;
    use crate::search::dictionary::{DictionaryHandle, StaticTermSource, TermEntry};
    use crate::search::hybrid::DocId;

    struct Fixed {
        ids: Vec<DocId>,
        delay: Duration,
        fail: bool,
    }

    impl Fixed {
        fn new(ids: Vec<DocId>) -> Self {
            Self {
                ids,
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    impl RankingSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn rank(&self, request: &RankingRequest<'_>) -> Result<Vec<DocId>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(HsError::Source("boom".into()));
            }
            Ok(self.ids.iter().copied().take(request.limit).collect())
        }
    }

    fn expander() -> Arc<QueryExpander> {
        let handle = DictionaryHandle::new(StaticTermSource::new(vec![TermEntry::new(
            "mercy",
            LangTag::En,
            3,
        )]));
        Arc::new(QueryExpander::new(
            Arc::new(handle),
            ExpansionConfig::default(),
        ))
    }

    fn settings() -> SearchSettings {
        SearchSettings {
            source_timeout: Duration::from_millis(50),
            ..SearchSettings::default()
        }
    }

    #[tokio::test]
    async fn test_fuses_both_sources() {
        let searcher = HybridSearcher::new(
            expander(),
            Fixed::new(vec![1, 2]),
            Fixed::new(vec![2, 3]),
            settings(),
        );
        let outcome = searcher.search("  mercy ", 10).await.unwrap();
        assert_eq!(outcome.query, "mercy");
        assert_eq!(outcome.count, 3);
        let ids: Vec<DocId> = outcome.results.iter().map(|r| r.doc_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!(outcome.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_degrades_source() {
        let slow = Fixed {
            delay: Duration::from_secs(5),
            ..Fixed::new(vec![9])
        };
        let searcher = HybridSearcher::new(expander(), Fixed::new(vec![1, 2]), slow, settings());
        let outcome = searcher.search("mercy", 10).await.unwrap();

        let ids: Vec<DocId> = outcome.results.iter().map(|r| r.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(outcome.degraded.len(), 1);
        assert_eq!(outcome.degraded[0].source, SourceKind::Semantic);
        assert_eq!(outcome.degraded[0].code, "source_timeout");
    }

    #[tokio::test]
    async fn test_failing_source_degrades() {
        let broken = Fixed {
            fail: true,
            ..Fixed::new(vec![])
        };
        let searcher = HybridSearcher::new(expander(), broken, Fixed::new(vec![4]), settings());
        let outcome = searcher.search("mercy", 10).await.unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.degraded[0].source, SourceKind::Lexical);
        assert_eq!(outcome.degraded[0].code, "source_error");
    }

    #[tokio::test]
    async fn test_mode_skips_source_without_degrading() {
        let searcher = HybridSearcher::new(
            expander(),
            Fixed::new(vec![1]),
            Fixed::new(vec![2]),
            SearchSettings {
                mode: SearchMode::Semantic,
                ..settings()
            },
        );
        let outcome = searcher.search("mercy", 10).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].doc_id, 2);
        assert!(outcome.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_and_invalid_limit() {
        let searcher = HybridSearcher::new(
            expander(),
            Fixed::new(vec![1]),
            Fixed::new(vec![2]),
            settings(),
        );
        let outcome = searcher.search("   ", 10).await.unwrap();
        assert_eq!(outcome.count, 0);
        assert!(outcome.results.is_empty());

        assert!(matches!(
            searcher.search("mercy", 0).await,
            Err(HsError::InvalidArgument(_))
        ));
    }

    /// Answers with the requested book id, or nothing without one.
    struct BookEcho;

    impl RankingSource for BookEcho {
        fn name(&self) -> &'static str {
            "book_echo"
        }

        async fn rank(&self, request: &RankingRequest<'_>) -> Result<Vec<DocId>> {
            Ok(request.book_id.into_iter().collect())
        }
    }

    #[tokio::test]
    async fn test_book_reaches_both_sources() {
        let searcher = HybridSearcher::new(expander(), BookEcho, BookEcho, settings());

        let outcome = searcher.search_in("mercy", Some(42), 10).await.unwrap();
        assert_eq!(outcome.book_id, Some(42));
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].doc_id, 42);
        assert_eq!(outcome.results[0].lexical_rank, Some(1));
        assert_eq!(outcome.results[0].semantic_rank, Some(1));

        let outcome = searcher.search("mercy", 10).await.unwrap();
        assert_eq!(outcome.book_id, None);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_search_mode_parsing() {
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert!("other".parse::<SearchMode>().is_err());
    }
}
