//! hs search - Hybrid search over the corpus

use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok, truncate_chars};
use crate::error::{HsError, Result};
use crate::search::embeddings::{Embedder, HashEmbedder};
use crate::search::engine::{HybridSearcher, SearchMode, SearchOutcome};
use crate::search::hybrid::DocId;
use crate::search::script::LangTag;
use crate::search::sources::{FtsSource, VectorSource};
use crate::storage::Document;

const SNIPPET_CHARS: usize = 160;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query (English, Arabic or Bengali)
    pub query: String,

    /// Maximum number of results (defaults to search.default_limit)
    #[arg(long, short)]
    pub limit: Option<usize>,

    /// Sources to use: hybrid, lexical, semantic
    #[arg(long, short)]
    pub mode: Option<SearchMode>,

    /// Only return documents from this book
    #[arg(long)]
    pub book: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
    pub language: LangTag,
    pub mode: SearchMode,
    pub expanded_terms: Vec<String>,
    pub count: usize,
    pub duration_ms: u64,
    pub results: Vec<SearchHit>,
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let limit = args.limit.unwrap_or(ctx.config.search.default_limit);
    if limit == 0 || limit > ctx.config.search.max_limit {
        return Err(HsError::InvalidArgument(format!(
            "limit must be within 1..={}, got {limit}",
            ctx.config.search.max_limit
        )));
    }

    let mut settings = ctx.config.search_settings();
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }

    let embedder: Arc<dyn Embedder> = ctx
        .embedder()
        .unwrap_or_else(|| Arc::new(HashEmbedder::new(ctx.config.search.embedding_dims)));
    let semantic = if ctx.config.search.use_embeddings {
        let db = ctx.db.lock();
        VectorSource::from_database(embedder, &db)?
    } else {
        VectorSource::new(embedder, Vec::new())
    };
    // own connection: a timed-out query must not hold ctx.db during hydration
    let lexical = FtsSource::open_readonly(&ctx.db_path)?;
    let searcher = HybridSearcher::new(Arc::new(ctx.expander()), lexical, semantic, settings);

    let started = Instant::now();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;
    let outcome = runtime.block_on(searcher.search_in(&args.query, args.book, limit));
    // do not wait for blocking tasks left behind by a source timeout
    runtime.shutdown_background();
    let outcome = outcome?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let warnings: Vec<String> = outcome.degraded.iter().map(|d| d.reason.clone()).collect();
    let response = hydrate(ctx, outcome, settings.mode, duration_ms)?;

    if ctx.robot_mode() {
        let envelope = robot_ok(&response, &ctx.config.robot).with_warnings(warnings);
        return emit_robot(&envelope, &ctx.config.robot);
    }

    emit_human(render(&response, &warnings));
    Ok(())
}

fn hydrate(
    ctx: &AppContext,
    outcome: SearchOutcome,
    mode: SearchMode,
    duration_ms: u64,
) -> Result<SearchResponse> {
    let ids: Vec<DocId> = outcome.results.iter().map(|r| r.doc_id).collect();
    let documents = ctx.db.lock().documents_by_ids(&ids)?;

    let results = outcome
        .results
        .iter()
        .map(|fused| {
            let doc = documents.iter().find(|d| d.doc_id == fused.doc_id);
            SearchHit {
                doc_id: fused.doc_id,
                score: fused.score,
                lexical_rank: fused.lexical_rank,
                semantic_rank: fused.semantic_rank,
                book_id: doc.and_then(|d| d.book_id),
                snippet: doc.and_then(|d| snippet(d, outcome.language)),
            }
        })
        .collect();

    Ok(SearchResponse {
        query: outcome.query,
        book_id: outcome.book_id,
        language: outcome.language,
        mode,
        expanded_terms: outcome.expansion.expanded.into_iter().collect(),
        count: outcome.count,
        duration_ms,
        results,
    })
}

/// Text in the query's language, else the first non-empty text.
fn snippet(doc: &Document, language: LangTag) -> Option<String> {
    doc.text(language)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| doc.texts().next().map(|(_, text)| text))
        .map(|text| truncate_chars(text.trim(), SNIPPET_CHARS))
}

fn render(response: &SearchResponse, warnings: &[String]) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Search: {}", response.query))
        .kv("Language", response.language.as_str())
        .kv("Mode", &response.mode.to_string())
        .kv(
            "Book",
            &response
                .book_id
                .map_or_else(|| "all".to_string(), |id| id.to_string()),
        )
        .kv("Terms", &response.expanded_terms.join(", "))
        .kv(
            "Results",
            &format!("{} ({}ms)", response.count, response.duration_ms),
        );
    for warning in warnings {
        layout.warning(warning);
    }
    layout.blank();

    if response.results.is_empty() {
        layout.push_line("No matching documents.");
    }
    for (idx, hit) in response.results.iter().enumerate() {
        layout.push_line(format!("{:>3}. #{}  score {:.4}", idx + 1, hit.doc_id, hit.score));
        if let Some(text) = &hit.snippet {
            layout.push_line(format!("     {text}"));
        }
    }
    layout
}
