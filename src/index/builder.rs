//! Builds the `search_terms` dictionary and document embeddings from the
//! stored corpus.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use std::time::Instant;

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::search::dictionary::TermEntry;
use crate::search::embeddings::Embedder;
use crate::search::hybrid::DocId;
use crate::search::script::LangTag;
use crate::storage::{Database, Document};

static ENGLISH_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+").expect("valid english word regex"));
static ARABIC_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x{0600}-\x{06FF}]+").expect("valid arabic word regex"));
// Bengali and Urdu texts quote Arabic, so both blocks count as word characters.
static BENGALI_URDU_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{0980}-\x{09FF}\x{0600}-\x{06FF}]+").expect("valid bengali/urdu word regex")
});

static ENGLISH_STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "need", "he", "she", "it", "they", "we", "i", "you", "his", "her", "its",
        "their", "our", "my", "your", "this", "that", "these", "those", "who", "whom", "which",
        "what", "where", "when", "why", "how", "said", "says", "saying", "told", "asked",
        "replied", "answered", "then", "so", "if", "not", "no", "yes", "all", "any", "some",
        "one", "two", "three", "him", "them", "us", "me", "about", "into", "over", "after",
        "before", "between", "under", "again", "there", "here", "up", "down", "out", "off",
        "more", "most", "other", "only", "same", "just", "also", "very", "much", "many",
        "such", "own", "each", "allah", "prophet", "messenger", "narrated", "abu", "ibn", "bin",
    ]
    .into_iter()
    .collect()
});

static ARABIC_STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "من", "في", "على", "إلى", "عن", "مع", "هذا", "هذه", "ذلك", "تلك", "الذي", "التي",
        "الذين", "ما", "لا", "إن", "أن", "كان", "كانت", "يكون", "تكون", "هو", "هي", "هم",
        "أنا", "نحن", "أنت", "قال", "قالت", "قالوا", "ثم", "أو", "و", "ف", "ب", "ل", "ك",
        "حتى", "إذا", "لم", "لن", "قد", "عند", "بعد", "قبل", "بين", "كل", "بعض", "غير", "أي",
        "له", "لها", "لهم", "به", "بها",
    ]
    .into_iter()
    .collect()
});

/// Dictionary words of `text`, written in `language`, in text order.
///
/// English text is lowercased and split into ASCII letter runs; Arabic and
/// Bengali/Urdu texts are split into runs of their script blocks. Words
/// shorter than `min_chars` characters and stopwords are dropped.
#[must_use]
pub fn extract_words(text: &str, language: LangTag, min_chars: usize) -> Vec<String> {
    let long_enough = |word: &&str| word.chars().count() >= min_chars;
    match language {
        LangTag::En => {
            let lowered = text.to_lowercase();
            ENGLISH_WORD
                .find_iter(&lowered)
                .map(|m| m.as_str())
                .filter(long_enough)
                .filter(|word| !ENGLISH_STOPWORDS.contains(word))
                .map(str::to_string)
                .collect()
        }
        LangTag::Ar => ARABIC_WORD
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(long_enough)
            .filter(|word| !ARABIC_STOPWORDS.contains(word))
            .map(str::to_string)
            .collect(),
        LangTag::Bn | LangTag::Ur => BENGALI_URDU_WORD
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(long_enough)
            .map(str::to_string)
            .collect(),
    }
}

/// Count words across `documents` and emit dictionary entries for those
/// reaching `config.min_frequency`, sorted by language then term.
#[must_use]
pub fn build_terms(documents: &[Document], config: &IndexConfig) -> Vec<TermEntry> {
    let per_document: Vec<Vec<(LangTag, Vec<String>)>> = documents
        .par_iter()
        .map(|doc| {
            doc.texts()
                .map(|(lang, text)| {
                    let normalized: String = text.nfc().collect();
                    (lang, extract_words(&normalized, lang, config.min_term_chars))
                })
                .collect()
        })
        .collect();

    let mut counts: HashMap<LangTag, HashMap<String, u32>> = HashMap::new();
    for (lang, words) in per_document.into_iter().flatten() {
        let lang_counts = counts.entry(lang).or_default();
        for word in words {
            let count = lang_counts.entry(word).or_insert(0);
            *count = count.saturating_add(1);
        }
    }

    let mut entries = Vec::new();
    for lang in LangTag::ALL {
        let Some(lang_counts) = counts.remove(&lang) else {
            continue;
        };
        let mut terms: Vec<(String, u32)> = lang_counts
            .into_iter()
            .filter(|(_, freq)| *freq >= config.min_frequency)
            .collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries.extend(
            terms
                .into_iter()
                .map(|(term, freq)| TermEntry::new(term, lang, freq)),
        );
    }
    entries
}

/// Embed every document that has English or Arabic text.
#[must_use]
pub fn build_embeddings(documents: &[Document], embedder: &dyn Embedder) -> Vec<(DocId, Vec<f32>)> {
    documents
        .par_iter()
        .filter_map(|doc| {
            let text = doc.embedding_text();
            (!text.is_empty()).then(|| (doc.doc_id, embedder.embed(&text)))
        })
        .collect()
}

/// Summary of an index rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub documents: usize,
    pub terms: usize,
    pub terms_by_language: BTreeMap<LangTag, usize>,
    pub phonetic_terms: usize,
    /// `None` when embeddings were not requested.
    pub embeddings: Option<usize>,
    pub elapsed_ms: u64,
}

/// Rebuild the dictionary (and optionally the embeddings) of `db` from its
/// documents, replacing what was stored before.
pub fn rebuild(
    db: &Database,
    config: &IndexConfig,
    embedder: Option<&dyn Embedder>,
) -> Result<IndexReport> {
    let started = Instant::now();
    let documents = db.all_documents()?;

    let entries = build_terms(&documents, config);
    db.replace_search_terms(&entries)?;

    let mut terms_by_language = BTreeMap::new();
    for entry in &entries {
        *terms_by_language.entry(entry.language).or_insert(0) += 1;
    }
    let phonetic_terms = entries
        .iter()
        .filter(|entry| entry.phonetic_code.is_some())
        .count();

    let embeddings = match embedder {
        Some(embedder) => {
            let vectors = build_embeddings(&documents, embedder);
            Some(db.replace_embeddings(&vectors)?)
        }
        None => None,
    };

    let report = IndexReport {
        documents: documents.len(),
        terms: entries.len(),
        terms_by_language,
        phonetic_terms,
        embeddings,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        documents = report.documents,
        terms = report.terms,
        embeddings = ?report.embeddings,
        elapsed_ms = report.elapsed_ms,
        "search index rebuilt"
    );
    Ok(report)
}
