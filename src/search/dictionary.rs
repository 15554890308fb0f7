//! Term dictionary: corpus vocabulary per language plus a phonetic index.
//!
//! The dictionary is built offline (see [`crate::index::builder`]) and read
//! at query time through a [`DictionaryHandle`], which loads it at most once
//! and serves an immutable snapshot until explicitly invalidated.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HsError, Result};
use crate::search::fuzzy::FuzzyIndex;
use crate::search::phonetic::phonetic_code;
use crate::search::script::LangTag;
use crate::storage::Database;

/// One corpus-derived vocabulary word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub language: LangTag,
    pub frequency: u32,
    pub phonetic_code: Option<String>,
}

impl TermEntry {
    #[must_use]
    pub fn new(term: impl Into<String>, language: LangTag, frequency: u32) -> Self {
        let term = term.into();
        let phonetic_code = language.is_latin().then(|| phonetic_code(&term));
        Self {
            term,
            language,
            frequency,
            phonetic_code,
        }
    }
}

#[derive(Debug, Default)]
struct LanguageTerms {
    terms: BTreeSet<String>,
    fuzzy: FuzzyIndex,
}

/// Immutable in-memory dictionary snapshot.
#[derive(Debug, Default)]
pub struct TermDictionary {
    languages: HashMap<LangTag, LanguageTerms>,
    /// Phonetic code -> terms, most frequent first.
    phonetic: BTreeMap<String, Vec<String>>,
    generation: u64,
}

impl TermDictionary {
    /// Build a dictionary from entries. The first entry for a given
    /// `(language, term)` pair wins; later duplicates are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = TermEntry>) -> Self {
        let mut languages: HashMap<LangTag, LanguageTerms> = HashMap::new();
        let mut phonetic: BTreeMap<String, Vec<(u32, String)>> = BTreeMap::new();

        for entry in entries {
            let lang = languages.entry(entry.language).or_default();
            if !lang.terms.insert(entry.term.clone()) {
                continue;
            }
            lang.fuzzy.insert(entry.term.clone());

            if !entry.language.is_latin() {
                continue;
            }
            let code = entry
                .phonetic_code
                .unwrap_or_else(|| phonetic_code(&entry.term));
            if !code.is_empty() {
                phonetic
                    .entry(code)
                    .or_default()
                    .push((entry.frequency, entry.term));
            }
        }

        let phonetic = phonetic
            .into_iter()
            .map(|(code, mut terms)| {
                terms.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                (code, terms.into_iter().map(|(_, term)| term).collect())
            })
            .collect();

        Self {
            languages,
            phonetic,
            generation: 0,
        }
    }

    #[must_use]
    fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Load counter of the handle that produced this snapshot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Known terms for a language, in sorted order.
    pub fn terms_for(&self, language: LangTag) -> impl Iterator<Item = &str> {
        self.languages
            .get(&language)
            .into_iter()
            .flat_map(|lang| lang.terms.iter().map(String::as_str))
    }

    #[must_use]
    pub fn contains(&self, language: LangTag, term: &str) -> bool {
        self.languages
            .get(&language)
            .is_some_and(|lang| lang.terms.contains(term))
    }

    #[must_use]
    pub fn fuzzy_index(&self, language: LangTag) -> Option<&FuzzyIndex> {
        self.languages.get(&language).map(|lang| &lang.fuzzy)
    }

    /// Most frequent term carrying exactly this phonetic code.
    #[must_use]
    pub fn phonetic_lookup(&self, code: &str) -> Option<&str> {
        self.phonetic
            .get(code)
            .and_then(|terms| terms.first())
            .map(String::as_str)
    }

    /// Terms whose code equals `code`, is a prefix of it, or extends it.
    #[must_use]
    pub fn phonetic_matches(&self, code: &str) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        if code.is_empty() {
            return out;
        }

        // Codes are ASCII, so byte slicing is on char boundaries.
        for end in 1..code.len() {
            if let Some(terms) = self.phonetic.get(&code[..end]) {
                out.extend(terms.iter().map(String::as_str));
            }
        }
        for (stored, terms) in self
            .phonetic
            .range::<str, _>((Bound::Included(code), Bound::Unbounded))
        {
            if !stored.starts_with(code) {
                break;
            }
            out.extend(terms.iter().map(String::as_str));
        }
        out
    }

    #[must_use]
    pub fn language_len(&self, language: LangTag) -> usize {
        self.languages
            .get(&language)
            .map_or(0, |lang| lang.terms.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.languages.values().map(|lang| lang.terms.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn phonetic_len(&self) -> usize {
        self.phonetic.len()
    }
}

/// Backing store the dictionary is loaded from.
pub trait TermSource: Send + Sync {
    /// Load a full dictionary. Failures should be
    /// [`HsError::DictionaryUnavailable`].
    fn load(&self) -> Result<TermDictionary>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Reads the `search_terms` table of a corpus database.
#[derive(Debug, Clone)]
pub struct SqliteTermSource {
    path: PathBuf,
}

impl SqliteTermSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TermSource for SqliteTermSource {
    fn load(&self) -> Result<TermDictionary> {
        let unavailable =
            |err: HsError| HsError::DictionaryUnavailable(format!("{}: {err}", self.path.display()));
        let db = Database::open_readonly(&self.path).map_err(unavailable)?;
        let entries = db.load_search_terms().map_err(unavailable)?;
        Ok(TermDictionary::from_entries(entries))
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// In-memory entries, for embedding callers and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTermSource {
    entries: Vec<TermEntry>,
}

impl StaticTermSource {
    #[must_use]
    pub const fn new(entries: Vec<TermEntry>) -> Self {
        Self { entries }
    }
}

impl TermSource for StaticTermSource {
    fn load(&self) -> Result<TermDictionary> {
        Ok(TermDictionary::from_entries(self.entries.iter().cloned()))
    }

    fn describe(&self) -> String {
        format!("static:{} entries", self.entries.len())
    }
}

/// Owned, shareable access to the dictionary.
///
/// The first `get()` loads the dictionary under a mutex; callers that arrive
/// during the load wait for it instead of loading again. Afterwards a read
/// takes the snapshot `RwLock` in shared mode just long enough to clone the
/// `Arc`, so readers never exclude each other and the dictionary itself is
/// searched without any lock held. The snapshot lock is only taken for
/// writing to publish or drop a snapshot, never while loading. A failed load
/// is not remembered, so the next call tries again. `invalidate()` forces the
/// next `get()` to reload.
pub struct DictionaryHandle {
    source: Box<dyn TermSource>,
    snapshot: RwLock<Option<Arc<TermDictionary>>>,
    load_lock: Mutex<()>,
    loads: AtomicU64,
}

impl DictionaryHandle {
    pub fn new(source: impl TermSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            snapshot: RwLock::new(None),
            load_lock: Mutex::new(()),
            loads: AtomicU64::new(0),
        }
    }

    /// Current snapshot, loading it first if needed.
    pub fn get(&self) -> Result<Arc<TermDictionary>> {
        if let Some(dict) = self.snapshot.read().as_ref() {
            return Ok(Arc::clone(dict));
        }

        let _guard = self.load_lock.lock();
        // another caller may have finished the load while we waited
        if let Some(dict) = self.snapshot.read().as_ref() {
            return Ok(Arc::clone(dict));
        }

        let started = Instant::now();
        let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let dict = Arc::new(self.source.load()?.with_generation(generation));
        info!(
            source = %self.source.describe(),
            terms = dict.len(),
            phonetic_codes = dict.phonetic_len(),
            generation,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "term dictionary loaded"
        );
        *self.snapshot.write() = Some(Arc::clone(&dict));
        Ok(dict)
    }

    /// Drop the cached snapshot. Readers holding the old `Arc` keep it.
    pub fn invalidate(&self) {
        let _guard = self.load_lock.lock();
        if self.snapshot.write().take().is_some() {
            debug!(source = %self.source.describe(), "term dictionary invalidated");
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Number of load attempts made so far, including failed ones.
    #[must_use]
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DictionaryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryHandle")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
