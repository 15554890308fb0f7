//! Query expansion: phonetic and fuzzy matching against the term dictionary.
//!
//! English tokens are expanded through the phonetic index and fuzzy matched
//! against English vocabulary. Arabic- and Bengali-script tokens get fuzzy
//! matching only, against their own language, with a looser threshold.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::config::ExpansionConfig;
use crate::search::cache::ExpansionCache;
use crate::search::dictionary::{DictionaryHandle, TermDictionary};
use crate::search::phonetic::phonetic_code;
use crate::search::script::{LangTag, detect_language};

/// Result of expanding one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryExpansion {
    /// Query tokens in input order.
    pub original: Vec<String>,
    /// Sorted, deduplicated superset of `original`.
    pub expanded: BTreeSet<String>,
    pub language: LangTag,
}

impl QueryExpansion {
    /// Expansion containing only the given tokens.
    #[must_use]
    pub fn from_tokens(original: Vec<String>, language: LangTag) -> Self {
        let expanded = original.iter().cloned().collect();
        Self {
            original,
            expanded,
            language,
        }
    }

    #[must_use]
    pub fn empty(language: LangTag) -> Self {
        Self::from_tokens(Vec::new(), language)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Terms contributed by expansion, excluding the original tokens.
    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.expanded
            .iter()
            .filter(|term| !self.original.contains(*term))
            .map(String::as_str)
    }

    fn insert_all<'a>(&mut self, terms: impl IntoIterator<Item = &'a str>) {
        for term in terms {
            if !self.expanded.contains(term) {
                self.expanded.insert(term.to_string());
            }
        }
    }
}

/// Split a query into tokens, dropping those shorter than `min_chars`.
///
/// The query is NFC-normalized first so composed and decomposed spellings of
/// the same Bengali or Arabic word produce the same token.
#[must_use]
pub fn tokenize(query: &str, min_chars: usize) -> Vec<String> {
    let normalized: String = query.nfc().collect();
    normalized
        .split_whitespace()
        .filter(|token| token.chars().count() >= min_chars)
        .map(str::to_string)
        .collect()
}

/// Turns raw queries into [`QueryExpansion`]s.
pub struct QueryExpander {
    dictionary: Arc<DictionaryHandle>,
    config: ExpansionConfig,
    cache: Option<ExpansionCache>,
}

impl QueryExpander {
    #[must_use]
    pub const fn new(dictionary: Arc<DictionaryHandle>, config: ExpansionConfig) -> Self {
        Self {
            dictionary,
            config,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ExpansionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn dictionary(&self) -> &Arc<DictionaryHandle> {
        &self.dictionary
    }

    #[must_use]
    pub const fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&ExpansionCache> {
        self.cache.as_ref()
    }

    /// Drop the dictionary snapshot and all cached expansions.
    pub fn invalidate(&self) {
        self.dictionary.invalidate();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Expand `query`. Never fails: without a dictionary the expansion holds
    /// the original tokens only.
    pub fn expand(&self, query: &str) -> QueryExpansion {
        let tokens = tokenize(query, self.config.min_token_chars);
        let language = detect_language(query);
        if tokens.is_empty() {
            return QueryExpansion::empty(language);
        }

        let dict = match self.dictionary.get() {
            Ok(dict) => dict,
            Err(err) => {
                warn!(error = %err, "term dictionary unavailable, using original terms only");
                return QueryExpansion::from_tokens(tokens, language);
            }
        };

        if let Some(hit) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(dict.generation(), query))
        {
            return hit;
        }

        let expansion = self.expand_with(&dict, tokens, language);
        debug!(
            query,
            language = %expansion.language,
            original = expansion.original.len(),
            expanded = expansion.expanded.len(),
            "query expanded"
        );

        if let Some(cache) = &self.cache {
            cache.put(dict.generation(), query, expansion.clone());
        }
        expansion
    }

    fn expand_with(
        &self,
        dict: &TermDictionary,
        tokens: Vec<String>,
        language: LangTag,
    ) -> QueryExpansion {
        let mut expansion = QueryExpansion::from_tokens(tokens, language);
        let (threshold, fuzzy_lang) = match language {
            LangTag::En => (self.config.english_threshold, LangTag::En),
            other => (self.config.other_threshold, other),
        };
        let fuzzy = dict.fuzzy_index(fuzzy_lang);

        for token in expansion.original.clone() {
            if language == LangTag::En && self.config.phonetic {
                let code = phonetic_code(&token);
                expansion.insert_all(dict.phonetic_matches(&code));
            }

            if let Some(index) = fuzzy {
                let lowered = token.to_lowercase();
                let matches =
                    index.best_matches(&lowered, threshold, self.config.max_fuzzy_matches);
                expansion.insert_all(matches.iter().map(|m| m.term.as_str()));
            }
        }
        expansion
    }
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field("dictionary", &self.dictionary)
            .field("config", &self.config)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HsError, Result};
    use crate::search::dictionary::{StaticTermSource, TermEntry, TermSource};

    fn entries() -> Vec<TermEntry> {
        vec![
            TermEntry::new("muhammad", LangTag::En, 40),
            TermEntry::new("mohammed", LangTag::En, 3),
            TermEntry::new("prayer", LangTag::En, 30),
            TermEntry::new("prayers", LangTag::En, 12),
            TermEntry::new("patience", LangTag::En, 20),
            TermEntry::new("mercy", LangTag::En, 25),
            TermEntry::new("الصلاة", LangTag::Ar, 50),
            TermEntry::new("صلاة", LangTag::Ar, 9),
            TermEntry::new("নামাজ", LangTag::Bn, 4),
            TermEntry::new("নামাজের", LangTag::Bn, 3),
        ]
    }

    fn expander() -> QueryExpander {
        let handle = DictionaryHandle::new(StaticTermSource::new(entries()));
        QueryExpander::new(Arc::new(handle), ExpansionConfig::default())
    }

    struct Offline;

    impl TermSource for Offline {
        fn load(&self) -> Result<TermDictionary> {
            Err(HsError::DictionaryUnavailable("offline".into()))
        }

        fn describe(&self) -> String {
            "offline".into()
        }
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        assert_eq!(
            tokenize("a  patience in   hardship ", 2),
            vec!["patience", "in", "hardship"]
        );
        assert!(tokenize("   ", 2).is_empty());
    }

    #[test]
    fn test_english_phonetic_and_fuzzy_expansion() {
        let expansion = expander().expand("Mohamad prayr");
        assert_eq!(expansion.language, LangTag::En);
        assert_eq!(expansion.original, vec!["Mohamad", "prayr"]);
        for term in ["Mohamad", "prayr", "muhammad", "mohammed", "prayer", "prayers"] {
            assert!(expansion.expanded.contains(term), "missing {term}");
        }
        assert!(!expansion.expanded.contains("mercy"));
    }

    #[test]
    fn test_arabic_uses_own_language_terms() {
        let expansion = expander().expand("صلاه");
        assert_eq!(expansion.language, LangTag::Ar);
        assert!(expansion.expanded.contains("صلاة"));
        assert!(!expansion.expanded.contains("prayer"));
    }

    #[test]
    fn test_bengali_fuzzy_expansion() {
        let expansion = expander().expand("নামাজ");
        assert_eq!(expansion.language, LangTag::Bn);
        assert!(expansion.expanded.contains("নামাজের"));
    }

    #[test]
    fn test_empty_query_is_empty_expansion() {
        let expansion = expander().expand(" x ");
        assert!(expansion.original.is_empty());
        assert!(expansion.expanded.is_empty());
        assert_eq!(expansion.language, LangTag::En);
    }

    #[test]
    fn test_missing_dictionary_degrades_to_original_terms() {
        let handle = Arc::new(DictionaryHandle::new(Offline));
        let expander = QueryExpander::new(handle, ExpansionConfig::default());
        let expansion = expander.expand("mercy prayr");
        assert_eq!(expansion.original, vec!["mercy", "prayr"]);
        assert_eq!(expansion.expanded.len(), 2);
        assert_eq!(expansion.added().count(), 0);
    }

    #[test]
    fn test_phonetic_can_be_disabled() {
        let handle = Arc::new(DictionaryHandle::new(StaticTermSource::new(entries())));
        let config = ExpansionConfig {
            phonetic: false,
            ..ExpansionConfig::default()
        };
        let expansion = QueryExpander::new(handle, config).expand("mhmd");
        assert!(!expansion.expanded.contains("muhammad"));
    }

    #[test]
    fn test_cached_expansion_matches_fresh_expansion() {
        let expander = expander().with_cache(ExpansionCache::default());
        let first = expander.expand("prayr");
        let second = expander.expand("prayr");
        assert_eq!(first, second);
        assert_eq!(expander.cache().map(|c| c.stats().hits), Some(1));

        expander.invalidate();
        assert!(expander.cache().is_some_and(ExpansionCache::is_empty));
        assert_eq!(expander.expand("prayr"), first);
    }
}
