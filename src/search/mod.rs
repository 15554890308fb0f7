//! Multilingual search core
//!
//! Query expansion (script detection, phonetic codes, fuzzy matching against
//! the corpus vocabulary) feeding a hybrid lexical + semantic search fused
//! with RRF.

pub mod cache;
pub mod dictionary;
pub mod embeddings;
pub mod engine;
pub mod expand;
pub mod fuzzy;
pub mod hybrid;
pub mod phonetic;
pub mod script;
pub mod sources;

pub use dictionary::{DictionaryHandle, SqliteTermSource, TermDictionary, TermEntry, TermSource};
pub use engine::{HybridSearcher, SearchMode, SearchOutcome, SearchSettings};
pub use expand::{QueryExpander, QueryExpansion};
pub use hybrid::{DocId, FusedResult, RankedItem, RrfConfig, fuse, fuse_ids};
pub use phonetic::phonetic_code;
pub use script::{LangTag, detect_language};
