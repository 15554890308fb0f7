use std::sync::Arc;

use hs::config::{ExpansionConfig, IndexConfig};
use hs::index::rebuild;
use hs::search::cache::ExpansionCache;
use hs::search::{DictionaryHandle, LangTag, QueryExpander, SqliteTermSource, phonetic_code};
use hs::storage::Document;
use hs::test_utils::fixtures::{CorpusFixture, sample_documents};
use hs::test_utils::{TestCase, run_table_tests};

fn expander_for(fixture: &CorpusFixture) -> QueryExpander {
    let handle = DictionaryHandle::new(SqliteTermSource::new(fixture.db_path()));
    QueryExpander::new(Arc::new(handle), ExpansionConfig::default())
        .with_cache(ExpansionCache::new(16))
}

#[test]
fn test_phonetic_codes_table() {
    let cases = [
        ("digraph kh", "Khalid", "kld"),
        ("double vowel aa", "Khaalid", "kld"),
        ("sh and ee", "Sheeraz", "srz"),
        ("leading vowel kept", "Umar", "umr"),
        ("ph to f", "Phajr", "fjr"),
        ("punctuation dropped", "abu-bakr", "abkr"),
        ("single letter", "Q", "q"),
        ("arabic script", "محمد", ""),
    ]
    .into_iter()
    .map(|(name, input, expected)| TestCase::new(name, input, expected.to_string()))
    .collect();
    run_table_tests(cases, |input| phonetic_code(input)).unwrap();
}

#[test]
fn test_expands_against_indexed_corpus() {
    let fixture = CorpusFixture::new();
    let _ = fixture.indexed_database(&sample_documents());
    let expander = expander_for(&fixture);

    let english = expander.expand("mercyy charty");
    assert_eq!(english.language, LangTag::En);
    assert!(english.expanded.contains("mercy"));
    assert!(english.expanded.contains("charity"));
    for original in &english.original {
        assert!(english.expanded.contains(original));
    }

    let arabic = expander.expand("صلاه");
    assert_eq!(arabic.language, LangTag::Ar);
    assert!(arabic.expanded.contains("صلاة"), "{arabic:?}");
    assert!(arabic.expanded.iter().all(|t| !t.is_ascii()));
}

#[test]
fn test_reindex_visible_only_after_invalidate() {
    let fixture = CorpusFixture::new();
    let (db, _) = fixture.indexed_database(&sample_documents());
    let expander = expander_for(&fixture);

    let before = expander.expand("fastng");
    assert!(!before.expanded.contains("fasting"));

    db.insert_documents(&[Document {
        doc_id: 7,
        en_text: Some("Fasting during travel".to_string()),
        ..Document::default()
    }])
    .unwrap();
    rebuild(&db, &IndexConfig::default(), None).unwrap();

    // the loaded snapshot and cached expansion stay in use
    assert_eq!(expander.expand("fastng"), before);
    assert_eq!(expander.dictionary().load_count(), 1);

    expander.invalidate();
    let after = expander.expand("fastng");
    assert!(after.expanded.contains("fasting"), "{after:?}");
    assert_eq!(expander.dictionary().load_count(), 2);
}

#[test]
fn test_missing_database_degrades_to_original_terms() {
    let fixture = CorpusFixture::new();
    let expander = expander_for(&fixture);

    let expansion = expander.expand("mercy prayer");
    assert_eq!(expansion.original, vec!["mercy", "prayer"]);
    assert_eq!(expansion.expanded.len(), 2);
    assert!(!expander.dictionary().is_loaded());
}
