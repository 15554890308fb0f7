use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::IndexConfig;
use crate::index::{IndexReport, rebuild};
use crate::search::embeddings::HashEmbedder;
use crate::storage::{Database, Document};

const EMBEDDING_DIMS: usize = 384;

fn doc(doc_id: i64, book_id: i64, en: &str, ar: &str, bn: &str) -> Document {
    Document {
        doc_id,
        book_id: Some(book_id),
        en_text: Some(en.to_string()),
        ar_text: Some(ar.to_string()),
        bn_text: Some(bn.to_string()),
        ur_text: None,
    }
}

/// A small trilingual corpus. Words such as `mercy`, `prayer`, `charity`,
/// `صلاة` and `সদকা` occur at least twice so they survive the default
/// dictionary frequency cutoff.
#[must_use]
pub fn sample_documents() -> Vec<Document> {
    vec![
        doc(
            1,
            1,
            "Allah is gentle and loves mercy and gentleness in all matters",
            "إن الله رفيق يحب الرفق في الأمر كله",
            "আল্লাহ কোমল এবং সব বিষয়ে দয়া ভালোবাসেন",
        ),
        doc(
            2,
            1,
            "Whoever shows no mercy to people, Allah will show no mercy to him",
            "من لا يرحم الناس لا يرحمه الله",
            "যে মানুষের প্রতি দয়া করে না আল্লাহ তার প্রতি দয়া করেন না",
        ),
        doc(
            3,
            2,
            "The prayer offered in congregation is better than the prayer offered alone",
            "صلاة الجماعة أفضل من صلاة الفذ بسبع وعشرين درجة",
            "জামাতে নামাজ একা নামাজ পড়ার চেয়ে উত্তম",
        ),
        doc(
            4,
            3,
            "Charity does not decrease wealth",
            "ما نقصت صدقة من مال",
            "সদকা সম্পদ কমায় না",
        ),
        doc(
            5,
            3,
            "Give charity without delay, for calamity cannot pass charity",
            "باكروا بالصدقة فإن البلاء لا يتخطى الصدقة",
            "দেরি না করে সদকা দাও",
        ),
        doc(
            6,
            4,
            "Fasting is a shield",
            "الصيام جنة",
            "রোজা ঢাল",
        ),
    ]
}

/// Serialize documents as JSON Lines, the `hs import` input format.
#[must_use]
pub fn to_jsonl(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| serde_json::to_string(doc).expect("document serializes"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Isolated `hs` root in a temp directory.
pub struct CorpusFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for CorpusFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join("hs.db")
    }

    /// Write a file under the root and return its path.
    #[must_use]
    pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Write the sample corpus as `corpus.jsonl`.
    #[must_use]
    pub fn write_sample_jsonl(&self) -> PathBuf {
        self.write_file("corpus.jsonl", &to_jsonl(&sample_documents()))
    }

    /// Open the fixture database, load `documents` and build the full-text
    /// index, dictionary and embeddings.
    #[must_use]
    pub fn indexed_database(&self, documents: &[Document]) -> (Database, IndexReport) {
        let db = Database::open(self.db_path()).expect("Failed to open database");
        load_and_index(&db, documents);
        let report = rebuild(
            &db,
            &IndexConfig::default(),
            Some(&HashEmbedder::new(EMBEDDING_DIMS)),
        )
        .expect("Failed to rebuild index");
        (db, report)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }
}

fn load_and_index(db: &Database, documents: &[Document]) {
    db.insert_documents(documents)
        .expect("Failed to insert documents");
    db.rebuild_fts().expect("Failed to rebuild full-text index");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::script::LangTag;

    #[test]
    fn test_indexed_database_holds_sample_terms() {
        let fixture = CorpusFixture::new();
        let (db, report) = fixture.indexed_database(&sample_documents());

        assert_eq!(report.documents, 6);
        assert_eq!(report.embeddings, Some(6));
        let terms = db.load_search_terms().unwrap();
        let has = |lang: LangTag, term: &str| {
            terms.iter().any(|t| t.language == lang && t.term == term)
        };
        assert!(has(LangTag::En, "mercy"));
        assert!(has(LangTag::En, "charity"));
        assert!(has(LangTag::Ar, "صلاة"));
        assert!(has(LangTag::Bn, "সদকা"));
    }

    #[test]
    fn test_jsonl_round_trips_through_serde() {
        let body = to_jsonl(&sample_documents());
        assert_eq!(body.lines().count(), 6);
        let first: Document = serde_json::from_str(body.lines().next().unwrap()).unwrap();
        assert_eq!(first.doc_id, 1);
    }
}
