//! SQLite database layer

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::search::dictionary::TermEntry;
use crate::search::hybrid::DocId;
use crate::search::script::LangTag;
use crate::storage::migrations;

/// One corpus record with its per-language texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    #[serde(default)]
    pub book_id: Option<i64>,
    #[serde(default)]
    pub en_text: Option<String>,
    #[serde(default)]
    pub ar_text: Option<String>,
    #[serde(default)]
    pub bn_text: Option<String>,
    #[serde(default)]
    pub ur_text: Option<String>,
}

impl Document {
    #[must_use]
    pub fn text(&self, language: LangTag) -> Option<&str> {
        match language {
            LangTag::En => self.en_text.as_deref(),
            LangTag::Ar => self.ar_text.as_deref(),
            LangTag::Bn => self.bn_text.as_deref(),
            LangTag::Ur => self.ur_text.as_deref(),
        }
    }

    /// Non-empty texts in `LangTag::ALL` order.
    pub fn texts(&self) -> impl Iterator<Item = (LangTag, &str)> {
        LangTag::ALL.into_iter().filter_map(|lang| {
            self.text(lang)
                .filter(|t| !t.trim().is_empty())
                .map(|t| (lang, t))
        })
    }

    /// English and Arabic text joined, the input for document embeddings.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        [self.en_text.as_deref(), self.ar_text.as_deref()]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            doc_id: row.get(0)?,
            book_id: row.get(1)?,
            en_text: row.get(2)?,
            ar_text: row.get(3)?,
            bn_text: row.get(4)?,
            ur_text: row.get(5)?,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "doc_id, book_id, en_text, ar_text, bn_text, ur_text";

/// SQLite database wrapper for the hadith corpus
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl Database {
    /// Open database at the given path, creating and migrating it as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Open an existing database without writing to it. Fails when the file
    /// does not exist.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let schema_version = migrations::current_version(&conn)?.unwrap_or(0);
        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Fresh migrated in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Get a reference to the connection
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    /// Insert or replace documents. The FTS index is not touched; call
    /// [`Database::rebuild_fts`] afterwards.
    pub fn insert_documents(&self, documents: &[Document]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (doc_id, book_id, en_text, ar_text, bn_text, ur_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(doc_id) DO UPDATE SET
                     book_id = excluded.book_id,
                     en_text = excluded.en_text,
                     ar_text = excluded.ar_text,
                     bn_text = excluded.bn_text,
                     ur_text = excluded.ur_text",
            )?;
            for doc in documents {
                stmt.execute(params![
                    doc.doc_id,
                    doc.book_id,
                    doc.en_text,
                    doc.ar_text,
                    doc.bn_text,
                    doc.ur_text,
                ])?;
            }
        }
        tx.commit()?;
        Ok(documents.len())
    }

    /// Rebuild the external-content FTS index from `documents`.
    pub fn rebuild_fts(&self) -> Result<()> {
        self.conn
            .execute("INSERT INTO documents_fts(documents_fts) VALUES ('rebuild')", [])?;
        Ok(())
    }

    pub fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Every document, ordered by id.
    pub fn all_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY doc_id"
        ))?;
        let docs = stmt
            .query_map([], Document::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    /// Documents for `ids` in the given order. Unknown ids are skipped.
    pub fn documents_by_ids(&self, ids: &[DocId]) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_id = ?1"
        ))?;
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = stmt.query_row([id], Document::from_row).optional()? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Run an FTS5 `MATCH` expression, best BM25 first. With `book_id` set,
    /// only documents of that book are returned.
    pub fn fts_search(
        &self,
        match_expr: &str,
        book_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DocId>> {
        let mut stmt = self.conn.prepare(
            "SELECT documents_fts.rowid FROM documents_fts
             JOIN documents ON documents.doc_id = documents_fts.rowid
             WHERE documents_fts MATCH ?1
               AND (?2 IS NULL OR documents.book_id = ?2)
             ORDER BY bm25(documents_fts), documents_fts.rowid
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let ids = stmt
            .query_map(params![match_expr, book_id, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<DocId>>>()?;
        Ok(ids)
    }

    // -------------------------------------------------------------------------
    // Term dictionary
    // -------------------------------------------------------------------------

    /// Replace the whole `search_terms` table.
    pub fn replace_search_terms(&self, entries: &[TermEntry]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM search_terms", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO search_terms (term, language, frequency, phonetic_code)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.term,
                    entry.language.as_str(),
                    entry.frequency,
                    entry.phonetic_code,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// All dictionary rows, ordered by language then term.
    pub fn load_search_terms(&self) -> Result<Vec<TermEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT term, language, frequency, phonetic_code
             FROM search_terms ORDER BY language, term",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(term, language, frequency, phonetic_code)| -> Result<TermEntry> {
                Ok(TermEntry {
                    term,
                    language: language.parse()?,
                    frequency,
                    phonetic_code,
                })
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Embeddings
    // -------------------------------------------------------------------------

    /// Replace all stored document embeddings.
    pub fn replace_embeddings(&self, embeddings: &[(DocId, Vec<f32>)]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM document_embeddings", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO document_embeddings (doc_id, dims, embedding) VALUES (?1, ?2, ?3)",
            )?;
            for (doc_id, vector) in embeddings {
                let dims = i64::try_from(vector.len()).unwrap_or(i64::MAX);
                stmt.execute(params![doc_id, dims, encode_vector(vector)])?;
            }
        }
        tx.commit()?;
        Ok(embeddings.len())
    }

    /// Stored embeddings, ordered by id. Rows whose blob does not match
    /// their recorded dimension are skipped.
    pub fn load_embeddings(&self) -> Result<Vec<(DocId, Vec<f32>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc_id, dims, embedding FROM document_embeddings ORDER BY doc_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, DocId>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, dims, blob)| {
                let vector = decode_vector(&blob);
                (usize::try_from(dims).ok() == Some(vector.len())).then_some((id, vector))
            })
            .collect())
    }

    /// Stored embeddings with the book of their document, ordered by id.
    pub fn load_book_embeddings(&self) -> Result<Vec<(DocId, Option<i64>, Vec<f32>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.doc_id, d.book_id, e.dims, e.embedding
             FROM document_embeddings e
             JOIN documents d ON d.doc_id = e.doc_id
             ORDER BY e.doc_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, DocId>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, book_id, dims, blob)| {
                let vector = decode_vector(&blob);
                (usize::try_from(dims).ok() == Some(vector.len())).then_some((id, book_id, vector))
            })
            .collect())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn doc(doc_id: DocId, en: &str, ar: &str) -> Document {
        Document {
            doc_id,
            book_id: Some(1),
            en_text: Some(en.to_string()),
            ar_text: Some(ar.to_string()),
            ..Document::default()
        }
    }

    #[test]
    fn test_database_creation_and_schema_version() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("corpus.db");
        let db = Database::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(db.schema_version(), migrations::SCHEMA_VERSION);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("corpus.db")).unwrap();
        let mode: String = db
            .conn()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_all_tables_created() {
        let db = Database::open_in_memory().unwrap();
        for table in [
            "documents",
            "documents_fts",
            "search_terms",
            "document_embeddings",
            "schema_version",
        ] {
            let exists: i32 = db
                .conn()
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {table} should exist");
        }
    }

    #[test]
    fn test_documents_roundtrip_and_order() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[doc(2, "two", "اثنان"), doc(1, "one", "واحد")])
            .unwrap();
        assert_eq!(db.document_count().unwrap(), 2);

        let ids: Vec<DocId> = db.all_documents().unwrap().iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![1, 2]);

        let hydrated = db.documents_by_ids(&[2, 99, 1]).unwrap();
        let ids: Vec<DocId> = hydrated.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_insert_replaces_existing_document() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[doc(1, "old", "")]).unwrap();
        db.insert_documents(&[doc(1, "new", "")]).unwrap();
        let docs = db.all_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].en_text.as_deref(), Some("new"));
    }

    #[test]
    fn test_fts_search_after_rebuild() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[
            doc(1, "The reward of patience is paradise", "الصبر"),
            doc(2, "Prayer at its proper time", "الصلاة"),
            doc(3, "Patience patience patience", ""),
        ])
        .unwrap();
        db.rebuild_fts().unwrap();

        let ids = db.fts_search("\"patience\"", None, 10).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&3));

        assert_eq!(db.fts_search("\"الصلاة\"", None, 10).unwrap(), vec![2]);
        assert_eq!(
            db.fts_search("\"patience\" OR \"prayer\"", None, 1)
                .unwrap()
                .len(),
            1
        );
        assert!(db.fts_search("\"zakat\"", None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_fts_search_restricted_to_book() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[
            doc(1, "The reward of patience", ""),
            Document {
                book_id: Some(2),
                ..doc(2, "Patience in hardship", "")
            },
            Document {
                book_id: None,
                ..doc(3, "Patience with neighbours", "")
            },
        ])
        .unwrap();
        db.rebuild_fts().unwrap();

        assert_eq!(db.fts_search("\"patience\"", Some(2), 10).unwrap(), vec![2]);
        assert_eq!(db.fts_search("\"patience\"", Some(1), 10).unwrap(), vec![1]);
        assert!(db.fts_search("\"patience\"", Some(9), 10).unwrap().is_empty());
        assert_eq!(db.fts_search("\"patience\"", None, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_fts_matches_bengali_text_with_vowel_signs() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[Document {
            doc_id: 1,
            bn_text: Some("সদকা সম্পদ কমায় না".to_string()),
            ..Document::default()
        }])
        .unwrap();
        db.rebuild_fts().unwrap();

        assert_eq!(db.fts_search("\"সম্পদ\"", None, 10).unwrap(), vec![1]);
        assert_eq!(db.fts_search("\"সদকা\"", None, 10).unwrap(), vec![1]);
        // vowel signs are part of the token, not separators
        assert!(db.fts_search("\"সদক\"", None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_terms_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let entries = vec![
            TermEntry::new("prayer", LangTag::En, 4),
            TermEntry::new("صلاة", LangTag::Ar, 3),
        ];
        assert_eq!(db.replace_search_terms(&entries).unwrap(), 2);
        let loaded = db.load_search_terms().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].language, LangTag::Ar);
        assert_eq!(loaded[1].phonetic_code.as_deref(), Some("pr"));

        db.replace_search_terms(&entries[..1]).unwrap();
        assert_eq!(db.load_search_terms().unwrap().len(), 1);
    }

    #[test]
    fn test_embeddings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.insert_documents(&[doc(1, "a", ""), doc(2, "b", "")]).unwrap();
        let vectors = vec![(2, vec![0.5, -0.25]), (1, vec![1.0, 0.0])];
        db.replace_embeddings(&vectors).unwrap();

        let loaded = db.load_embeddings().unwrap();
        assert_eq!(loaded, vec![(1, vec![1.0, 0.0]), (2, vec![0.5, -0.25])]);

        let with_books = db.load_book_embeddings().unwrap();
        assert_eq!(
            with_books,
            vec![(1, Some(1), vec![1.0, 0.0]), (2, Some(1), vec![0.5, -0.25])]
        );
    }

    #[test]
    fn test_readonly_open_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Database::open_readonly(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_readonly_reads_existing_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corpus.db");
        {
            let db = Database::open(&path).unwrap();
            db.replace_search_terms(&[TermEntry::new("mercy", LangTag::En, 2)])
                .unwrap();
        }
        let ro = Database::open_readonly(&path).unwrap();
        assert_eq!(ro.schema_version(), migrations::SCHEMA_VERSION);
        assert_eq!(ro.load_search_terms().unwrap().len(), 1);
    }

    #[test]
    fn test_document_texts_skip_blank() {
        let d = Document {
            doc_id: 1,
            en_text: Some("mercy".into()),
            bn_text: Some("  ".into()),
            ..Document::default()
        };
        let langs: Vec<LangTag> = d.texts().map(|(lang, _)| lang).collect();
        assert_eq!(langs, vec![LangTag::En]);
        assert_eq!(d.embedding_text(), "mercy");
    }
}
