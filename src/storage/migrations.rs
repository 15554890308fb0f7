//! Schema migrations for the corpus database.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;

/// Latest schema version.
pub const SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        r#"CREATE TABLE IF NOT EXISTS documents (
             doc_id INTEGER PRIMARY KEY,
             book_id INTEGER,
             en_text TEXT,
             ar_text TEXT,
             bn_text TEXT,
             ur_text TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_documents_book ON documents(book_id);

         CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
             en_text,
             ar_text,
             bn_text,
             ur_text,
             content='documents',
             content_rowid='doc_id',
             tokenize="unicode61 remove_diacritics 2 categories 'L* N* Co M*'"
         );

         CREATE TABLE IF NOT EXISTS search_terms (
             term TEXT NOT NULL,
             language TEXT NOT NULL CHECK (language IN ('ar', 'bn', 'en', 'ur')),
             frequency INTEGER NOT NULL CHECK (frequency >= 1),
             phonetic_code TEXT,
             PRIMARY KEY (language, term)
         );
         CREATE INDEX IF NOT EXISTS idx_search_terms_phonetic
             ON search_terms(phonetic_code);"#,
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS document_embeddings (
             doc_id INTEGER PRIMARY KEY REFERENCES documents(doc_id) ON DELETE CASCADE,
             dims INTEGER NOT NULL,
             embedding BLOB NOT NULL
         );",
    ),
];

/// Apply pending migrations and return the resulting schema version.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         );",
    )?;

    let mut current = current_version(conn)?.unwrap_or(0);
    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(version, "applied migration");
        current = *version;
    }
    Ok(current)
}

/// Highest applied version, or `None` for a database never migrated.
pub fn current_version(conn: &Connection) -> Result<Option<u32>> {
    let has_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version)
}
