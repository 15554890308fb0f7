//! Storage layer for hs
//!
//! A single SQLite corpus database holds documents, their FTS5 index, the
//! derived term dictionary and document embeddings.

pub mod migrations;
pub mod sqlite;

pub use sqlite::{Database, Document};
