//! Offline index construction: term dictionary and document embeddings.

pub mod builder;

pub use builder::{IndexReport, build_embeddings, build_terms, extract_words, rebuild};
