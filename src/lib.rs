//! hs - multilingual hadith search core
//!
//! Query expansion for English, Arabic and Bengali queries (script detection,
//! phonetic codes, fuzzy matching against the corpus vocabulary) and
//! reciprocal rank fusion of lexical and semantic rankings.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod search;
pub mod storage;
pub mod test_utils;

pub use error::{HsError, Result};
