//! Error types for hs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HsError>;

#[derive(Debug, Error)]
pub enum HsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("missing config: {0}")]
    MissingConfig(String),

    /// The term dictionary could not be loaded. Expansion degrades to the
    /// original terms when this is returned from a load.
    #[error("term dictionary unavailable: {0}")]
    DictionaryUnavailable(String),

    /// A caller passed parameters outside the operation's contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ranking source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout { source_name: String, timeout_ms: u64 },

    #[error("ranking source failed: {0}")]
    Source(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl HsError {
    /// Stable machine-readable code used in robot output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Database(_) => "database",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::MissingConfig(_) => "missing_config",
            Self::DictionaryUnavailable(_) => "dictionary_unavailable",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SourceTimeout { .. } => "source_timeout",
            Self::Source(_) => "source_error",
            Self::NotFound(_) => "not_found",
        }
    }
}
