use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cli::{Cli, OutputFormat};
use crate::config::{Config, ExpansionConfig};
use crate::error::{HsError, Result};
use crate::search::cache::ExpansionCache;
use crate::search::dictionary::{DictionaryHandle, SqliteTermSource};
use crate::search::embeddings::{Embedder, HashEmbedder};
use crate::search::expand::QueryExpander;
use crate::storage::Database;

const DB_FILE: &str = "hs.db";

pub struct AppContext {
    pub hs_root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub db_path: PathBuf,
    pub db: Arc<Mutex<Database>>,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let hs_root = Self::find_hs_root()?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| default_config_path(&hs_root));
        let config = Config::load(cli.config.as_deref(), &hs_root)?;
        Self::with_config(hs_root, config_path, config, cli.output_format(), cli.verbose)
    }

    /// Context over an explicit root, for embedding callers and tests.
    pub fn with_config(
        hs_root: PathBuf,
        config_path: PathBuf,
        config: Config,
        output_format: OutputFormat,
        verbosity: u8,
    ) -> Result<Self> {
        let db_path = hs_root.join(DB_FILE);
        let db = Database::open(&db_path)?;
        Ok(Self {
            hs_root,
            config_path,
            config,
            db_path,
            db: Arc::new(Mutex::new(db)),
            output_format,
            verbosity,
        })
    }

    #[must_use]
    pub const fn robot_mode(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Expander over the corpus dictionary, with the LRU cache when enabled.
    #[must_use]
    pub fn expander(&self) -> QueryExpander {
        self.expander_with(self.config.expansion.clone())
    }

    #[must_use]
    pub fn expander_with(&self, expansion: ExpansionConfig) -> QueryExpander {
        let handle = DictionaryHandle::new(SqliteTermSource::new(&self.db_path));
        let expander = QueryExpander::new(Arc::new(handle), expansion);
        if self.config.cache.enabled {
            expander.with_cache(ExpansionCache::new(self.config.cache.expansion_cache_size))
        } else {
            expander
        }
    }

    /// Embedder for documents and queries, if embeddings are enabled.
    #[must_use]
    pub fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.config
            .search
            .use_embeddings
            .then(|| Arc::new(HashEmbedder::new(self.config.search.embedding_dims)) as Arc<dyn Embedder>)
    }

    fn find_hs_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("HS_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ".hs") {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| HsError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("hs"))
    }
}

fn default_config_path(hs_root: &Path) -> PathBuf {
    if hs_root.ends_with(".hs") {
        hs_root.join("config.toml")
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| hs_root.to_path_buf())
            .join("hs/config.toml")
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_dir())
}
