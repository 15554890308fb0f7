use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HsError, Result};
use crate::search::engine::{SearchMode, SearchSettings};
use crate::search::hybrid::RrfConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub robot: RobotConfig,
}

impl Config {
    /// Defaults, then either the explicit file (`--config` / `HS_CONFIG`) or
    /// the global and project files, then `HS_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, hs_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("HS_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(HsError::MissingConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&hs_root.join("config.toml"))? {
                config.merge_patch(project);
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with a TOML document merged over them.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| HsError::Config(format!("parse config: {err}")))?;
        let mut config = Self::default();
        config.merge_patch(patch);
        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join("hs/config.toml")),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| HsError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| HsError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.expansion {
            self.expansion.merge(patch);
        }
        if let Some(patch) = patch.fusion {
            self.fusion.merge(patch);
        }
        if let Some(patch) = patch.index {
            self.index.merge(patch);
        }
        if let Some(patch) = patch.cache {
            self.cache.merge(patch);
        }
        if let Some(patch) = patch.robot {
            self.robot.merge(patch);
        }
    }

    /// Apply `HS_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let env = Env(&lookup);

        if let Some(value) = env.parse("HS_SEARCH_DEFAULT_LIMIT")? {
            self.search.default_limit = value;
        }
        if let Some(value) = env.parse("HS_SEARCH_MAX_LIMIT")? {
            self.search.max_limit = value;
        }
        if let Some(value) = env.parse("HS_SEARCH_CANDIDATES")? {
            self.search.candidates = value;
        }
        if let Some(value) = env.parse("HS_SEARCH_SOURCE_TIMEOUT_MS")? {
            self.search.source_timeout_ms = value;
        }
        if let Some(value) = env.parse("HS_SEARCH_MODE")? {
            self.search.mode = value;
        }
        if let Some(value) = env.bool("HS_SEARCH_USE_EMBEDDINGS") {
            self.search.use_embeddings = value;
        }
        if let Some(value) = env.parse("HS_SEARCH_EMBEDDING_DIMS")? {
            self.search.embedding_dims = value;
        }

        if let Some(value) = env.bool("HS_EXPANSION_PHONETIC") {
            self.expansion.phonetic = value;
        }
        if let Some(value) = env.parse("HS_EXPANSION_ENGLISH_THRESHOLD")? {
            self.expansion.english_threshold = value;
        }
        if let Some(value) = env.parse("HS_EXPANSION_OTHER_THRESHOLD")? {
            self.expansion.other_threshold = value;
        }
        if let Some(value) = env.parse("HS_EXPANSION_MAX_FUZZY_MATCHES")? {
            self.expansion.max_fuzzy_matches = value;
        }

        if let Some(value) = env.parse("HS_FUSION_K")? {
            self.fusion.k = value;
        }
        if let Some(value) = env.parse("HS_FUSION_LEXICAL_WEIGHT")? {
            self.fusion.lexical_weight = value;
        }
        if let Some(value) = env.parse("HS_FUSION_SEMANTIC_WEIGHT")? {
            self.fusion.semantic_weight = value;
        }

        if let Some(value) = env.parse("HS_INDEX_MIN_FREQUENCY")? {
            self.index.min_frequency = value;
        }
        if let Some(value) = env.parse("HS_INDEX_MIN_TERM_CHARS")? {
            self.index.min_term_chars = value;
        }

        if let Some(value) = env.bool("HS_CACHE_ENABLED") {
            self.cache.enabled = value;
        }
        if env.bool("HS_CACHE_DISABLED").unwrap_or(false) {
            self.cache.enabled = false;
        }
        if let Some(value) = env.parse("HS_CACHE_EXPANSION_SIZE")? {
            self.cache.expansion_cache_size = value;
        }

        if let Some(value) = env.bool("HS_ROBOT_PRETTY") {
            self.robot.pretty = value;
        }
        if let Some(value) = env.bool("HS_ROBOT_INCLUDE_METADATA") {
            self.robot.include_metadata = value;
        }

        Ok(())
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(HsError::Config(msg));

        for (name, value) in [
            ("expansion.english_threshold", self.expansion.english_threshold),
            ("expansion.other_threshold", self.expansion.other_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return invalid(format!("{name} must be within 0..=100, got {value}"));
            }
        }
        self.fusion
            .to_rrf()
            .validate()
            .map_err(|err| HsError::Config(format!("fusion: {err}")))?;

        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return invalid(format!(
                "search.default_limit must be within 1..={}, got {}",
                self.search.max_limit, self.search.default_limit
            ));
        }
        if self.search.candidates == 0 {
            return invalid("search.candidates must be > 0".to_string());
        }
        if self.search.source_timeout_ms == 0 {
            return invalid("search.source_timeout_ms must be > 0".to_string());
        }
        if self.search.embedding_dims == 0 {
            return invalid("search.embedding_dims must be > 0".to_string());
        }
        if self.index.min_frequency == 0 || self.index.min_term_chars == 0 {
            return invalid("index.min_frequency and index.min_term_chars must be > 0".to_string());
        }
        if self.cache.enabled && self.cache.expansion_cache_size == 0 {
            return invalid("cache.expansion_cache_size must be > 0 when enabled".to_string());
        }
        Ok(())
    }

    /// Engine settings derived from `[search]` and `[fusion]`.
    #[must_use]
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            rrf: self.fusion.to_rrf(),
            mode: self.search.mode,
            candidates: self.search.candidates,
            source_timeout: Duration::from_millis(self.search.source_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Ids requested from each ranking source before fusion.
    pub candidates: usize,
    pub source_timeout_ms: u64,
    pub mode: SearchMode,
    pub use_embeddings: bool,
    pub embedding_dims: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            candidates: 50,
            source_timeout_ms: 2_000,
            mode: SearchMode::Hybrid,
            use_embeddings: true,
            embedding_dims: 384,
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.default_limit {
            self.default_limit = value;
        }
        if let Some(value) = patch.max_limit {
            self.max_limit = value;
        }
        if let Some(value) = patch.candidates {
            self.candidates = value;
        }
        if let Some(value) = patch.source_timeout_ms {
            self.source_timeout_ms = value;
        }
        if let Some(value) = patch.mode {
            self.mode = value;
        }
        if let Some(value) = patch.use_embeddings {
            self.use_embeddings = value;
        }
        if let Some(value) = patch.embedding_dims {
            self.embedding_dims = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Add phonetic matches for English tokens.
    pub phonetic: bool,
    /// Minimum fuzzy similarity (0-100) for English tokens.
    pub english_threshold: f64,
    /// Minimum fuzzy similarity for Arabic- and Bengali-script tokens.
    pub other_threshold: f64,
    pub max_fuzzy_matches: usize,
    pub min_token_chars: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            phonetic: true,
            english_threshold: 75.0,
            other_threshold: 70.0,
            max_fuzzy_matches: 5,
            min_token_chars: 2,
        }
    }
}

impl ExpansionConfig {
    fn merge(&mut self, patch: ExpansionPatch) {
        if let Some(value) = patch.phonetic {
            self.phonetic = value;
        }
        if let Some(value) = patch.english_threshold {
            self.english_threshold = value;
        }
        if let Some(value) = patch.other_threshold {
            self.other_threshold = value;
        }
        if let Some(value) = patch.max_fuzzy_matches {
            self.max_fuzzy_matches = value;
        }
        if let Some(value) = patch.min_token_chars {
            self.min_token_chars = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub k: u32,
    pub lexical_weight: f64,
    pub semantic_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let rrf = RrfConfig::default();
        Self {
            k: rrf.k,
            lexical_weight: rrf.lexical_weight,
            semantic_weight: rrf.semantic_weight,
        }
    }
}

impl FusionConfig {
    #[must_use]
    pub const fn to_rrf(&self) -> RrfConfig {
        RrfConfig {
            k: self.k,
            lexical_weight: self.lexical_weight,
            semantic_weight: self.semantic_weight,
        }
    }

    fn merge(&mut self, patch: FusionPatch) {
        if let Some(value) = patch.k {
            self.k = value;
        }
        if let Some(value) = patch.lexical_weight {
            self.lexical_weight = value;
        }
        if let Some(value) = patch.semantic_weight {
            self.semantic_weight = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Words seen fewer times across the corpus are left out of the dictionary.
    pub min_frequency: u32,
    pub min_term_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_frequency: 2,
            min_term_chars: 3,
        }
    }
}

impl IndexConfig {
    fn merge(&mut self, patch: IndexPatch) {
        if let Some(value) = patch.min_frequency {
            self.min_frequency = value;
        }
        if let Some(value) = patch.min_term_chars {
            self.min_term_chars = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub expansion_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expansion_cache_size: crate::search::cache::DEFAULT_EXPANSION_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    fn merge(&mut self, patch: CachePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.expansion_cache_size {
            self.expansion_cache_size = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub pretty: bool,
    /// Include `timestamp` and `version` in robot envelopes.
    pub include_metadata: bool,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            include_metadata: true,
        }
    }
}

impl RobotConfig {
    fn merge(&mut self, patch: RobotPatch) {
        if let Some(value) = patch.pretty {
            self.pretty = value;
        }
        if let Some(value) = patch.include_metadata {
            self.include_metadata = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    pub search: Option<SearchPatch>,
    pub expansion: Option<ExpansionPatch>,
    pub fusion: Option<FusionPatch>,
    pub index: Option<IndexPatch>,
    pub cache: Option<CachePatch>,
    pub robot: Option<RobotPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchPatch {
    pub default_limit: Option<usize>,
    pub max_limit: Option<usize>,
    pub candidates: Option<usize>,
    pub source_timeout_ms: Option<u64>,
    pub mode: Option<SearchMode>,
    pub use_embeddings: Option<bool>,
    pub embedding_dims: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpansionPatch {
    pub phonetic: Option<bool>,
    pub english_threshold: Option<f64>,
    pub other_threshold: Option<f64>,
    pub max_fuzzy_matches: Option<usize>,
    pub min_token_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FusionPatch {
    pub k: Option<u32>,
    pub lexical_weight: Option<f64>,
    pub semantic_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexPatch {
    pub min_frequency: Option<u32>,
    pub min_term_chars: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CachePatch {
    pub enabled: Option<bool>,
    pub expansion_cache_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RobotPatch {
    pub pretty: Option<bool>,
    pub include_metadata: Option<bool>,
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn bool(&self, key: &str) -> Option<bool> {
        (self.0)(key).map(|value| {
            matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|err| {
                HsError::Config(format!("invalid {key} value {value}: {err}"))
            }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.fusion.k, 60);
        assert!((config.expansion.english_threshold - 75.0).abs() < f64::EPSILON);
        assert!((config.expansion.other_threshold - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.index.min_frequency, 2);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            "[fusion]\nk = 10\n\n[search]\nmode = \"lexical\"\n",
        )
        .unwrap();
        assert_eq!(config.fusion.k, 10);
        assert!((config.fusion.lexical_weight - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.search.mode, SearchMode::Lexical);
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(matches!(
            Config::from_toml_str("[ranking]\nk = 60\n"),
            Err(HsError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(overrides(&[
                ("HS_FUSION_K", "30"),
                ("HS_FUSION_SEMANTIC_WEIGHT", "0.5"),
                ("HS_EXPANSION_PHONETIC", "off"),
                ("HS_SEARCH_MODE", "semantic"),
                ("HS_CACHE_DISABLED", "1"),
            ]))
            .unwrap();
        assert_eq!(config.fusion.k, 30);
        assert!((config.fusion.semantic_weight - 0.5).abs() < f64::EPSILON);
        assert!(!config.expansion.phonetic);
        assert_eq!(config.search.mode, SearchMode::Semantic);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(overrides(&[("HS_FUSION_K", "sixty")]))
            .unwrap_err();
        assert_eq!(err.code(), "config");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.fusion.lexical_weight = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fusion.k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.expansion.other_threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.default_limit = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_search_settings_follow_config() {
        let mut config = Config::default();
        config.search.source_timeout_ms = 250;
        config.fusion.k = 5;
        let settings = config.search_settings();
        assert_eq!(settings.source_timeout, Duration::from_millis(250));
        assert_eq!(settings.rrf.k, 5);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")), dir.path());
        assert!(matches!(result, Err(HsError::MissingConfig(_))));
    }

    #[test]
    fn test_project_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[index]\nmin_frequency = 5\n").unwrap();
        let config = Config::load(Some(&path), dir.path()).unwrap();
        assert_eq!(config.index.min_frequency, 5);
    }
}
