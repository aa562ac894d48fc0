// Configuration management for the tutor.
// Settings come from an optional TOML file plus the GOOGLE_API_KEY
// environment variable; everything has built-in defaults.


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Environment variable holding the Gemini API key. Absence is a fatal
/// startup error.
pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";

/// Name of the persisted vector collection. Must match between ingestion
/// and query time or retrieval yields nothing.
pub const COLLECTION_NAME: &str = "streamlit_documents";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

/// Which site to crawl and how far to follow links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    pub root_url: String,
    pub max_depth: usize,
    /// High-value pages fetched unconditionally after the recursive crawl.
    pub important_urls: Vec<String>,
    pub request_delay_ms: u64,
    pub user_agent: String,
}

impl Default for SiteConfig {
    #[inline]
    fn default() -> Self {
        Self {
            root_url: "https://docs.streamlit.io/".to_string(),
            max_depth: 6,
            important_urls: vec![
                "https://docs.streamlit.io/develop/concepts/multipage-apps/overview".to_string(),
                "https://docs.streamlit.io/get-started/fundamentals/main-concepts".to_string(),
                "https://docs.streamlit.io/library/api-reference".to_string(),
                "https://docs.streamlit.io/deploy".to_string(),
            ],
            request_delay_ms: 500,
            user_agent: "docs-tutor/0.1.0 (Documentation Assistant)".to_string(),
        }
    }
}

/// Character-based chunking parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Pages with extracted text at or below this length are discarded.
    pub min_document_length: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_document_length: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks retrieved per question.
    pub top_k: usize,
    /// Number of prior conversation turns forwarded to the model.
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 8,
            history_window: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub embed_batch_size: usize,
}

impl Default for GeminiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            chat_model: "gemini-1.5-flash".to_string(),
            embedding_model: "embedding-001".to_string(),
            temperature: 0.2,
            timeout_seconds: 30,
            embed_batch_size: 64,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{API_KEY_ENV_VAR} not found in environment")]
    MissingApiKey,
    #[error("Invalid root URL: {0}")]
    InvalidRootUrl(String),
    #[error("Invalid crawl depth: {0} (must be between 1 and 10)")]
    InvalidMaxDepth(usize),
    #[error("Invalid chunk size: {0} (must be between 100 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid history window: {0} (must be between 1 and 50)")]
    InvalidHistoryWindow(usize),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid embed batch size: {0} (must be between 1 and 100)")]
    InvalidEmbedBatchSize(usize),
    #[error("Model name cannot be empty")]
    EmptyModelName,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from `config.toml` in the data directory if it
    /// exists, otherwise use defaults. The data directory also hosts the
    /// persisted vector collection.
    #[inline]
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join("config.toml");
        Self::load_from(data_dir.as_ref(), &config_path)
    }

    /// Load configuration from an explicit TOML file path. The file may be
    /// absent, in which case defaults apply.
    #[inline]
    pub fn load_from(data_dir: &Path, config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.data_dir = data_dir.to_path_buf();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Read the Gemini API key from the environment. Missing or blank keys
    /// are fatal.
    #[inline]
    pub fn api_key() -> Result<String, ConfigError> {
        match env::var(API_KEY_ENV_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }

    /// Directory holding the persisted vector collection.
    #[inline]
    pub fn collection_dir(&self) -> PathBuf {
        self.data_dir.join("vector_db")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.site.validate()?;
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.gemini.validate()?;
        Ok(())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            gemini: GeminiConfig::default(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl SiteConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_root_url()?;
        for raw in &self.important_urls {
            Url::parse(raw).map_err(|_| ConfigError::InvalidRootUrl(raw.clone()))?;
        }
        if self.max_depth == 0 || self.max_depth > 10 {
            return Err(ConfigError::InvalidMaxDepth(self.max_depth));
        }
        Ok(())
    }

    pub fn parsed_root_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.root_url)
            .map_err(|_| ConfigError::InvalidRootUrl(self.root_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidRootUrl(self.root_url.clone()));
        }
        Ok(url)
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=8192).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        if self.history_window == 0 || self.history_window > 50 {
            return Err(ConfigError::InvalidHistoryWindow(self.history_window));
        }
        Ok(())
    }
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;
        if self.chat_model.trim().is_empty() || self.embedding_model.trim().is_empty() {
            return Err(ConfigError::EmptyModelName);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.embed_batch_size == 0 || self.embed_batch_size > 100 {
            return Err(ConfigError::InvalidEmbedBatchSize(self.embed_batch_size));
        }
        Ok(())
    }
}
