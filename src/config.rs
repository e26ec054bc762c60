use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::processing::chunking::ChunkerSettings;
use crate::processing::selection::DEFAULT_LAMBDA;

const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the summarizer service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Embedding provider used to turn chunks into vectors.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the local hashing provider.
    pub embedding_dimension: usize,
    /// Optional base URL for the embedding provider.
    pub embedding_base_url: Option<String>,
    /// Optional bearer key for the embedding provider.
    pub embedding_api_key: Option<String>,
    /// Maximum number of texts sent in a single embedding request.
    pub embedding_batch_size: usize,
    /// Summarization provider that turns selected chunks into prose.
    pub summarization_provider: SummarizationProvider,
    /// Summarization model identifier (required for remote providers).
    pub summarization_model: Option<String>,
    /// Optional base URL for the summarization provider.
    pub summarization_base_url: Option<String>,
    /// Optional bearer key for the summarization provider.
    pub summarization_api_key: Option<String>,
    /// Timeout applied to every outbound HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Relevance/diversity trade-off used by the MMR selector.
    pub mmr_lambda: f32,
    /// Optional Qdrant URL for the side vector index.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic local word-hash embeddings (no network).
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported summarization backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarizationProvider {
    /// Local extractive summary assembled from the selected chunks.
    Extractive,
    /// OpenAI-compatible `/chat/completions` endpoint.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ChunkerSettings::default();

        let embedding_provider = load_env_optional("EMBEDDING_PROVIDER")
            .map(|value| {
                value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
            })
            .transpose()?
            .unwrap_or(EmbeddingProvider::Hashing);
        let embedding_model = match embedding_provider {
            EmbeddingProvider::Hashing => {
                load_env_optional("EMBEDDING_MODEL").unwrap_or_else(|| "word-hash".into())
            }
            EmbeddingProvider::OpenAI | EmbeddingProvider::Ollama => load_env("EMBEDDING_MODEL")?,
        };

        let summarization_provider = load_env_optional("SUMMARIZATION_PROVIDER")
            .map(|value| {
                value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("SUMMARIZATION_PROVIDER".into()))
            })
            .transpose()?
            .unwrap_or(SummarizationProvider::Extractive);
        let summarization_model = load_env_optional("SUMMARIZATION_MODEL");
        if summarization_provider != SummarizationProvider::Extractive
            && summarization_model.is_none()
        {
            return Err(ConfigError::MissingVariable("SUMMARIZATION_MODEL".into()));
        }

        let embedding_batch_size: usize =
            parse_optional("EMBEDDING_BATCH_SIZE")?.unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE);
        if embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        let chunk_size: usize = parse_optional("CHUNK_SIZE")?.unwrap_or(defaults.max_chars);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        let mmr_lambda: f32 = parse_optional("MMR_LAMBDA")?.unwrap_or(DEFAULT_LAMBDA);
        if !mmr_lambda.is_finite() {
            return Err(ConfigError::InvalidValue("MMR_LAMBDA".into()));
        }

        Ok(Self {
            server_port: parse_optional("SERVER_PORT")?,
            embedding_provider,
            embedding_model,
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            embedding_base_url: load_env_optional("EMBEDDING_BASE_URL"),
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_batch_size,
            summarization_provider,
            summarization_model,
            summarization_base_url: load_env_optional("SUMMARIZATION_BASE_URL"),
            summarization_api_key: load_env_optional("SUMMARIZATION_API_KEY"),
            request_timeout_secs: parse_optional("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            chunk_size,
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(defaults.overlap_chars),
            mmr_lambda: mmr_lambda.clamp(0.0, 1.0),
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
        })
    }

    /// Chunker settings derived from the `CHUNK_*` variables.
    pub fn chunker_settings(&self) -> ChunkerSettings {
        ChunkerSettings {
            max_chars: self.chunk_size,
            overlap_chars: self.chunk_overlap,
        }
    }

    /// Timeout applied to outbound provider requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for Config {
    /// Offline configuration: hashing embeddings and extractive summaries.
    fn default() -> Self {
        let chunker = ChunkerSettings::default();
        Self {
            server_port: None,
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_model: "word-hash".into(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            embedding_base_url: None,
            embedding_api_key: None,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            summarization_provider: SummarizationProvider::Extractive,
            summarization_model: None,
            summarization_base_url: None,
            summarization_api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            chunk_size: chunker.max_chars,
            chunk_overlap: chunker.overlap_chars,
            mmr_lambda: DEFAULT_LAMBDA,
            qdrant_url: None,
            qdrant_api_key: None,
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hashing" | "local" => Ok(Self::Hashing),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for SummarizationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extractive" | "none" | "local" => Ok(Self::Extractive),
            "openai" | "sealion" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        summarization_provider = ?config.summarization_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        mmr_lambda = config.mmr_lambda,
        "Loaded configuration"
    );
    let _ = CONFIG.set(config);
}
