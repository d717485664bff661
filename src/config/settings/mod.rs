
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::generation::GenerationConfig;
use crate::retrieval::RetrievalConfig;
use crate::retrieval::reranker::RerankConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Primary embedding and generation provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub enabled: bool,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.2:latest".to_string(),
        }
    }
}

/// Secondary provider speaking the OpenAI-compatible REST API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub generation_model: String,
    pub fallback_generation_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            fallback_generation_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

/// Limits applied to every external provider call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid provider timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid minimum similarity: {0} (must be between -1.0 and 1.0)")]
    InvalidMinSimilarity(f32),
    #[error("Invalid top-k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid candidate multiplier: {0} (must be between 1 and 20)")]
    InvalidCandidateMultiplier(usize),
    #[error("Invalid rerank weight for {0}: {1} (must be between 0.0 and 1.0)")]
    InvalidRerankWeight(&'static str, f32),
    #[error("Invalid ideal passage length: {0} (must be between 1 and 10000 characters)")]
    InvalidIdealLength(usize),
    #[error("Invalid context budget: {0} (must be between 100 and 100000 characters)")]
    InvalidContextBudget(usize),
    #[error("Invalid answer budget: {0} (must be between 50 and 10000 characters)")]
    InvalidAnswerBudget(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Default configuration directory, `~/.evidence-rag`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".evidence-rag"))
            .or_else(|| dirs::config_dir().map(|config| config.join("evidence-rag")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Configuration with every external provider switched off
    #[inline]
    pub fn offline() -> Self {
        let mut config = Self::default();
        config.ollama.enabled = false;
        config.openai.enabled = false;
        config
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.openai.validate()?;
        self.validate_provider_config()?;
        self.validate_retrieval_config()?;
        self.validate_rerank_config()?;
        self.validate_generation_config()?;
        Ok(())
    }

    fn validate_provider_config(&self) -> Result<(), ConfigError> {
        let config = &self.providers;

        if !(1..=600).contains(&config.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(config.timeout_seconds));
        }

        if !(1..=10).contains(&config.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(config.retry_attempts));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if !(-1.0..=1.0).contains(&config.min_similarity) {
            return Err(ConfigError::InvalidMinSimilarity(config.min_similarity));
        }

        if !(1..=100).contains(&config.top_k) {
            return Err(ConfigError::InvalidTopK(config.top_k));
        }

        if !(1..=20).contains(&config.candidate_multiplier) {
            return Err(ConfigError::InvalidCandidateMultiplier(
                config.candidate_multiplier,
            ));
        }

        Ok(())
    }

    fn validate_rerank_config(&self) -> Result<(), ConfigError> {
        let config = &self.rerank;

        let weights = [
            ("word_overlap_weight", config.word_overlap_weight),
            ("similarity_weight", config.similarity_weight),
            ("length_weight", config.length_weight),
            ("semantic_chunk_bonus", config.semantic_chunk_bonus),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::InvalidRerankWeight(name, weight));
            }
        }

        if !(1..=10_000).contains(&config.ideal_length_chars) {
            return Err(ConfigError::InvalidIdealLength(config.ideal_length_chars));
        }

        Ok(())
    }

    fn validate_generation_config(&self) -> Result<(), ConfigError> {
        let config = &self.generation;

        if !(100..=100_000).contains(&config.max_context_chars) {
            return Err(ConfigError::InvalidContextBudget(config.max_context_chars));
        }

        if !(50..=10_000).contains(&config.max_answer_chars) {
            return Err(ConfigError::InvalidAnswerBudget(config.max_answer_chars));
        }

        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl OpenAiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        for model in [
            &self.embedding_model,
            &self.generation_model,
            &self.fallback_generation_model,
        ] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidModel(model.clone()));
            }
        }

        Ok(())
    }

    /// Base URL with a trailing slash so endpoint paths join under any prefix
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}
