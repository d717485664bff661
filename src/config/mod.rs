// Configuration management module
// TOML-backed settings for providers, retrieval, reranking and answer generation

pub mod settings;


pub use settings::{Config, ConfigError, OllamaConfig, OpenAiConfig, ProviderConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
