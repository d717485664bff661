// Embeddings module
// Ordered provider chain ending in a deterministic offline hash embedding

pub mod hash;
pub mod ollama;
pub mod openai;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

pub use hash::{HASH_EMBEDDING_DIMENSION, HashEmbedder};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// A source of text embeddings
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Provider name used in logs and usage statistics
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// An embedding vector together with the provider that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub provider: String,
}

/// Whether `vector` can be stored in the index and compared
#[inline]
pub fn is_valid_embedding(vector: &[f32]) -> bool {
    !vector.is_empty()
        && vector.iter().all(|v| v.is_finite())
        && vector.iter().any(|v| *v != 0.0)
}

/// Wraps an external provider with a timeout and shape validation.
/// Failures are logged and reported as `None`, never propagated.
pub struct GuardedEmbedder {
    inner: Arc<dyn TextEmbedder>,
    timeout: Duration,
}

impl GuardedEmbedder {
    #[inline]
    pub fn new(inner: Arc<dyn TextEmbedder>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    #[inline]
    pub async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.timeout, self.inner.embed(text)).await {
            Ok(Ok(vector)) if is_valid_embedding(&vector) => Some(vector),
            Ok(Ok(vector)) => {
                warn!(
                    "Embedding provider {} returned a malformed vector ({} values), degrading",
                    self.name(),
                    vector.len()
                );
                None
            }
            Ok(Err(e)) => {
                warn!(
                    "Embedding provider {} failed, degrading: {:#}",
                    self.name(),
                    e
                );
                None
            }
            Err(_) => {
                warn!(
                    "Embedding provider {} timed out after {:?}, degrading",
                    self.name(),
                    self.timeout
                );
                None
            }
        }
    }
}

/// Tries each configured provider in order and falls back to [`HashEmbedder`]
pub struct EmbedderChain {
    providers: Vec<GuardedEmbedder>,
    fallback: HashEmbedder,
    usage: Vec<AtomicU64>,
}

impl EmbedderChain {
    #[inline]
    pub fn new(providers: Vec<Arc<dyn TextEmbedder>>, timeout: Duration) -> Self {
        let providers: Vec<GuardedEmbedder> = providers
            .into_iter()
            .map(|provider| GuardedEmbedder::new(provider, timeout))
            .collect();
        let usage = (0..=providers.len()).map(|_| AtomicU64::new(0)).collect();

        Self {
            providers,
            fallback: HashEmbedder::new(),
            usage,
        }
    }

    /// Chain with no external providers
    #[inline]
    pub fn offline() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    /// Build the provider list from configuration: Ollama first, then the
    /// OpenAI-compatible service
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers: Vec<Arc<dyn TextEmbedder>> = Vec::new();

        if config.ollama.enabled {
            providers.push(Arc::new(OllamaClient::new(config)?));
        }
        if config.openai.enabled {
            providers.push(Arc::new(OpenAiClient::new(config)?));
        }

        debug!(
            "Embedding chain configured with {} external providers",
            providers.len()
        );

        Ok(Self::new(
            providers,
            Duration::from_secs(config.providers.timeout_seconds),
        ))
    }

    /// Embed `text` with the first provider that succeeds. Never fails.
    #[inline]
    pub async fn embed(&self, text: &str) -> Embedding {
        for (slot, provider) in self.providers.iter().enumerate() {
            if let Some(vector) = provider.try_embed(text).await {
                self.record_usage(slot);
                return Embedding {
                    vector,
                    provider: provider.name().to_string(),
                };
            }
        }

        self.record_usage(self.providers.len());
        Embedding {
            vector: self.fallback.embed_text(text),
            provider: self.fallback.name().to_string(),
        }
    }

    #[inline]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .chain(std::iter::once(self.fallback.name().to_string()))
            .collect()
    }

    /// Number of embeddings served by each provider, fallback included
    #[inline]
    pub fn usage_counts(&self) -> BTreeMap<String, u64> {
        self.provider_names()
            .into_iter()
            .zip(self.usage.iter())
            .map(|(name, count)| (name, count.load(Ordering::Relaxed)))
            .collect()
    }

    fn record_usage(&self, slot: usize) {
        if let Some(counter) = self.usage.get(slot) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
