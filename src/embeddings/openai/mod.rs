
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::TextEmbedder;
use crate::config::Config;
use crate::http::HttpClient;

/// Client for services exposing the OpenAI-compatible REST API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    fallback_generation_model: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage<'a>],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .openai
            .api_url()
            .context("Failed to parse OpenAI-compatible base URL")?;

        Ok(Self {
            base_url,
            embedding_model: config.openai.embedding_model.clone(),
            generation_model: config.openai.generation_model.clone(),
            fallback_generation_model: config.openai.fallback_generation_model.clone(),
            http: HttpClient::new(&config.providers)
                .with_bearer_token(config.openai.api_key.clone()),
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }

    #[inline]
    pub fn fallback_generation_model(&self) -> &str {
        &self.fallback_generation_model
    }

    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = self
            .base_url
            .join("v1/embeddings")
            .context("Failed to build embeddings URL")?;

        let request = EmbeddingsRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response: EmbeddingsResponse = self
            .http
            .post_json(&url, &request)
            .context("Failed to generate embedding")?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    /// Single chat completion against `model`
    #[inline]
    pub fn chat_completion(&self, model: &str, messages: &[ChatMessage<'_>]) -> Result<String> {
        debug!("Requesting chat completion from {}", model);

        let url = self
            .base_url
            .join("v1/chat/completions")
            .context("Failed to build chat completions URL")?;

        let request = ChatRequest {
            model,
            messages,
            temperature: 0.2,
        };

        let response: ChatResponse = self
            .http
            .post_json(&url, &request)
            .with_context(|| format!("Chat completion with {} failed", model))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion from {} returned no content", model))
    }
}

#[async_trait]
impl TextEmbedder for OpenAiClient {
    #[inline]
    fn name(&self) -> &str {
        "openai"
    }

    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .context("OpenAI embedding task failed")?
    }
}
