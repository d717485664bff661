// Ollama /api/generate tier

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{AnswerGenerator, GenerationRequest};
use crate::embeddings::OllamaClient;

pub struct OllamaGenerator {
    client: OllamaClient,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    #[inline]
    fn name(&self) -> &str {
        "ollama"
    }

    #[inline]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let client = self.client.clone();
        let prompt = request.prompt();
        tokio::task::spawn_blocking(move || client.generate_completion(&prompt))
            .await
            .context("Ollama generation task failed")?
    }
}
