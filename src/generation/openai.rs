// OpenAI-compatible chat completions tier

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use super::{AnswerGenerator, GenerationRequest};
use crate::embeddings::OpenAiClient;
use crate::embeddings::openai::ChatMessage;

const SYSTEM_PROMPT: &str =
    "You answer questions strictly from the document excerpts provided by the user.";

/// Tries the preferred model, then the fallback model
pub struct OpenAiGenerator {
    client: OpenAiClient,
}

impl OpenAiGenerator {
    #[inline]
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn complete_with_fallback(client: &OpenAiClient, prompt: &str) -> Result<String> {
    let messages = [
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        },
        ChatMessage {
            role: "user",
            content: prompt,
        },
    ];

    match client.chat_completion(client.generation_model(), &messages) {
        Ok(answer) => Ok(answer),
        Err(e) => {
            warn!(
                "Model {} failed, trying {}: {:#}",
                client.generation_model(),
                client.fallback_generation_model(),
                e
            );
            client.chat_completion(client.fallback_generation_model(), &messages)
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    #[inline]
    fn name(&self) -> &str {
        "openai"
    }

    #[inline]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let client = self.client.clone();
        let prompt = request.prompt();
        tokio::task::spawn_blocking(move || complete_with_fallback(&client, &prompt))
            .await
            .context("OpenAI generation task failed")?
    }
}
