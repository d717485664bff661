// Answer generation
// LLM tiers behind timeout guards, ending in a deterministic extractive answer

pub mod context;
pub mod extractive;
pub mod ollama;
pub mod openai;


use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{OllamaClient, OpenAiClient};
use crate::query::{Intent, QueryContext};

pub use context::ContextBuilder;
pub use extractive::ExtractiveGenerator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Budget for the passage context handed to generators
    pub max_context_chars: usize,
    /// Extractive answers longer than this are cut with `...`
    pub max_answer_chars: usize,
}

impl Default for GenerationConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_context_chars: 4000,
            max_answer_chars: 500,
        }
    }
}

/// Everything a generator needs to answer one query
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub query: String,
    pub context: String,
    pub intent: Intent,
    pub keywords: Vec<String>,
}

impl GenerationRequest {
    #[inline]
    pub fn new(query_context: &QueryContext, context: String) -> Self {
        Self {
            query: query_context.query.clone(),
            context,
            intent: query_context.intent,
            keywords: query_context.keywords.clone(),
        }
    }

    /// Prompt sent to LLM tiers
    #[inline]
    pub fn prompt(&self) -> String {
        format!(
            "Answer the question using only the document excerpts below.\n\
             {}\n\
             If the excerpts do not contain the answer, say that the documents do not cover it.\n\n\
             Context:\n{}\n\n\
             Question: {}\n\n\
             Answer:",
            intent_instruction(self.intent),
            self.context,
            self.query
        )
    }
}

fn intent_instruction(intent: Intent) -> &'static str {
    match intent {
        Intent::Factual => "Give a direct, factual answer.",
        Intent::Comparison => "Compare the items point by point and note their differences.",
        Intent::Procedural => "Describe the steps in order.",
        Intent::Analytical => "Analyze the information and explain what it implies.",
        Intent::Numerical => "Include the exact figures and units from the excerpts.",
        Intent::Visual => "Describe what the charts, tables or images show.",
        Intent::Temporal => "State the relevant dates and the order of events.",
        Intent::Location => "State the relevant places.",
        Intent::Causal => "Explain the causes and their effects.",
        Intent::List => "Answer with a list.",
        Intent::InformationRequest => "Summarize the relevant information.",
    }
}

/// A source of answer text
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Provider name recorded on the answer
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Answer text together with the tier that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub provider: String,
}

/// Wraps an LLM tier with a timeout. Errors, timeouts and blank output are
/// logged and reported as `None`.
pub struct GuardedGenerator {
    inner: Arc<dyn AnswerGenerator>,
    timeout: Duration,
}

impl GuardedGenerator {
    #[inline]
    pub fn new(inner: Arc<dyn AnswerGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    #[inline]
    pub async fn try_generate(&self, request: &GenerationRequest) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => {
                warn!(
                    "Generator {} returned an empty answer, degrading",
                    self.name()
                );
                None
            }
            Ok(Err(e)) => {
                warn!("Generator {} failed, degrading: {:#}", self.name(), e);
                None
            }
            Err(_) => {
                warn!(
                    "Generator {} timed out after {:?}, degrading",
                    self.name(),
                    self.timeout
                );
                None
            }
        }
    }
}

/// Tries each LLM tier in order and falls back to [`ExtractiveGenerator`]
pub struct GeneratorChain {
    providers: Vec<GuardedGenerator>,
    fallback: ExtractiveGenerator,
}

impl GeneratorChain {
    #[inline]
    pub fn new(
        providers: Vec<Arc<dyn AnswerGenerator>>,
        timeout: Duration,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| GuardedGenerator::new(provider, timeout))
                .collect(),
            fallback: ExtractiveGenerator::new(config.max_answer_chars),
        }
    }

    /// Extractive answers only
    #[inline]
    pub fn offline(config: &GenerationConfig) -> Self {
        Self::new(Vec::new(), Duration::from_secs(1), config)
    }

    /// Ollama first, then the OpenAI-compatible service, as enabled in `config`
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers: Vec<Arc<dyn AnswerGenerator>> = Vec::new();

        if config.ollama.enabled {
            providers.push(Arc::new(OllamaGenerator::new(OllamaClient::new(config)?)));
        }
        if config.openai.enabled {
            providers.push(Arc::new(OpenAiGenerator::new(OpenAiClient::new(config)?)));
        }

        debug!(
            "Generator chain configured with {} LLM tiers",
            providers.len()
        );

        Ok(Self::new(
            providers,
            Duration::from_secs(config.providers.timeout_seconds),
            &config.generation,
        ))
    }

    #[inline]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .chain(std::iter::once(self.fallback.name().to_string()))
            .collect()
    }

    /// Answer with the first tier that succeeds. Never fails.
    #[inline]
    pub async fn generate(&self, request: &GenerationRequest) -> GeneratedAnswer {
        for provider in &self.providers {
            if let Some(text) = provider.try_generate(request).await {
                info!("Answer generated by {}", provider.name());
                return GeneratedAnswer {
                    text,
                    provider: provider.name().to_string(),
                };
            }
        }

        debug!("All LLM tiers unavailable, using extractive answer");
        GeneratedAnswer {
            text: self.fallback.answer(request),
            provider: self.fallback.name().to_string(),
        }
    }
}
