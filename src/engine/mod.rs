// Query engine
// Wires index, retrieval, reranking, generation and evidence metrics together

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::EmbedderChain;
use crate::generation::extractive::insufficient_information;
use crate::generation::{ContextBuilder, GenerationRequest, GeneratorChain};
use crate::index::{DocumentRecord, IndexStats, PassageInput, ScoredPassage, VectorIndex};
use crate::metrics::EvidenceMetrics;
use crate::query::{Intent, QueryContext};
use crate::retrieval::reranker::Reranker;
use crate::retrieval::{RetrievalConfig, Retriever};
use crate::{RagError, Result};

/// Per-query overrides of the configured retrieval settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryOptions {
    pub min_similarity: Option<f32>,
    pub top_k: Option<usize>,
}

impl QueryOptions {
    fn resolve(self, defaults: &RetrievalConfig) -> (f32, usize) {
        let min_similarity = self
            .min_similarity
            .filter(|value| value.is_finite())
            .unwrap_or(defaults.min_similarity);
        let top_k = self.top_k.unwrap_or(defaults.top_k).max(1);
        (min_similarity, top_k)
    }
}

/// A passage cited by an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcePassage {
    pub passage_id: String,
    pub document_id: String,
    pub content: String,
    pub similarity: f32,
    pub relevance: f32,
    #[serde(rename = "type")]
    pub passage_type: String,
    pub metadata: Map<String, Value>,
}

impl From<&ScoredPassage> for SourcePassage {
    #[inline]
    fn from(scored: &ScoredPassage) -> Self {
        Self {
            passage_id: scored.passage.id.clone(),
            document_id: scored.passage.document_id.clone(),
            content: scored.passage.content.clone(),
            similarity: scored.similarity,
            relevance: scored.relevance.unwrap_or(scored.similarity),
            passage_type: scored.passage.passage_type.clone(),
            metadata: scored.passage.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query_id: Uuid,
    pub answer: String,
    /// Generation tier that produced `answer`
    pub answer_provider: String,
    pub sources: Vec<SourcePassage>,
    /// Mean reranked relevance of `sources`, clamped to [0, 1]
    pub relevance_score: f32,
    pub intent: Intent,
    pub metrics: EvidenceMetrics,
    pub query_context: QueryContext,
}

pub struct RagEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<EmbedderChain>,
    retriever: Retriever,
    reranker: Reranker,
    generator: GeneratorChain,
    context_builder: ContextBuilder,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    /// Build an engine with the providers enabled in `config`
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let embedder = EmbedderChain::from_config(config)?;
        let generator = GeneratorChain::from_config(config)?;
        Ok(Self::with_chains(config, embedder, generator))
    }

    /// Build an engine around explicit provider chains
    #[inline]
    pub fn with_chains(config: &Config, embedder: EmbedderChain, generator: GeneratorChain) -> Self {
        let index = Arc::new(VectorIndex::new());
        let embedder = Arc::new(embedder);

        Self {
            retriever: Retriever::new(Arc::clone(&index), Arc::clone(&embedder), &config.retrieval),
            reranker: Reranker::new(config.rerank.clone()),
            context_builder: ContextBuilder::new(config.generation.max_context_chars),
            retrieval: config.retrieval.clone(),
            index,
            embedder,
            generator,
        }
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Add one document's ordered passages to the index
    #[inline]
    pub async fn ingest(
        &self,
        document_id: &str,
        passages: Vec<PassageInput>,
    ) -> Result<DocumentRecord> {
        self.index
            .insert(document_id, passages, &self.embedder)
            .await
    }

    /// Answer `text` from the indexed passages, optionally restricted to a set
    /// of documents. Only an empty query is an error.
    #[inline]
    pub async fn query(
        &self,
        text: &str,
        document_filter: Option<&HashSet<String>>,
        options: QueryOptions,
    ) -> Result<QueryResponse> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidQuery(
                "query cannot be empty".to_string(),
            ));
        }

        let query_id = Uuid::new_v4();
        let (min_similarity, top_k) = options.resolve(&self.retrieval);
        let query_context = QueryContext::analyze(text);
        info!(
            "Query {} started: intent={}, top_k={}, min_similarity={}",
            query_id, query_context.intent, top_k, min_similarity
        );

        let candidates = self
            .retriever
            .retrieve(&query_context.query, document_filter, min_similarity, top_k)
            .await;
        let ranked = self
            .reranker
            .rerank(&query_context.keyword_set(), candidates, top_k);

        if ranked.is_empty() {
            info!("Query {} found no passages above the threshold", query_id);
            return Ok(Self::no_evidence_response(query_id, query_context));
        }

        let context = self.context_builder.build(&ranked);
        let request = GenerationRequest::new(&query_context, context);
        let answer = self.generator.generate(&request).await;

        let sources: Vec<SourcePassage> = ranked.iter().map(SourcePassage::from).collect();
        let relevance_score = mean_relevance(&sources);
        let source_texts: Vec<&str> = sources.iter().map(|s| s.content.as_str()).collect();
        let metrics = EvidenceMetrics::evaluate(&query_context.query, &answer.text, &source_texts);

        info!(
            "Query {} answered by {} from {} sources (relevance {:.3}, overall {:.3})",
            query_id,
            answer.provider,
            sources.len(),
            relevance_score,
            metrics.overall_score
        );

        Ok(QueryResponse {
            query_id,
            answer: answer.text,
            answer_provider: answer.provider,
            sources,
            relevance_score,
            intent: query_context.intent,
            metrics,
            query_context,
        })
    }

    /// Snapshot of the index size and embedding provider usage
    #[inline]
    pub async fn stats(&self) -> IndexStats {
        let (total_passages, total_documents) = self.index.counts().await;
        IndexStats::new(
            total_passages,
            total_documents,
            self.embedder.usage_counts(),
        )
    }

    fn no_evidence_response(query_id: Uuid, query_context: QueryContext) -> QueryResponse {
        let answer = insufficient_information(&query_context.query);
        debug!("Query {} returns the no-evidence answer", query_id);

        QueryResponse {
            query_id,
            answer,
            answer_provider: "extractive".to_string(),
            sources: Vec::new(),
            relevance_score: 0.0,
            intent: query_context.intent,
            metrics: EvidenceMetrics::no_evidence(),
            query_context,
        }
    }
}

fn mean_relevance(sources: &[SourcePassage]) -> f32 {
    if sources.is_empty() {
        return 0.0;
    }
    let total: f32 = sources.iter().map(|s| s.relevance).sum();
    let mean = total / sources.len() as f32;
    if mean.is_finite() {
        mean.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
