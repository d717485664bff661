// Retrieval module
// Embeds the query and pulls an over-fetched candidate set from the index

pub mod reranker;


use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::embeddings::EmbedderChain;
use crate::index::{ScoredPassage, VectorIndex};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates below this cosine similarity are discarded
    pub min_similarity: f32,
    /// Passages returned after reranking
    pub top_k: usize,
    /// Over-fetch factor applied to `top_k` before reranking
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            min_similarity: 0.1,
            top_k: 5,
            candidate_multiplier: 3,
        }
    }
}

pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<EmbedderChain>,
    candidate_multiplier: usize,
}

impl Retriever {
    #[inline]
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<EmbedderChain>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            candidate_multiplier: config.candidate_multiplier.max(1),
        }
    }

    /// Number of candidates fetched for a final result size of `top_k`
    #[inline]
    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_multiplier)
    }

    /// Candidates for `query`, most similar first.
    ///
    /// The raw query text is embedded; the expanded form is never used here.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        document_filter: Option<&HashSet<String>>,
        min_similarity: f32,
        top_k: usize,
    ) -> Vec<ScoredPassage> {
        let embedding = self.embedder.embed(query).await;
        let limit = self.candidate_count(top_k);

        let candidates = self
            .index
            .search(&embedding.vector, document_filter, min_similarity, limit)
            .await;

        debug!(
            "Retrieved {} candidates using {} query embedding",
            candidates.len(),
            embedding.provider
        );
        candidates
    }
}
