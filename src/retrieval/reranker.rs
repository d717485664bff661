// Composite reranking of retrieval candidates

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::index::{Passage, ScoredPassage};
use crate::text::{overlap_ratio, word_set};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankConfig {
    pub word_overlap_weight: f32,
    pub similarity_weight: f32,
    pub length_weight: f32,
    /// Flat bonus for passages flagged `semantic_chunk`
    pub semantic_chunk_bonus: f32,
    /// Passages at least this long get the full length score
    pub ideal_length_chars: usize,
}

impl Default for RerankConfig {
    #[inline]
    fn default() -> Self {
        Self {
            word_overlap_weight: 0.4,
            similarity_weight: 0.4,
            length_weight: 0.1,
            semantic_chunk_bonus: 0.1,
            ideal_length_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reranker {
    config: RerankConfig,
}

impl Reranker {
    #[inline]
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    /// Composite relevance of one passage for a query's keyword set
    #[inline]
    pub fn score(&self, keywords: &HashSet<String>, passage: &Passage, similarity: f32) -> f32 {
        let overlap = overlap_ratio(keywords, &word_set(&passage.content));
        let ideal = self.config.ideal_length_chars.max(1) as f32;
        let length = (passage.char_len() as f32 / ideal).min(1.0);
        let bonus = if passage.is_semantic_chunk() {
            self.config.semantic_chunk_bonus
        } else {
            0.0
        };

        self.config.word_overlap_weight * overlap
            + self.config.similarity_weight * similarity
            + self.config.length_weight * length
            + bonus
    }

    /// Score every candidate, stable-sort by descending relevance and keep `top_k`.
    /// Candidates with equal scores keep their retrieval order.
    #[inline]
    pub fn rerank(
        &self,
        keywords: &HashSet<String>,
        candidates: Vec<ScoredPassage>,
        top_k: usize,
    ) -> Vec<ScoredPassage> {
        let candidate_count = candidates.len();
        let mut reranked: Vec<ScoredPassage> = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.relevance =
                    Some(self.score(keywords, &candidate.passage, candidate.similarity));
                candidate
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.relevance
                .unwrap_or_default()
                .total_cmp(&a.relevance.unwrap_or_default())
        });
        reranked.truncate(top_k);

        debug!(
            "Reranked {} candidates down to {}",
            candidate_count,
            reranked.len()
        );
        reranked
    }
}
