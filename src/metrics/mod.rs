// Evidence metrics
// Reference-free lexical proxies for answer grounding and retrieval quality


use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

use crate::text::word_set;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvidenceMetrics {
    /// Share of answer tokens found in the sources
    pub faithfulness: f32,
    /// Share of query tokens found in the answer
    pub answer_relevancy: f32,
    /// Share of query tokens found in the sources
    pub context_recall: f32,
    /// Share of sources sharing at least one token with the query
    pub context_precision: f32,
    pub overall_score: f32,
}

impl EvidenceMetrics {
    pub const NEUTRAL_SCORE: f32 = 0.5;

    /// Substitute used when the computed set is unusable
    #[inline]
    pub fn neutral() -> Self {
        Self {
            faithfulness: Self::NEUTRAL_SCORE,
            answer_relevancy: Self::NEUTRAL_SCORE,
            context_recall: Self::NEUTRAL_SCORE,
            context_precision: Self::NEUTRAL_SCORE,
            overall_score: Self::NEUTRAL_SCORE,
        }
    }

    /// Metrics for a response that had no supporting passages
    #[inline]
    pub fn no_evidence() -> Self {
        Self {
            faithfulness: 0.0,
            answer_relevancy: 0.0,
            context_recall: 0.0,
            context_precision: 0.0,
            overall_score: 0.0,
        }
    }

    /// Score an answer against its query and the passages it was built from
    #[inline]
    pub fn evaluate<S: AsRef<str>>(query: &str, answer: &str, sources: &[S]) -> Self {
        let query_tokens = word_set(query);
        let answer_tokens = word_set(answer);
        let source_token_sets: Vec<HashSet<String>> =
            sources.iter().map(|s| word_set(s.as_ref())).collect();
        let source_tokens: HashSet<&String> = source_token_sets.iter().flatten().collect();

        let faithfulness = ratio(
            answer_tokens
                .iter()
                .filter(|t| source_tokens.contains(t))
                .count(),
            answer_tokens.len(),
        );
        let answer_relevancy = ratio(
            query_tokens.intersection(&answer_tokens).count(),
            query_tokens.len(),
        );
        let context_recall = ratio(
            query_tokens
                .iter()
                .filter(|t| source_tokens.contains(t))
                .count(),
            query_tokens.len(),
        );
        let context_precision = ratio(
            source_token_sets
                .iter()
                .filter(|tokens| !tokens.is_disjoint(&query_tokens))
                .count(),
            source_token_sets.len(),
        );

        Self::from_components(
            faithfulness,
            answer_relevancy,
            context_recall,
            context_precision,
        )
    }

    /// Build a metric set from its four components, falling back to
    /// [`EvidenceMetrics::neutral`] when any value is out of range
    #[inline]
    pub fn from_components(
        faithfulness: f32,
        answer_relevancy: f32,
        context_recall: f32,
        context_precision: f32,
    ) -> Self {
        let metrics = Self {
            faithfulness,
            answer_relevancy,
            context_recall,
            context_precision,
            overall_score: (faithfulness + answer_relevancy + context_recall + context_precision)
                / 4.0,
        };

        if metrics.is_well_formed() {
            metrics
        } else {
            warn!(
                "Evidence metrics out of range ({:?}), using neutral scores",
                metrics
            );
            Self::neutral()
        }
    }

    #[inline]
    pub fn is_well_formed(&self) -> bool {
        [
            self.faithfulness,
            self.answer_relevancy,
            self.context_recall,
            self.context_precision,
            self.overall_score,
        ]
        .iter()
        .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}
