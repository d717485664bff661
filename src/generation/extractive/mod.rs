// Extractive answers
// Picks the context segment with the best keyword overlap; needs no network

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use fancy_regex::Regex;
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::{AnswerGenerator, GenerationRequest};
use crate::query::Intent;
use crate::text::{overlap_ratio, split_segments, truncate_chars, word_set};

static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<![\w.])[$€£]?\d+(?:[.,]\d+)*%?(?![\w])").expect("valid regex")
});

/// Message returned when there is no context to answer from
#[inline]
pub fn insufficient_information(query: &str) -> String {
    format!(
        "I don't have enough information in the provided documents to answer: \"{}\"",
        query
    )
}

/// Numeric tokens in order of first appearance
#[inline]
pub fn numeric_tokens(text: &str) -> Vec<String> {
    NUMBER_REGEX
        .find_iter(text)
        .filter_map(|m| m.ok())
        .map(|m| m.as_str().trim_end_matches([',', '.']).to_string())
        .unique()
        .collect()
}

#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_answer_chars: usize,
}

impl ExtractiveGenerator {
    #[inline]
    pub fn new(max_answer_chars: usize) -> Self {
        Self { max_answer_chars }
    }

    #[inline]
    pub fn name(&self) -> &str {
        "extractive"
    }

    /// Deterministic answer built from the best-matching context segment
    #[inline]
    pub fn answer(&self, request: &GenerationRequest) -> String {
        let Some(segment) = best_segment(&request.context, &request.keywords) else {
            return insufficient_information(&request.query);
        };

        let excerpt = truncate_chars(&segment, self.max_answer_chars);
        let mut answer = format!("{} {}", intent_prefix(request.intent), excerpt);

        if request.intent == Intent::Numerical {
            let figures = numeric_tokens(&segment);
            if !figures.is_empty() {
                answer.push_str("\n\nKey figures: ");
                answer.push_str(&figures.join(", "));
            }
        }

        answer
    }
}

/// First segment with the highest keyword overlap
fn best_segment(context: &str, keywords: &[String]) -> Option<String> {
    let keywords: HashSet<String> = keywords.iter().cloned().collect();
    let mut best: Option<(f32, String)> = None;

    for segment in split_segments(context) {
        let score = overlap_ratio(&keywords, &word_set(&segment));
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, segment));
        }
    }

    if let Some((score, segment)) = &best {
        debug!(
            "Extractive answer uses segment with overlap {:.2}: {}",
            score,
            truncate_chars(segment, 60)
        );
    }
    best.map(|(_, segment)| segment)
}

fn intent_prefix(intent: Intent) -> &'static str {
    match intent {
        Intent::Factual => "Based on the document content:",
        Intent::Comparison => "Comparing the information in the documents:",
        Intent::Procedural => "According to the documents, the process is:",
        Intent::Analytical => "Analysis of the document content suggests:",
        Intent::Numerical => "The documents report:",
        Intent::Visual => "The visual content in the documents shows:",
        Intent::Temporal => "Regarding timing, the documents state:",
        Intent::Location => "Regarding location, the documents state:",
        Intent::Causal => "The documents explain:",
        Intent::List => "The documents list:",
        Intent::InformationRequest => "Here is what the documents say:",
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    #[inline]
    fn name(&self) -> &str {
        "extractive"
    }

    #[inline]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(self.answer(request))
    }
}
