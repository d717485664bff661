
use anyhow::Result;
use async_trait::async_trait;

use super::TextEmbedder;
use crate::text::trim_token;

pub const HASH_EMBEDDING_DIMENSION: usize = 384;

const TOKEN_WEIGHT: f32 = 1.0;
const CHAR_WEIGHT: f32 = 0.1;

/// Offline bag-of-tokens embedding. Pure: the same text always produces the
/// same unit-length vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HashEmbedder {
    #[inline]
    pub fn new() -> Self {
        Self {
            dimension: HASH_EMBEDDING_DIMENSION,
        }
    }

    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for raw in text.split_whitespace() {
            let token = trim_token(raw).to_lowercase();
            if token.is_empty() {
                continue;
            }

            vector[token_hash(&token) % self.dimension] += TOKEN_WEIGHT;

            for (position, c) in token.chars().enumerate() {
                vector[(c as usize + position) % self.dimension] += CHAR_WEIGHT;
            }
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude == 0.0 {
            vector[0] = 1.0;
            return vector;
        }

        for value in &mut vector {
            *value /= magnitude;
        }
        vector
    }
}

/// `hash = hash * 31 + charcode`, wrapping
fn token_hash(token: &str) -> usize {
    token
        .chars()
        .fold(0_u32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as u32)) as usize
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    #[inline]
    fn name(&self) -> &str {
        "hash"
    }

    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
