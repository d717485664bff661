// In-memory vector index
// Append-only passage arena with a document registry, scanned linearly on search

pub mod similarity;


use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::embeddings::{EmbedderChain, is_valid_embedding};
use crate::{RagError, Result};

pub use similarity::cosine_similarity;

/// Passages embedded concurrently while ingesting one document
const EMBED_CONCURRENCY: usize = 4;

pub const SEMANTIC_CHUNK_KEY: &str = "semantic_chunk";
pub const HAS_TABLE_KEY: &str = "has_table";
pub const HAS_IMAGE_KEY: &str = "has_image";

/// A passage as handed over by the ingestion collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageInput {
    pub content: String,
    #[serde(rename = "type", default = "default_passage_type")]
    pub passage_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_passage_type() -> String {
    "text".to_string()
}

impl PassageInput {
    #[inline]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            passage_type: default_passage_type(),
            metadata: Map::new(),
            embedding: None,
        }
    }

    #[inline]
    pub fn with_type(mut self, passage_type: impl Into<String>) -> Self {
        self.passage_type = passage_type.into();
        self
    }

    #[inline]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// An indexed passage. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    /// `{document_id}#{ordinal}`
    pub id: String,
    pub document_id: String,
    pub ordinal: usize,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Provider that produced the embedding, or `"supplied"`
    pub embedding_provider: String,
    #[serde(rename = "type")]
    pub passage_type: String,
    pub metadata: Map<String, Value>,
}

impl Passage {
    #[inline]
    pub fn passage_id(document_id: &str, ordinal: usize) -> String {
        format!("{}#{}", document_id, ordinal)
    }

    /// Whether a metadata flag is set to a truthy value
    #[inline]
    pub fn has_flag(&self, key: &str) -> bool {
        match self.metadata.get(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    #[inline]
    pub fn is_semantic_chunk(&self) -> bool {
        self.has_flag(SEMANTIC_CHUNK_KEY)
    }

    #[inline]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub passage_count: usize,
    pub has_tables: bool,
    pub has_images: bool,
    pub ingested_at: DateTime<Utc>,
}

/// A passage with its retrieval similarity and, once reranked, its composite relevance
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,
    pub similarity: f32,
    pub relevance: Option<f32>,
}

/// Index size and embedding provenance, for health reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_passages: usize,
    pub total_documents: usize,
    pub average_passages_per_document: f64,
    pub embedding_provider_usage: BTreeMap<String, u64>,
}

impl IndexStats {
    #[inline]
    pub fn new(
        total_passages: usize,
        total_documents: usize,
        embedding_provider_usage: BTreeMap<String, u64>,
    ) -> Self {
        let average_passages_per_document = if total_documents == 0 {
            0.0
        } else {
            total_passages as f64 / total_documents as f64
        };

        Self {
            total_passages,
            total_documents,
            average_passages_per_document,
            embedding_provider_usage,
        }
    }
}

#[derive(Debug, Clone)]
struct DocumentEntry {
    record: DocumentRecord,
    slots: Vec<usize>,
}

#[derive(Debug, Default)]
struct IndexState {
    passages: Vec<Arc<Passage>>,
    by_id: HashMap<String, usize>,
    documents: HashMap<String, DocumentEntry>,
}

/// Shared passage store. Reads run concurrently; each document is inserted
/// under a single write lock so searches never see it half-ingested.
#[derive(Debug, Default)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
}

impl VectorIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed any passages lacking a usable vector, then register the document
    /// and all of its passages atomically.
    #[inline]
    pub async fn insert(
        &self,
        document_id: &str,
        inputs: Vec<PassageInput>,
        embedder: &EmbedderChain,
    ) -> Result<DocumentRecord> {
        if document_id.trim().is_empty() {
            return Err(RagError::InvalidDocument(
                "document id cannot be empty".to_string(),
            ));
        }
        if inputs.is_empty() {
            return Err(RagError::InvalidDocument(format!(
                "document {} has no passages",
                document_id
            )));
        }
        if self.contains_document(document_id).await {
            return Err(RagError::DuplicateDocument(document_id.to_string()));
        }

        debug!(
            "Embedding {} passages for document {}",
            inputs.len(),
            document_id
        );

        let passages: Vec<Passage> = futures::stream::iter(inputs.into_iter().enumerate())
            .map(|(ordinal, input)| build_passage(document_id, ordinal, input, embedder))
            .buffered(EMBED_CONCURRENCY)
            .collect()
            .await;

        let record = DocumentRecord {
            id: document_id.to_string(),
            passage_count: passages.len(),
            has_tables: passages.iter().any(|p| p.has_flag(HAS_TABLE_KEY)),
            has_images: passages
                .iter()
                .any(|p| p.has_flag(HAS_IMAGE_KEY) || p.passage_type == "image"),
            ingested_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        if state.documents.contains_key(document_id) {
            return Err(RagError::DuplicateDocument(document_id.to_string()));
        }

        let mut slots = Vec::with_capacity(passages.len());
        for passage in passages {
            let slot = state.passages.len();
            state.by_id.insert(passage.id.clone(), slot);
            state.passages.push(Arc::new(passage));
            slots.push(slot);
        }
        state.documents.insert(
            document_id.to_string(),
            DocumentEntry {
                record: record.clone(),
                slots,
            },
        );
        drop(state);

        info!(
            "Indexed document {} with {} passages",
            document_id, record.passage_count
        );
        Ok(record)
    }

    /// Linear similarity scan.
    ///
    /// Passages below `min_similarity` are dropped; the rest are sorted by
    /// descending similarity (ties keep insertion order) and cut to `top_k`.
    #[inline]
    pub async fn search(
        &self,
        query_embedding: &[f32],
        document_filter: Option<&HashSet<String>>,
        min_similarity: f32,
        top_k: usize,
    ) -> Vec<ScoredPassage> {
        let mut results: Vec<ScoredPassage> = {
            let state = self.state.read().await;
            state
                .passages
                .iter()
                .filter(|p| document_filter.is_none_or(|ids| ids.contains(&p.document_id)))
                .filter_map(|passage| {
                    let similarity = cosine_similarity(query_embedding, &passage.embedding);
                    (similarity >= min_similarity).then(|| ScoredPassage {
                        passage: Arc::clone(passage),
                        similarity,
                        relevance: None,
                    })
                })
                .collect()
        };

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(top_k);

        debug!(
            "Vector search returned {} passages (min_similarity: {}, top_k: {})",
            results.len(),
            min_similarity,
            top_k
        );
        results
    }

    #[inline]
    pub async fn contains_document(&self, document_id: &str) -> bool {
        self.state.read().await.documents.contains_key(document_id)
    }

    #[inline]
    pub async fn document(&self, document_id: &str) -> Option<DocumentRecord> {
        self.state
            .read()
            .await
            .documents
            .get(document_id)
            .map(|entry| entry.record.clone())
    }

    #[inline]
    pub async fn passage(&self, passage_id: &str) -> Option<Arc<Passage>> {
        let state = self.state.read().await;
        state
            .by_id
            .get(passage_id)
            .and_then(|slot| state.passages.get(*slot))
            .cloned()
    }

    /// Passages of one document in ingestion order
    #[inline]
    pub async fn document_passages(&self, document_id: &str) -> Vec<Arc<Passage>> {
        let state = self.state.read().await;
        state
            .documents
            .get(document_id)
            .map(|entry| {
                entry
                    .slots
                    .iter()
                    .filter_map(|slot| state.passages.get(*slot).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.state.read().await.passages.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.passages.is_empty()
    }

    #[inline]
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// `(passage count, document count)` from a single consistent snapshot
    #[inline]
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.passages.len(), state.documents.len())
    }
}

async fn build_passage(
    document_id: &str,
    ordinal: usize,
    input: PassageInput,
    embedder: &EmbedderChain,
) -> Passage {
    let (embedding, embedding_provider) = match input.embedding {
        Some(vector) if is_valid_embedding(&vector) => (vector, "supplied".to_string()),
        supplied => {
            if supplied.is_some() {
                warn!(
                    "Passage {} of document {} has a malformed embedding, recomputing",
                    ordinal, document_id
                );
            }
            let embedding = embedder.embed(&input.content).await;
            (embedding.vector, embedding.provider)
        }
    };

    Passage {
        id: Passage::passage_id(document_id, ordinal),
        document_id: document_id.to_string(),
        ordinal,
        content: input.content,
        embedding,
        embedding_provider,
        passage_type: input.passage_type,
        metadata: input.metadata,
    }
}
