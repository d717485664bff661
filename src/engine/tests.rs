use super::*;
use crate::embeddings::TextEmbedder;
use crate::generation::{AnswerGenerator, GenerationConfig};
use crate::index::SEMANTIC_CHUNK_KEY;
use async_trait::async_trait;
use std::time::Duration;

struct AxisEmbedder;

#[async_trait]
impl TextEmbedder for AxisEmbedder {
    fn name(&self) -> &str {
        "axis"
    }

    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

struct CannedGenerator;

#[async_trait]
impl AnswerGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        Ok(format!("Canned answer for {}", request.query))
    }
}

fn offline_engine() -> RagEngine {
    RagEngine::new(&Config::offline()).expect("offline engine should build")
}

fn axis_engine() -> RagEngine {
    let config = Config::offline();
    RagEngine::with_chains(
        &config,
        EmbedderChain::new(vec![Arc::new(AxisEmbedder)], Duration::from_secs(1)),
        GeneratorChain::offline(&config.generation),
    )
}

fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[tokio::test]
async fn revenue_question_is_answered_from_the_passage() {
    let engine = offline_engine();
    engine
        .ingest(
            "report",
            vec![PassageInput::new(
                "The quarterly revenue was 42 million dollars.",
            )],
        )
        .await
        .expect("ingest should succeed");

    let response = engine
        .query("What was the revenue?", None, QueryOptions::default())
        .await
        .expect("query should succeed");

    assert_eq!(response.intent, Intent::Factual);
    assert!(!response.sources.is_empty());
    assert!(response.answer.contains("42"));
    assert_eq!(response.answer_provider, "extractive");
    assert!((0.0..=1.0).contains(&response.metrics.answer_relevancy));
    assert!(response.metrics.is_well_formed());
    assert!(response.relevance_score > 0.0);
}

#[tokio::test]
async fn empty_index_returns_explanatory_answer() {
    let engine = offline_engine();

    let response = engine
        .query("What was the revenue?", None, QueryOptions::default())
        .await
        .expect("query should succeed");

    assert!(response.sources.is_empty());
    assert!(response.relevance_score.abs() < f32::EPSILON);
    assert!(response.answer.contains("What was the revenue?"));
    assert_eq!(response.metrics, EvidenceMetrics::no_evidence());
    assert!(response.metrics.overall_score.abs() < f32::EPSILON);
}

#[tokio::test]
async fn threshold_above_maximum_yields_empty_response() {
    let engine = offline_engine();
    engine
        .ingest("doc", vec![PassageInput::new("Revenue was 42.")])
        .await
        .expect("ingest should succeed");

    let response = engine
        .query(
            "revenue",
            None,
            QueryOptions {
                min_similarity: Some(1.5),
                top_k: None,
            },
        )
        .await
        .expect("query should succeed");

    assert!(response.sources.is_empty());
    assert!(response.relevance_score.abs() < f32::EPSILON);
    assert!(!response.answer.is_empty());
}

#[tokio::test]
async fn blank_queries_are_rejected() {
    let engine = offline_engine();

    for query in ["", "   ", "\n\t"] {
        let result = engine.query(query, None, QueryOptions::default()).await;
        assert!(matches!(result, Err(RagError::InvalidQuery(_))));
    }
}

#[tokio::test]
async fn document_filter_restricts_sources() {
    let engine = axis_engine();
    for id in ["alpha", "beta"] {
        engine
            .ingest(
                id,
                vec![
                    PassageInput::new(format!("{id} revenue")).with_embedding(vec![1.0, 0.0]),
                    PassageInput::new(format!("{id} profit")).with_embedding(vec![1.0, 0.1]),
                ],
            )
            .await
            .expect("ingest should succeed");
    }

    let filter = ids(&["beta"]);
    let response = engine
        .query("revenue", Some(&filter), QueryOptions::default())
        .await
        .expect("query should succeed");

    assert_eq!(response.sources.len(), 2);
    assert!(response.sources.iter().all(|s| s.document_id == "beta"));
}

#[tokio::test]
async fn rerank_prefers_long_semantic_chunk_over_keyword_dense_passage() {
    let engine = axis_engine();
    let dense = "Revenue, profit and growth.";
    let long = format!("Revenue and margin {}", "details ".repeat(62));
    assert!(long.chars().count() >= 500);

    engine
        .ingest(
            "doc",
            vec![
                PassageInput::new(dense).with_embedding(vec![1.0, 0.0]),
                PassageInput::new(long.clone())
                    .with_embedding(vec![1.0, 0.0])
                    .with_metadata(SEMANTIC_CHUNK_KEY, true),
            ],
        )
        .await
        .expect("ingest should succeed");

    let response = engine
        .query("revenue profit growth margin", None, QueryOptions::default())
        .await
        .expect("query should succeed");

    // dense: 0.4 * 3/4 + 0.4 * 1 + 0.1 * 27/500
    let dense_score = 0.4 * 0.75 + 0.4 + 0.1 * (27.0 / 500.0);
    // long: 0.4 * 2/4 + 0.4 * 1 + 0.1 * 1 + 0.1
    let long_score = 0.4 * 0.5 + 0.4 + 0.1 + 0.1;

    assert_eq!(response.sources.len(), 2);
    assert_eq!(response.sources[0].content, long);
    assert_eq!(response.sources[1].content, dense);
    assert!((response.sources[0].relevance - long_score).abs() < 1e-5);
    assert!((response.sources[1].relevance - dense_score).abs() < 1e-5);
    assert!((response.relevance_score - (long_score + dense_score) / 2.0).abs() < 1e-5);
}

#[tokio::test]
async fn top_k_limits_sources() {
    let engine = axis_engine();
    let passages = (0..10)
        .map(|i| PassageInput::new(format!("revenue line {i}")).with_embedding(vec![1.0, 0.0]))
        .collect();
    engine
        .ingest("doc", passages)
        .await
        .expect("ingest should succeed");

    let response = engine
        .query(
            "revenue",
            None,
            QueryOptions {
                min_similarity: None,
                top_k: Some(3),
            },
        )
        .await
        .expect("query should succeed");
    assert_eq!(response.sources.len(), 3);

    let clamped = engine
        .query(
            "revenue",
            None,
            QueryOptions {
                min_similarity: Some(f32::NAN),
                top_k: Some(0),
            },
        )
        .await
        .expect("query should succeed");
    assert_eq!(clamped.sources.len(), 1);
}

#[tokio::test]
async fn llm_tier_answers_when_available() {
    let config = Config::offline();
    let engine = RagEngine::with_chains(
        &config,
        EmbedderChain::offline(),
        GeneratorChain::new(
            vec![Arc::new(CannedGenerator)],
            Duration::from_secs(1),
            &GenerationConfig::default(),
        ),
    );
    engine
        .ingest("doc", vec![PassageInput::new("Revenue was 42 million.")])
        .await
        .expect("ingest should succeed");

    let response = engine
        .query("revenue", None, QueryOptions::default())
        .await
        .expect("query should succeed");

    assert_eq!(response.answer_provider, "canned");
    assert_eq!(response.answer, "Canned answer for revenue");
}

#[tokio::test]
async fn stats_report_counts_and_provider_usage() {
    let engine = axis_engine();
    engine
        .ingest(
            "a",
            vec![PassageInput::new("one"), PassageInput::new("two")],
        )
        .await
        .expect("ingest should succeed");
    engine
        .ingest(
            "b",
            vec![PassageInput::new("three").with_embedding(vec![0.0, 1.0])],
        )
        .await
        .expect("ingest should succeed");
    engine
        .query("anything", None, QueryOptions::default())
        .await
        .expect("query should succeed");

    let stats = engine.stats().await;
    assert_eq!(stats.total_passages, 3);
    assert_eq!(stats.total_documents, 2);
    assert!((stats.average_passages_per_document - 1.5).abs() < f64::EPSILON);
    // two passage embeddings plus one query embedding
    assert_eq!(stats.embedding_provider_usage.get("axis"), Some(&3));
    assert_eq!(stats.embedding_provider_usage.get("hash"), Some(&0));
}

#[tokio::test]
async fn duplicate_ingest_is_rejected() {
    let engine = offline_engine();
    engine
        .ingest("doc", vec![PassageInput::new("text")])
        .await
        .expect("ingest should succeed");

    let result = engine.ingest("doc", vec![PassageInput::new("text")]).await;
    assert!(matches!(result, Err(RagError::DuplicateDocument(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_never_see_partial_documents() {
    let engine = Arc::new(axis_engine());

    let writers: Vec<_> = (0..6)
        .map(|n| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let passages = (0..3)
                    .map(|i| {
                        PassageInput::new(format!("doc {n} revenue {i}"))
                            .with_embedding(vec![1.0, 0.0])
                    })
                    .collect();
                engine.ingest(&format!("doc-{n}"), passages).await
            })
        })
        .collect();

    let readers: Vec<_> = (0..24)
        .map(|q| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let filter: HashSet<String> = [format!("doc-{}", q % 6)].into_iter().collect();
                let response = engine
                    .query(
                        "revenue",
                        Some(&filter),
                        QueryOptions {
                            min_similarity: None,
                            top_k: Some(10),
                        },
                    )
                    .await
                    .expect("query should succeed");
                response.sources.len()
            })
        })
        .collect();

    for writer in futures::future::join_all(writers).await {
        writer
            .expect("task should not panic")
            .expect("ingest should succeed");
    }
    for reader in futures::future::join_all(readers).await {
        let visible = reader.expect("task should not panic");
        assert!(visible == 0 || visible == 3, "saw {visible} passages");
    }

    assert_eq!(engine.stats().await.total_passages, 18);
}

#[test]
fn options_fall_back_to_configured_defaults() {
    let defaults = RetrievalConfig::default();

    assert_eq!(QueryOptions::default().resolve(&defaults), (0.1, 5));
    assert_eq!(
        QueryOptions {
            min_similarity: Some(0.4),
            top_k: Some(2),
        }
        .resolve(&defaults),
        (0.4, 2)
    );
}

#[tokio::test]
async fn response_serializes_for_callers() {
    let engine = offline_engine();
    engine
        .ingest("doc", vec![PassageInput::new("Revenue was 42.").with_type("pdf")])
        .await
        .expect("ingest should succeed");

    let response = engine
        .query("revenue", None, QueryOptions::default())
        .await
        .expect("query should succeed");
    let json = serde_json::to_value(&response).expect("serializable");

    assert_eq!(json["intent"], "information_request");
    assert_eq!(json["sources"][0]["type"], "pdf");
    assert_eq!(json["sources"][0]["document_id"], "doc");
    assert!(json["metrics"]["overall_score"].is_number());
}
