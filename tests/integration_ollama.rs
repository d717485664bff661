#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use evidence_rag::config::Config;
use evidence_rag::embeddings::OllamaClient;
use evidence_rag::engine::{QueryOptions, RagEngine};
use evidence_rag::http::HttpClient;
use evidence_rag::index::PassageInput;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn local_ollama_config() -> Config {
    let mut config = Config::default();
    config.ollama.host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    config.ollama.port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    if let Ok(model) = env::var("OLLAMA_EMBEDDING_MODEL") {
        config.ollama.embedding_model = model;
    }
    if let Ok(model) = env::var("OLLAMA_GENERATION_MODEL") {
        config.ollama.generation_model = model;
    }
    config.providers.timeout_seconds = 120;
    config
}

fn create_integration_test_client() -> OllamaClient {
    let config = local_ollama_config();
    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_http_client(
            HttpClient::new(&config.providers)
                .with_timeout(Duration::from_secs(60))
                .with_retry_attempts(3),
        )
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let client = create_integration_test_client();

    info!("Testing health check against real Ollama instance");
    let result = client.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let client = create_integration_test_client();
    let models = client.list_models().expect("model listing should succeed");

    assert!(
        !models.is_empty(),
        "Should have at least one model available"
    );
    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_embedding() {
    init_test_tracing();

    let client = create_integration_test_client();
    let embedding = client
        .generate_embedding("The quarterly revenue was 42 million dollars.")
        .expect("embedding should succeed");

    info!("Generated embedding with {} dimensions", embedding.len());
    assert!(
        embedding.len() >= 100,
        "Embedding should have a reasonable number of dimensions"
    );
    assert!(embedding.iter().all(|v| v.is_finite()));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_answers_from_context() {
    init_test_tracing();

    let mut config = local_ollama_config();
    config.openai.enabled = false;
    let engine = RagEngine::new(&config).expect("engine should build");
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

    info!(
        "Answer from {}: {}",
        response.answer_provider, response.answer
    );
    assert_eq!(response.answer_provider, "ollama");
    assert!(response.answer.contains("42"));
    assert_eq!(
        engine.stats().await.embedding_provider_usage.get("ollama"),
        Some(&2)
    );
}
