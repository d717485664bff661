use super::*;
use anyhow::anyhow;

struct FixedEmbedder {
    name: &'static str,
    vector: Vec<f32>,
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    fn name(&self) -> &str {
        self.name
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

struct FailingEmbedder;

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("service unavailable"))
    }
}

struct StalledEmbedder;

#[async_trait]
impl TextEmbedder for StalledEmbedder {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![1.0])
    }
}

#[test]
fn embedding_validation() {
    assert!(is_valid_embedding(&[0.1, 0.2]));
    assert!(!is_valid_embedding(&[]));
    assert!(!is_valid_embedding(&[0.0, 0.0]));
    assert!(!is_valid_embedding(&[0.1, f32::NAN]));
    assert!(!is_valid_embedding(&[f32::INFINITY]));
}

#[tokio::test]
async fn offline_chain_uses_hash_fallback() {
    let chain = EmbedderChain::offline();
    let embedding = chain.embed("hello world").await;

    assert_eq!(embedding.provider, "hash");
    assert_eq!(embedding.vector, HashEmbedder::new().embed_text("hello world"));
    assert_eq!(chain.usage_counts().get("hash"), Some(&1));
}

#[tokio::test]
async fn first_successful_provider_wins() {
    let chain = EmbedderChain::new(
        vec![
            Arc::new(FailingEmbedder),
            Arc::new(FixedEmbedder {
                name: "secondary",
                vector: vec![0.5, 0.5],
            }),
        ],
        Duration::from_secs(1),
    );

    let embedding = chain.embed("anything").await;
    assert_eq!(embedding.provider, "secondary");
    assert_eq!(embedding.vector, vec![0.5, 0.5]);

    let usage = chain.usage_counts();
    assert_eq!(usage.get("failing"), Some(&0));
    assert_eq!(usage.get("secondary"), Some(&1));
    assert_eq!(usage.get("hash"), Some(&0));
}

#[tokio::test]
async fn malformed_vectors_fall_through() {
    let chain = EmbedderChain::new(
        vec![
            Arc::new(FixedEmbedder {
                name: "empty",
                vector: Vec::new(),
            }),
            Arc::new(FixedEmbedder {
                name: "nan",
                vector: vec![f32::NAN, 1.0],
            }),
        ],
        Duration::from_secs(1),
    );

    let embedding = chain.embed("text").await;
    assert_eq!(embedding.provider, "hash");
    assert_eq!(embedding.vector.len(), HASH_EMBEDDING_DIMENSION);
}

#[tokio::test]
async fn stalled_provider_is_bounded_by_timeout() {
    let chain = EmbedderChain::new(vec![Arc::new(StalledEmbedder)], Duration::from_millis(50));

    let embedding = chain.embed("text").await;
    assert_eq!(embedding.provider, "hash");
}

#[test]
fn provider_names_end_with_fallback() {
    let chain = EmbedderChain::new(vec![Arc::new(FailingEmbedder)], Duration::from_secs(1));
    assert_eq!(chain.provider_names(), vec!["failing", "hash"]);
}

#[test]
fn offline_config_builds_empty_chain() {
    let chain = EmbedderChain::from_config(&Config::offline()).expect("chain should build");
    assert_eq!(chain.provider_names(), vec!["hash"]);
}

#[test]
fn default_config_puts_ollama_first() {
    let mut config = Config::default();
    config.openai.enabled = true;
    let chain = EmbedderChain::from_config(&config).expect("chain should build");
    assert_eq!(chain.provider_names(), vec!["ollama", "openai", "hash"]);
}
