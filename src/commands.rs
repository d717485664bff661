use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::engine::{QueryOptions, QueryResponse, RagEngine};
use crate::index::PassageInput;

/// One document's ordered passages, as produced by the ingestion collaborator
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentHandoff {
    pub document_id: String,
    pub passages: Vec<PassageInput>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HandoffFile {
    Single(DocumentHandoff),
    Batch(Vec<DocumentHandoff>),
}

/// Parse a hand-off JSON file holding one document or an array of documents
#[inline]
pub fn load_handoff(path: &Path) -> Result<Vec<DocumentHandoff>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read passages file: {}", path.display()))?;
    let parsed: HandoffFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse passages file: {}", path.display()))?;

    Ok(match parsed {
        HandoffFile::Single(document) => vec![document],
        HandoffFile::Batch(documents) => documents,
    })
}

/// Ingest every document found in `paths`, returning the number of documents indexed
#[inline]
pub async fn ingest_files(engine: &RagEngine, paths: &[PathBuf]) -> Result<usize> {
    let mut documents = Vec::new();
    for path in paths {
        documents.extend(load_handoff(path)?);
    }

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut ingested = 0;
    for document in documents {
        bar.set_message(document.document_id.clone());
        let record = engine
            .ingest(&document.document_id, document.passages)
            .await
            .with_context(|| format!("Failed to ingest document {}", document.document_id))?;
        info!(
            "Ingested {} ({} passages)",
            record.id, record.passage_count
        );
        ingested += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(ingested)
}

/// Load passages, answer one query and print the result
#[inline]
pub async fn run_query(
    config: &Config,
    query: &str,
    passages: &[PathBuf],
    documents: Vec<String>,
    options: QueryOptions,
    json: bool,
) -> Result<()> {
    let engine = RagEngine::new(config)?;
    ingest_files(&engine, passages).await?;

    let filter: Option<HashSet<String>> = if documents.is_empty() {
        None
    } else {
        Some(documents.into_iter().collect())
    };

    let response = engine.query(query, filter.as_ref(), options).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?
        );
    } else {
        print_response(&response);
    }

    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", style("Answer").bold().cyan());
    println!("{}", response.answer);
    println!();

    println!(
        "Intent: {}   Provider: {}   Relevance: {}",
        style(response.intent).yellow(),
        style(&response.answer_provider).yellow(),
        style(format!("{:.3}", response.relevance_score)).yellow()
    );
    println!();

    if response.sources.is_empty() {
        println!("{}", style("No source passages matched.").dim());
    } else {
        println!("{}", style("Sources").bold().cyan());
        for (rank, source) in response.sources.iter().enumerate() {
            println!(
                "  {}. {} (similarity {:.3}, relevance {:.3})",
                rank + 1,
                style(&source.passage_id).green(),
                source.similarity,
                source.relevance
            );
            println!("     {}", crate::text::truncate_chars(&source.content, 160));
        }
    }
    println!();

    let metrics = &response.metrics;
    println!("{}", style("Evidence").bold().cyan());
    println!("  Faithfulness:      {:.3}", metrics.faithfulness);
    println!("  Answer relevancy:  {:.3}", metrics.answer_relevancy);
    println!("  Context recall:    {:.3}", metrics.context_recall);
    println!("  Context precision: {:.3}", metrics.context_precision);
    println!(
        "  Overall:           {}",
        style(format!("{:.3}", metrics.overall_score)).bold()
    );
}

/// Load passages and print index statistics as JSON
#[inline]
pub async fn show_stats(config: &Config, passages: &[PathBuf]) -> Result<()> {
    let engine = RagEngine::new(config)?;
    ingest_files(&engine, passages).await?;

    let stats = engine.stats().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?
    );
    Ok(())
}

/// Write the configuration file, creating it with defaults when missing
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    let config_path = config.config_file_path();
    let existed = config_path.exists();
    config.save()?;

    if existed {
        eprintln!(
            "{} {}",
            style("✓ Configuration is valid:").green(),
            style(config_path.display()).cyan()
        );
    } else {
        eprintln!(
            "{} {}",
            style("✓ Default configuration written to").green(),
            style(config_path.display()).cyan()
        );
    }
    Ok(())
}

/// Print the effective configuration and probe the enabled providers
#[inline]
pub async fn show_config(config: &Config) -> Result<()> {
    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Ollama Settings:").bold().yellow());
    println!("  Enabled: {}", style(config.ollama.enabled).cyan());
    match config.ollama_url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }
    println!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    println!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    println!();

    println!("{}", style("OpenAI-compatible Settings:").bold().yellow());
    println!("  Enabled: {}", style(config.openai.enabled).cyan());
    println!("  Base URL: {}", style(&config.openai.base_url).cyan());
    println!(
        "  API Key: {}",
        style(if config.openai.api_key.is_some() {
            "set"
        } else {
            "not set"
        })
        .cyan()
    );
    println!(
        "  Generation Models: {} → {}",
        style(&config.openai.generation_model).cyan(),
        style(&config.openai.fallback_generation_model).cyan()
    );
    println!();

    println!("{}", style("Retrieval:").bold().yellow());
    println!(
        "  Min Similarity: {}   Top K: {}   Candidate Multiplier: {}",
        config.retrieval.min_similarity,
        config.retrieval.top_k,
        config.retrieval.candidate_multiplier
    );
    println!(
        "  Rerank Weights: overlap {} / similarity {} / length {} / semantic bonus {}",
        config.rerank.word_overlap_weight,
        config.rerank.similarity_weight,
        config.rerank.length_weight,
        config.rerank.semantic_chunk_bonus
    );
    println!();

    if config.ollama.enabled {
        let client = OllamaClient::new(config)?;
        let health = tokio::task::spawn_blocking(move || client.health_check())
            .await
            .context("Ollama health check task failed")?;
        match health {
            Ok(()) => println!("{}", style("✓ Ollama connection successful!").green()),
            Err(e) => {
                warn!("Ollama health check failed: {:#}", e);
                println!(
                    "{} {}",
                    style("⚠ Ollama unavailable, answers will degrade:").yellow(),
                    e
                );
            }
        }
    }

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    Ok(())
}
