use clap::{Parser, Subcommand};
use evidence_rag::Result;
use evidence_rag::commands::{run_query, show_config, show_stats, write_config};
use evidence_rag::config::{Config, get_config_dir};
use evidence_rag::engine::QueryOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evidence-rag")]
#[command(about = "Answer questions from ingested document passages with evidence scores")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.evidence-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Skip external providers and use the hash embedding and extractive answers
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest passage files and answer a question
    Query {
        /// The question to answer
        text: String,
        /// Hand-off JSON files with `document_id` and `passages`
        #[arg(long = "passages", required = true, num_args = 1..)]
        passages: Vec<PathBuf>,
        /// Restrict retrieval to these document ids
        #[arg(long = "document")]
        documents: Vec<String>,
        /// Minimum cosine similarity for candidates
        #[arg(long)]
        min_similarity: Option<f32>,
        /// Number of source passages to return
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest passage files and print index statistics
    Stats {
        /// Hand-off JSON files with `document_id` and `passages`
        #[arg(long = "passages", required = true, num_args = 1..)]
        passages: Vec<PathBuf>,
    },
    /// Write the configuration file or show the current settings
    Config {
        /// Show current configuration and provider health
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| evidence_rag::RagError::Config(e.to_string()))?,
    };
    let mut config = Config::load(&config_dir)?;
    if cli.offline {
        config.ollama.enabled = false;
        config.openai.enabled = false;
    }

    match cli.command {
        Commands::Query {
            text,
            passages,
            documents,
            min_similarity,
            top_k,
            json,
        } => {
            let options = QueryOptions {
                min_similarity,
                top_k,
            };
            run_query(&config, &text, &passages, documents, options, json).await?;
        }
        Commands::Stats { passages } => {
            show_stats(&config, &passages).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config).await?;
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}
