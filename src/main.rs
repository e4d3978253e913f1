use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ollama_rag::config::{Config, DEFAULT_CONFIG_PATH};
use ollama_rag::embedder::download::download_model_files;
use ollama_rag::embedder::onnx::OnnxEmbedder;
use ollama_rag::llm::ollama::OllamaLlm;
use ollama_rag::rag::Rag;

#[derive(Parser)]
#[command(name = "ollama-rag")]
#[command(about = "Index a document folder and ask an Ollama model about it")]
#[command(version)]
struct Cli {
    /// Question to ask (defaults to the configured query)
    #[arg(short, long)]
    query: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Input directory, repeatable (overrides config)
    #[arg(long = "input-dir", value_name = "DIR")]
    input_dirs: Vec<String>,

    /// Accepted file extension, repeatable (overrides config)
    #[arg(long = "ext", value_name = "EXT")]
    exts: Vec<String>,

    /// Update the index without asking a question
    #[arg(long)]
    index_only: bool,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    if !cli.input_dirs.is_empty() {
        config.input_dirs = cli.input_dirs;
    }
    if !cli.exts.is_empty() {
        config.required_exts = cli.exts;
    }
    config.validate().context("invalid configuration")?;

    let model_dir = Path::new(&config.embedding.model_dir);
    download_model_files(&config.embedding.model_name, model_dir)?;
    let embedder = OnnxEmbedder::new(
        model_dir,
        config.embedding.dimensions,
        config.embedding.pooling,
    )
    .context("failed to load the embedding model")?;

    let llm = OllamaLlm::new(
        &config.ollama_url,
        &config.model_name,
        config.request_timeout(),
    )?;
    info!("Using {} at {}", config.model_name, config.ollama_url);

    let mut rag = Rag::new(config, Arc::new(embedder), Arc::new(llm))?;
    let update = rag.update_index()?;
    info!(
        "Index up to date: {} new, {} updated, {} unchanged, {} failed",
        update.new_files, update.updated_files, update.unchanged_files, update.failed_files
    );

    if cli.index_only {
        return Ok(());
    }

    let response = rag.query(cli.query.as_deref())?;
    println!("\nResponse:\n{}", response.answer);
    Ok(())
}
