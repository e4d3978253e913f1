/// Configuration module for ollama-rag.
///
/// Handles loading, validating, and providing default configuration values.
/// Values come from `config.json` (all keys optional) and are then
/// overridden by a handful of environment variables.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedder::Pooling;
use crate::query::DEFAULT_QA_TEMPLATE;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_model_name() -> String {
    "llama3.2".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_request_timeout() -> f64 {
    120.0
}

fn default_embedding_model_name() -> String {
    "BAAI/bge-large-en-v1.5".to_string()
}

fn default_embedding_model_dir() -> String {
    "models/bge-large-en-v1.5".to_string()
}

fn default_dimensions() -> usize {
    1024
}

fn default_input_dirs() -> Vec<String> {
    vec!["documents".to_string()]
}

fn default_required_exts() -> Vec<String> {
    vec![".pdf".to_string(), ".doc".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_persist_dir() -> String {
    "storage".to_string()
}

fn default_vector_db_dir() -> String {
    "vector_db".to_string()
}

fn default_collection_name() -> String {
    "my_collection".to_string()
}

fn default_indexed_files_path() -> String {
    "indexed_files.json".to_string()
}

fn default_chunk_size() -> usize {
    1024
}

fn default_similarity_top_k() -> usize {
    2
}

fn default_qa_template() -> String {
    DEFAULT_QA_TEMPLATE.to_string()
}

fn default_query() -> String {
    "What are the main topics covered in these documents?".to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Ollama model used for answer generation.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Seconds to wait for a single generation request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default = "default_input_dirs")]
    pub input_dirs: Vec<String>,

    /// Accepted file extensions, matched case-insensitively.
    #[serde(default = "default_required_exts")]
    pub required_exts: Vec<String>,

    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Directory holding the index manifest.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: String,

    #[serde(default = "default_vector_db_dir")]
    pub vector_db_dir: String,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    #[serde(default = "default_indexed_files_path")]
    pub indexed_files_path: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,

    /// Drop index entries for source files that no longer exist.
    #[serde(default)]
    pub prune_deleted: bool,

    /// Question asked when none is given on the command line.
    #[serde(default = "default_query")]
    pub query: String,

    /// Prompt sent to the model, with `{context_str}` and `{query_str}`
    /// placeholders.
    #[serde(default = "default_qa_template")]
    pub qa_template: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// HuggingFace repository of the sentence-embedding model.
    /// `dimensions` and `pooling` must match the chosen model.
    #[serde(default = "default_embedding_model_name")]
    pub model_name: String,

    #[serde(default = "default_embedding_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub pooling: Pooling,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            ollama_url: default_ollama_url(),
            request_timeout_secs: default_request_timeout(),
            embedding: EmbeddingConfig::default(),
            input_dirs: default_input_dirs(),
            required_exts: default_required_exts(),
            recursive: default_true(),
            persist_dir: default_persist_dir(),
            vector_db_dir: default_vector_db_dir(),
            collection_name: default_collection_name(),
            indexed_files_path: default_indexed_files_path(),
            chunk_size: default_chunk_size(),
            similarity_top_k: default_similarity_top_k(),
            prune_deleted: false,
            query: default_query(),
            qa_template: default_qa_template(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_embedding_model_name(),
            model_dir: default_embedding_model_dir(),
            dimensions: default_dimensions(),
            pooling: Pooling::default(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the binary's cwd.
    pub fn load(config_path: &str) -> Result<Self> {
        let mut cfg = Self::load_file(config_path)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn load_file(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Override selected values from the environment.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a closure.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("RAG_MODEL").filter(|v| !v.is_empty()) {
            self.model_name = model;
        }
        if let Some(host) = lookup("OLLAMA_HOST").filter(|v| !v.is_empty()) {
            self.ollama_url = normalize_ollama_url(&host);
        }
        if let Some(raw) = lookup("RAG_REQUEST_TIMEOUT") {
            match raw.parse::<f64>() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(e) => warn!("Ignoring RAG_REQUEST_TIMEOUT={raw}: {e}"),
            }
        }
        if let Some(model) = lookup("RAG_EMBEDDING_MODEL").filter(|v| !v.is_empty()) {
            // A different repo needs its own download directory
            if model != self.embedding.model_name {
                self.embedding.model_dir = model_dir_for(&model);
            }
            self.embedding.model_name = model;
        }
        if let Some(raw) = lookup("RAG_EMBEDDING_DIMENSIONS") {
            match raw.parse::<usize>() {
                Ok(dims) => self.embedding.dimensions = dims,
                Err(e) => warn!("Ignoring RAG_EMBEDDING_DIMENSIONS={raw}: {e}"),
            }
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.similarity_top_k > 0,
            "similarity_top_k must be positive"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            self.request_timeout_secs.is_finite() && self.request_timeout_secs > 0.0,
            "request_timeout_secs must be a positive number of seconds"
        );
        anyhow::ensure!(
            self.qa_template.contains("{context_str}") && self.qa_template.contains("{query_str}"),
            "qa_template must contain {{context_str}} and {{query_str}}"
        );
        anyhow::ensure!(
            !self.required_exts.is_empty(),
            "at least one file extension must be specified"
        );
        anyhow::ensure!(
            !self.collection_name.trim().is_empty(),
            "collection_name must not be empty"
        );
        Ok(())
    }

    /// Input directories as paths.
    #[must_use]
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.input_dirs.iter().map(PathBuf::from).collect()
    }

    /// SQLite file backing the configured collection.
    #[must_use]
    pub fn vector_db_path(&self) -> PathBuf {
        Path::new(&self.vector_db_dir).join(format!("{}.sqlite3", self.collection_name))
    }

    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.request_timeout_secs.max(0.0))
    }
}

/// `BAAI/bge-small-en-v1.5` downloads into `models/bge-small-en-v1.5`.
fn model_dir_for(repo: &str) -> String {
    let name = repo
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or(repo);
    format!("models/{name}")
}

/// `OLLAMA_HOST` is commonly set without a scheme (`127.0.0.1:11434`).
fn normalize_ollama_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
