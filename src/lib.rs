//! # ollama-rag: local question answering over document folders
//!
//! Scans input directories, loads new and modified documents into a
//! persistent vector index and answers questions with an Ollama model using
//! the retrieved chunks as context.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration with environment overrides
//! - **[`scanner`]**: input directory walk with extension filtering
//! - **[`tracker`]**: indexed-files record and modification-time change detection
//! - **[`loader`]**: PDF, Office, HTML, Markdown, CSV, notebook and text readers
//! - **[`db`]**: SQLite + sqlite-vec chunk storage and similarity search
//! - **[`indexer`]**: chunking and the persisted [`indexer::VectorIndex`]
//! - **[`embedder`]**: sentence embeddings via ONNX Runtime
//! - **[`llm`]**: language-model trait and the Ollama client
//! - **[`query`]**: retrieval plus prompt rendering
//! - **[`rag`]**: the [`rag::Rag`] facade tying it together

pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod llm;
pub mod loader;
pub mod query;
pub mod rag;
pub mod scanner;
pub mod tracker;
