//! Persisted vector index: a sqlite-vec database plus a JSON manifest.
//!
//! The manifest (`<persist_dir>/index.json`) is written last, so its
//! presence marks an index that was completely built.
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::db::Db;
use crate::db::models::{Chunk, SearchResult};
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::chunker::split_into_chunks;
use crate::loader::Document;

pub const MANIFEST_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("cannot create an index from zero documents")]
    NoDocuments,

    #[error("vector database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid index manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("index was built with {expected}, current embedder is {actual}")]
    Mismatch { expected: String, actual: String },
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> IndexError + '_ {
    move |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub collection: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub persisted_at: DateTime<Utc>,
    /// Number of source files with chunks in the index.
    pub file_count: usize,
}

/// Where an index lives and how documents are chunked into it.
#[derive(Debug, Clone)]
pub struct IndexStore {
    persist_dir: PathBuf,
    db_path: PathBuf,
    collection: String,
    embedding_model: String,
    chunk_size: usize,
}

impl IndexStore {
    pub fn new(
        persist_dir: impl Into<PathBuf>,
        db_path: impl Into<PathBuf>,
        collection: impl Into<String>,
        embedding_model: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            db_path: db_path.into(),
            collection: collection.into(),
            embedding_model: embedding_model.into(),
            chunk_size,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.persist_dir,
            config.vector_db_path(),
            &config.collection_name,
            &config.embedding.model_name,
            config.chunk_size,
        )
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.persist_dir.join(MANIFEST_FILE)
    }

    /// Open a previously persisted index.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. An index that
    /// exists but cannot be used with `embedder` is an error.
    pub fn load(&self, embedder: Arc<dyn Embedder>) -> Result<Option<VectorIndex>, IndexError> {
        let manifest_path = self.manifest_path();
        if !self.persist_dir.is_dir() || !manifest_path.is_file() {
            debug!("No persisted index in {}", self.persist_dir.display());
            return Ok(None);
        }

        let data = fs::read_to_string(&manifest_path).map_err(io_error(&manifest_path))?;
        let manifest: IndexManifest =
            serde_json::from_str(&data).map_err(|source| IndexError::Manifest {
                path: manifest_path.clone(),
                source,
            })?;

        if manifest.embedding_model != self.embedding_model
            || manifest.dimensions != embedder.dimensions()
        {
            return Err(IndexError::Mismatch {
                expected: format!("{} ({} dims)", manifest.embedding_model, manifest.dimensions),
                actual: format!("{} ({} dims)", self.embedding_model, embedder.dimensions()),
            });
        }

        if !self.db_path.is_file() {
            return Err(io_error(&self.db_path)(std::io::Error::new(
                ErrorKind::NotFound,
                "vector database is missing",
            )));
        }
        let db = Db::open(&self.db_path, manifest.dimensions)?;

        info!(
            "Loaded index '{}' ({} files, {} chunks)",
            manifest.collection,
            db.document_count()?,
            db.chunk_count()?
        );

        Ok(Some(VectorIndex {
            db,
            embedder,
            manifest,
            manifest_path,
            chunk_size: self.chunk_size,
        }))
    }

    /// Build a fresh index from `documents`, replacing any stale database
    /// for this collection, and persist it.
    pub fn create(
        &self,
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
    ) -> Result<VectorIndex, IndexError> {
        if documents.is_empty() {
            return Err(IndexError::NoDocuments);
        }

        fs::create_dir_all(&self.persist_dir).map_err(io_error(&self.persist_dir))?;
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        match fs::remove_file(&self.db_path) {
            Ok(()) => debug!("Removed stale database {}", self.db_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&self.db_path)(e)),
        }

        let dimensions = embedder.dimensions();
        let now = Utc::now();
        let mut index = VectorIndex {
            db: Db::open(&self.db_path, dimensions)?,
            embedder,
            manifest: IndexManifest {
                collection: self.collection.clone(),
                embedding_model: self.embedding_model.clone(),
                dimensions,
                created_at: now,
                persisted_at: now,
                file_count: 0,
            },
            manifest_path: self.manifest_path(),
            chunk_size: self.chunk_size,
        };

        info!("Creating index '{}' from {} documents", self.collection, documents.len());
        let pb = ProgressBar::new(documents.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} documents {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }

        for doc in documents {
            pb.set_message(doc.metadata.file_name.clone());
            index.insert(doc)?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        index.persist()?;
        Ok(index)
    }
}

/// An open index ready for inserts and retrieval.
pub struct VectorIndex {
    db: Db,
    embedder: Arc<dyn Embedder>,
    manifest: IndexManifest,
    manifest_path: PathBuf,
    chunk_size: usize,
}

impl VectorIndex {
    #[must_use]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn source_count(&self) -> Result<usize, IndexError> {
        Ok(self.db.document_count()?)
    }

    pub fn chunk_count(&self) -> Result<usize, IndexError> {
        Ok(self.db.chunk_count()?)
    }

    /// Chunk, embed and append one document under its source file.
    /// Returns the number of chunks stored.
    pub fn insert(&mut self, doc: &Document) -> Result<usize, IndexError> {
        let pieces = split_into_chunks(&doc.text, self.chunk_size);
        if pieces.is_empty() {
            return Ok(0);
        }

        let text_refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&text_refs)?;

        let chunks: Vec<Chunk<'_>> = pieces
            .iter()
            .enumerate()
            .map(|(position, content)| Chunk {
                position,
                section: doc.metadata.section.as_deref(),
                content,
            })
            .collect();

        self.db.insert_chunks(
            &doc.metadata.file_path,
            doc.metadata.last_modified,
            &chunks,
            &vectors,
        )?;

        debug!(
            "Indexed {} chunks from {}{}",
            chunks.len(),
            doc.metadata.file_path,
            doc.metadata
                .section
                .as_deref()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default()
        );
        Ok(chunks.len())
    }

    /// Drop every chunk of a source file. Returns whether it was indexed.
    pub fn remove_source(&mut self, file_path: &str) -> Result<bool, IndexError> {
        let removed = self.db.delete_document(file_path)?;
        if removed {
            debug!("Removed {} from the index", file_path);
        }
        Ok(removed)
    }

    /// Rewrite the manifest with the current file count.
    pub fn persist(&mut self) -> Result<(), IndexError> {
        self.manifest.persisted_at = Utc::now();
        self.manifest.file_count = self.db.document_count()?;

        let path = &self.manifest_path;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let data = serde_json::to_vec_pretty(&self.manifest).map_err(|source| {
            IndexError::Manifest {
                path: path.clone(),
                source,
            }
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_error(path))?;
        tmp.write_all(&data).map_err(io_error(path))?;
        tmp.persist(path).map_err(|e| io_error(path)(e.error))?;

        info!(
            "Persisted index '{}' ({} files)",
            self.manifest.collection, self.manifest.file_count
        );
        Ok(())
    }

    /// Chunks nearest to `query`, most similar first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, IndexError> {
        let vector = self.embedder.embed(query)?;
        Ok(self.db.search(&vector, top_k)?)
    }
}
