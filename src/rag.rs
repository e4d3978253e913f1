//! The pipeline facade: keeps the index in step with the input directories
//! and answers questions against it.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedder::Embedder;
use crate::indexer::{IndexError, IndexStore, VectorIndex};
use crate::llm::LanguageModel;
use crate::loader;
use crate::query::{QueryEngine, QueryError, Response};
use crate::tracker::{ChangeDetector, ChangeSet, FileStatus, IndexedFiles, TrackerError};

#[derive(Error, Debug)]
pub enum RagError {
    #[error("invalid setup: {0}")]
    Setup(String),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("no documents found in {0} and no existing index to query")]
    NothingToIndex(String),

    #[error("none of the {0} new or updated files produced any text")]
    NoDocuments(usize),

    #[error("the query engine is not ready; update the index first")]
    QueryEngineNotReady,
}

/// What one [`Rag::update_index`] call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexUpdate {
    /// A new index was built instead of updating an existing one.
    pub created: bool,
    pub new_files: usize,
    pub updated_files: usize,
    pub unchanged_files: usize,
    pub failed_files: usize,
    pub documents_inserted: usize,
    pub pruned_files: usize,
}

pub struct Rag {
    config: Config,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    store: IndexStore,
    detector: ChangeDetector,
    engine: Option<QueryEngine>,
}

impl Rag {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self, RagError> {
        config
            .validate()
            .map_err(|e| RagError::Setup(format!("{e:#}")))?;
        if embedder.dimensions() != config.embedding.dimensions {
            return Err(RagError::Setup(format!(
                "embedder produces {} dimensions but embedding.dimensions is {}",
                embedder.dimensions(),
                config.embedding.dimensions
            )));
        }

        Ok(Self {
            store: IndexStore::from_config(&config),
            detector: ChangeDetector::new(
                config.input_paths(),
                &config.required_exts,
                config.recursive,
            ),
            config,
            embedder,
            llm,
            engine: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The index behind the query engine, once [`Rag::update_index`] ran.
    #[must_use]
    pub fn index(&self) -> Option<&VectorIndex> {
        self.engine.as_ref().map(QueryEngine::index)
    }

    fn record_path(&self) -> PathBuf {
        PathBuf::from(&self.config.indexed_files_path)
    }

    /// A persisted index that cannot be opened is rebuilt, not fatal.
    fn open_existing_index(&self) -> Option<VectorIndex> {
        match self.store.load(Arc::clone(&self.embedder)) {
            Ok(index) => index,
            Err(e) => {
                warn!("Existing index is unusable, a new one will be built: {e}");
                None
            }
        }
    }

    /// Load new and modified files into the index, then rebuild the query
    /// engine.
    pub fn update_index(&mut self) -> Result<IndexUpdate, RagError> {
        let mut index = match self.engine.take() {
            Some(engine) => Some(engine.into_index()),
            None => self.open_existing_index(),
        };

        let mut indexed = IndexedFiles::load(&self.record_path())?;
        if index.is_none() && !indexed.is_empty() {
            warn!(
                "No index found but {} files are recorded as indexed; indexing everything again",
                indexed.len()
            );
            indexed = IndexedFiles::default();
        }

        let changes = self.detector.detect(&indexed);
        let result = self.apply_changes(&mut index, &mut indexed, &changes);

        if let Some(index) = index {
            self.engine = Some(
                QueryEngine::new(index, Arc::clone(&self.llm), self.config.similarity_top_k)
                    .with_template(self.config.qa_template.as_str()),
            );
        }

        let mut update = result?;
        update.unchanged_files = changes.unchanged;
        Ok(update)
    }

    fn apply_changes(
        &self,
        slot: &mut Option<VectorIndex>,
        indexed: &mut IndexedFiles,
        changes: &ChangeSet,
    ) -> Result<IndexUpdate, RagError> {
        let mut update = IndexUpdate::default();
        let record_path = self.record_path();

        if changes.is_empty() {
            if slot.is_none() {
                return Err(RagError::NothingToIndex(self.config.input_dirs.join(", ")));
            }
            info!("No new or updated documents found");
        } else {
            for file in &changes.changed {
                match file.status {
                    FileStatus::New => {
                        update.new_files += 1;
                        info!("New file: {}", file.path.display());
                    }
                    FileStatus::Updated => {
                        update.updated_files += 1;
                        info!("Updated file: {}", file.path.display());
                    }
                }
            }

            let paths: Vec<&Path> = changes.paths().collect();
            let report = loader::load_data(&paths);
            update.failed_files = report.failed.len();

            if let Some(index) = slot.as_mut() {
                // Any loaded file may already have chunks, recorded or not
                for file in changes.changed.iter().filter(|f| report.is_loaded(&f.path)) {
                    index.remove_source(&file.key())?;
                }
                if report.documents.is_empty() {
                    warn!(
                        "None of the {} new or updated files produced any text",
                        changes.changed.len()
                    );
                }
                for doc in &report.documents {
                    index.insert(doc)?;
                }
                index.persist()?;
            } else if report.documents.is_empty() {
                return Err(RagError::NoDocuments(changes.changed.len()));
            } else {
                *slot = Some(
                    self.store
                        .create(&report.documents, Arc::clone(&self.embedder))?,
                );
                update.created = true;
            }
            update.documents_inserted = report.documents.len();

            for file in changes.changed.iter().filter(|f| report.is_loaded(&f.path)) {
                indexed.record(file.key(), file.modified);
            }
            indexed.save(&record_path)?;
            info!(
                "Indexed {} documents from {} files",
                update.documents_inserted,
                report.loaded.len()
            );
        }

        if self.config.prune_deleted {
            let missing = indexed.prune_missing();
            if !missing.is_empty() {
                if let Some(index) = slot.as_mut() {
                    for path in &missing {
                        index.remove_source(path)?;
                    }
                    index.persist()?;
                }
                indexed.save(&record_path)?;
                info!("Pruned {} deleted files from the index", missing.len());
                update.pruned_files = missing.len();
            }
        }

        Ok(update)
    }

    /// Answer `question`, or the configured default question when `None`.
    pub fn query(&self, question: Option<&str>) -> Result<Response, RagError> {
        let engine = self.engine.as_ref().ok_or(RagError::QueryEngineNotReady)?;
        let question = question.unwrap_or(&self.config.query);
        Ok(engine.query(question)?)
    }
}
