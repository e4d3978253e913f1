//! Change detection against the indexed-files record.
//!
//! The record is a flat JSON object mapping absolute file path to the
//! modification time (seconds since the epoch) the file had when it was
//! last loaded into the index.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::scanner::{ScanError, ScannedFile, Scanner};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed indexed-files record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize indexed-files record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted mapping of file path → last indexed modification time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexedFiles {
    entries: BTreeMap<String, f64>,
}

impl IndexedFiles {
    /// Load the record; a missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self, TrackerError> {
        if !path.exists() {
            debug!("No indexed-files record at {}", path.display());
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path).map_err(|source| TrackerError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| TrackerError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overwrite the record on disk. The data goes to a temporary file in the
    /// same directory which is then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<(), TrackerError> {
        let io_err = |source: std::io::Error| TrackerError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let data = serde_json::to_vec_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!("Saved {} indexed-file entries to {}", self.len(), path.display());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<f64> {
        self.entries.get(path).copied()
    }

    pub fn record(&mut self, path: impl Into<String>, modified: f64) {
        self.entries.insert(path.into(), modified);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drop entries whose file no longer exists and return their paths.
    pub fn prune_missing(&mut self) -> Vec<String> {
        let missing: Vec<String> = self
            .entries
            .keys()
            .filter(|p| !Path::new(p.as_str()).exists())
            .cloned()
            .collect();
        for path in &missing {
            self.entries.remove(path);
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    Updated,
}

/// A file selected for (re)loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedFile {
    pub path: PathBuf,
    /// Modification time observed during the scan; this is what gets
    /// recorded once the file has been indexed.
    pub modified: f64,
    pub status: FileStatus,
}

impl ChangedFile {
    /// Key of this file in the indexed-files record.
    #[must_use]
    pub fn key(&self) -> String {
        record_key(&self.path)
    }
}

#[must_use]
pub fn record_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Result of a change-detection pass.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub changed: Vec<ChangedFile>,
    pub unchanged: usize,
    pub scan_errors: Vec<ScanError>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.changed.iter().map(|c| c.path.as_path())
    }
}

/// Select the files that are new or strictly newer than their record.
pub fn classify(files: Vec<ScannedFile>, indexed: &IndexedFiles) -> (Vec<ChangedFile>, usize) {
    let mut changed = Vec::new();
    let mut unchanged = 0;

    for file in files {
        let status = match indexed.get(&record_key(&file.path)) {
            None => FileStatus::New,
            Some(stored) if file.modified > stored => FileStatus::Updated,
            Some(_) => {
                unchanged += 1;
                continue;
            }
        };
        changed.push(ChangedFile {
            path: file.path,
            modified: file.modified,
            status,
        });
    }

    (changed, unchanged)
}

/// Scans input directories and diffs them against the indexed-files record.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    roots: Vec<PathBuf>,
    scanner: Scanner,
}

impl ChangeDetector {
    pub fn new<S: AsRef<str>>(roots: Vec<PathBuf>, extensions: &[S], recursive: bool) -> Self {
        Self {
            roots,
            scanner: Scanner::new(extensions, recursive),
        }
    }

    pub fn detect(&self, indexed: &IndexedFiles) -> ChangeSet {
        let outcome = self.scanner.scan(&self.roots);
        let (changed, unchanged) = classify(outcome.files, indexed);

        info!(
            "Change detection: {} new or updated, {} unchanged",
            changed.len(),
            unchanged
        );

        ChangeSet {
            changed,
            unchanged,
            scan_errors: outcome.errors,
        }
    }
}
