//! Document loading: turn files into text documents with metadata.
//!
//! The reader is picked from the file extension. PDFs yield one document
//! per page and spreadsheets one per sheet; everything else yields a single
//! document. Unknown extensions are read as (lossy) UTF-8 text.
mod markup;
mod office;
mod pdf;
mod text;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::scanner::system_time_to_secs;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PDF {path}: {source}")]
    Pdf {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("failed to parse DOCX {path}: {message}")]
    Docx { path: PathBuf, message: String },

    #[error("failed to read spreadsheet {path}: {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse notebook {path}: {source}")]
    Notebook {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    /// Lower-case extension without the dot.
    pub file_type: String,
    pub file_size: u64,
    pub last_modified: f64,
    /// Page label or sheet name when the file is split.
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Text of one part of a file, with its optional section label.
pub(crate) struct Section {
    pub label: Option<String>,
    pub text: String,
}

impl Section {
    pub(crate) fn whole(text: String) -> Self {
        Self { label: None, text }
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Files read successfully, including those that yielded no text.
    pub loaded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, LoaderError)>,
}

impl LoadReport {
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.loaded.iter().any(|p| p == path)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn read_sections(path: &Path, file_type: &str) -> Result<Vec<Section>, LoaderError> {
    match file_type {
        "pdf" => pdf::read_pdf(path),
        "docx" => office::read_docx(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => office::read_spreadsheet(path),
        "html" | "htm" => markup::read_html(path),
        "md" | "markdown" => markup::read_markdown(path),
        "csv" => text::read_csv(path),
        "ipynb" => text::read_notebook(path),
        _ => text::read_plain(path),
    }
}

/// Load a single file into zero or more documents.
pub fn load_file(path: &Path) -> Result<Vec<Document>, LoaderError> {
    let meta = fs::metadata(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_type = extension_of(path);
    let last_modified = meta.modified().map(system_time_to_secs).unwrap_or_default();

    let sections = read_sections(path, &file_type)?;

    let documents: Vec<Document> = sections
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| Document {
            text: s.text,
            metadata: DocumentMetadata {
                file_path: path.to_string_lossy().into_owned(),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                file_type: file_type.clone(),
                file_size: meta.len(),
                last_modified,
                section: s.label,
            },
        })
        .collect();

    debug!("Loaded {} document(s) from {}", documents.len(), path.display());
    Ok(documents)
}

/// Load every file; failures are logged and collected, never fatal.
pub fn load_data<P: AsRef<Path>>(files: &[P]) -> LoadReport {
    let mut report = LoadReport::default();

    for file in files {
        let path = file.as_ref();
        match load_file(path) {
            Ok(docs) => {
                report.documents.extend(docs);
                report.loaded.push(path.to_path_buf());
            }
            Err(e) => {
                warn!("Skipping {}: {e}", path.display());
                report.failed.push((path.to_path_buf(), e));
            }
        }
    }

    info!(
        "Loaded {} document(s) from {} file(s), {} failed",
        report.documents.len(),
        report.loaded.len(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_plain_text_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Notes.TXT");
        fs::write(&path, "Rust is a systems language.").unwrap();

        let docs = load_file(&path).unwrap();
        assert_eq!(docs.len(), 1);
        let meta = &docs[0].metadata;
        assert_eq!(meta.file_name, "Notes.TXT");
        assert_eq!(meta.file_type, "txt");
        assert_eq!(meta.file_size, 27);
        assert!(meta.section.is_none());
        assert!(meta.last_modified > 0.0);
        assert_eq!(docs[0].text, "Rust is a systems language.");
    }

    #[test]
    fn test_blank_file_is_loaded_without_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "  \n\n ").unwrap();

        let report = load_data(&[&path]);
        assert!(report.documents.is_empty());
        assert!(report.is_loaded(&path));
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.txt");
        let broken_pdf = dir.path().join("broken.pdf");
        let missing = dir.path().join("missing.txt");
        fs::write(&good, "hello").unwrap();
        fs::write(&broken_pdf, "this is not a pdf").unwrap();

        let report = load_data(&[good.clone(), broken_pdf.clone(), missing.clone()]);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.loaded, vec![good]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, LoaderError::Pdf { .. }));
        assert!(matches!(report.failed[1].1, LoaderError::Io { .. }));
    }

    #[test]
    fn test_unknown_binary_extension_reads_lossy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        fs::write(&path, b"Word \xff\xfe text").unwrap();

        let docs = load_file(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("Word"));
        assert!(docs[0].text.contains("text"));
    }
}
