use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{LoaderError, Section};

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoaderError> {
    fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_plain(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let bytes = read_bytes(path)?;
    Ok(vec![Section::whole(
        String::from_utf8_lossy(&bytes).into_owned(),
    )])
}

/// Each record becomes one comma-separated line.
pub(crate) fn read_csv(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let err = |source: csv::Error| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(err)?;

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(err)?;
        lines.push(record.iter().collect::<Vec<_>>().join(", "));
    }

    Ok(vec![Section::whole(lines.join("\n"))])
}

#[derive(Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<NotebookCell>,
}

#[derive(Deserialize)]
struct NotebookCell {
    #[serde(default)]
    source: CellSource,
}

/// nbformat allows the cell source as one string or a list of lines.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Text(text) => text,
        }
    }
}

/// Concatenated cell sources of a Jupyter notebook, outputs excluded.
pub(crate) fn read_notebook(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let bytes = read_bytes(path)?;
    let notebook: Notebook =
        serde_json::from_slice(&bytes).map_err(|source| LoaderError::Notebook {
            path: path.to_path_buf(),
            source,
        })?;

    let cells: Vec<String> = notebook
        .cells
        .into_iter()
        .map(|c| c.source.into_text())
        .filter(|s| !s.trim().is_empty())
        .collect();

    Ok(vec![Section::whole(cells.join("\n\n"))])
}
