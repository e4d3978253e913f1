use std::path::Path;

use tracing::warn;

use super::{LoaderError, Section};

/// One section per page, labelled `page N`. Pages whose text cannot be
/// extracted are skipped.
pub(crate) fn read_pdf(path: &Path) -> Result<Vec<Section>, LoaderError> {
    let doc = lopdf::Document::load(path).map_err(|source| LoaderError::Pdf {
        path: path.to_path_buf(),
        source,
    })?;

    let mut sections = Vec::new();
    for page in doc.get_pages().into_keys() {
        match doc.extract_text(&[page]) {
            Ok(text) => sections.push(Section {
                label: Some(format!("page {page}")),
                text,
            }),
            Err(e) => warn!("No text extracted from page {page} of {}: {e}", path.display()),
        }
    }

    Ok(sections)
}
