/// A chunk of source text ready for insertion.
///
/// `position` is relative to the batch being inserted; the database offsets
/// it past chunks already stored for the same file.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub position: usize,
    pub section: Option<&'a str>,
    pub content: &'a str,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_name: String,
    pub chunk_content: String,
    pub section: Option<String>,
    pub similarity: f64,
    pub position: usize,
    pub chunk_id: i64,
}
