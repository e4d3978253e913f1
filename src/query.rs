//! Question answering over a [`VectorIndex`].
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::embedder::EmbedderError;
use crate::indexer::{IndexError, VectorIndex};
use crate::llm::{LanguageModel, LlmError};

pub const DEFAULT_QA_TEMPLATE: &str = "Context information is below.
---------------------
{context_str}
---------------------
Given the context information above I want you to think step by step to answer the query in a crisp manner, in case you don't know the answer say 'I don't know!'.
Query: {query_str}
Answer: ";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("the question is empty")]
    EmptyQuery,

    #[error("failed to embed the question: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("retrieval failed: {0}")]
    Retrieval(IndexError),

    #[error("language model error: {0}")]
    Llm(#[from] LlmError),
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Embedding(e) => QueryError::Embedding(e),
            other => QueryError::Retrieval(other),
        }
    }
}

/// A retrieved chunk that went into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceChunk {
    pub file_path: String,
    pub section: Option<String>,
    pub text: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

pub struct QueryEngine {
    index: VectorIndex,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    template: String,
}

impl QueryEngine {
    pub fn new(index: VectorIndex, llm: Arc<dyn LanguageModel>, top_k: usize) -> Self {
        Self {
            index,
            llm,
            top_k,
            template: DEFAULT_QA_TEMPLATE.to_string(),
        }
    }

    /// Replace the QA template. It must contain `{context_str}` and
    /// `{query_str}`.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Give the index back, e.g. to apply further updates.
    #[must_use]
    pub fn into_index(self) -> VectorIndex {
        self.index
    }

    pub fn query(&self, question: &str) -> Result<Response, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let hits = self.index.retrieve(question, self.top_k)?;
        debug!("Retrieved {} chunks for the question", hits.len());

        let sources: Vec<SourceChunk> = hits
            .into_iter()
            .map(|hit| SourceChunk {
                file_path: hit.document_name,
                section: hit.section,
                text: hit.chunk_content,
                similarity: hit.similarity,
            })
            .collect();

        let prompt = render_prompt(&self.template, &context_str(&sources), question);
        info!("Querying {} with {} context chunks", self.llm.model_name(), sources.len());
        let answer = self.llm.complete(&prompt)?;

        Ok(Response { answer, sources })
    }
}

/// Retrieved chunks, each headed by where it came from.
fn context_str(sources: &[SourceChunk]) -> String {
    sources
        .iter()
        .map(|s| match &s.section {
            Some(section) => format!("file_path: {} ({section})\n\n{}", s.file_path, s.text),
            None => format!("file_path: {}\n\n{}", s.file_path, s.text),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill both placeholders in one left-to-right pass, so text already
/// substituted is never scanned again.
fn render_prompt(template: &str, context: &str, question: &str) -> String {
    const CONTEXT: &str = "{context_str}";
    const QUERY: &str = "{query_str}";

    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix(CONTEXT) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUERY) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::indexer::IndexStore;
    use crate::llm::mock::EchoLlm;
    use crate::loader::{Document, DocumentMetadata};
    use tempfile::tempdir;

    fn doc(path: &str, section: Option<&str>, text: &str) -> Document {
        Document {
            text: text.to_string(),
            metadata: DocumentMetadata {
                file_path: path.to_string(),
                file_name: path.to_string(),
                file_type: "txt".to_string(),
                file_size: 0,
                last_modified: 1.0,
                section: section.map(str::to_string),
            },
        }
    }

    fn engine(dir: &std::path::Path, llm: Arc<EchoLlm>, top_k: usize) -> QueryEngine {
        let store = IndexStore::new(dir.join("storage"), dir.join("db.sqlite3"), "c", "m", 512);
        let index = store
            .create(
                &[
                    doc("/docs/rust.pdf", Some("page 3"), "Rust has no garbage collector."),
                    doc("/docs/ollama.txt", None, "Ollama serves local models."),
                ],
                Arc::new(MockEmbedder::new(16)),
            )
            .unwrap();
        QueryEngine::new(index, llm, top_k)
    }

    #[test]
    fn test_render_default_template() {
        let prompt = render_prompt(DEFAULT_QA_TEMPLATE, "CTX", "Q?");
        assert_eq!(
            prompt,
            "Context information is below.\n---------------------\nCTX\n---------------------\nGiven the context information above I want you to think step by step to answer the query in a crisp manner, in case you don't know the answer say 'I don't know!'.\nQuery: Q?\nAnswer: "
        );
    }

    #[test]
    fn test_placeholders_in_context_are_left_alone() {
        let prompt = render_prompt(
            "C: {context_str} | Q: {query_str} | {other}",
            "see {query_str} and {context_str}",
            "why?",
        );
        assert_eq!(prompt, "C: see {query_str} and {context_str} | Q: why? | {other}");
    }

    #[test]
    fn test_context_headers() {
        let sources = vec![
            SourceChunk {
                file_path: "/a.pdf".into(),
                section: Some("page 1".into()),
                text: "alpha".into(),
                similarity: 0.9,
            },
            SourceChunk {
                file_path: "/b.txt".into(),
                section: None,
                text: "beta".into(),
                similarity: 0.8,
            },
        ];
        assert_eq!(
            context_str(&sources),
            "file_path: /a.pdf (page 1)\n\nalpha\n\nfile_path: /b.txt\n\nbeta"
        );
    }

    #[test]
    fn test_query_sends_retrieved_context() {
        let dir = tempdir().unwrap();
        let llm = Arc::new(EchoLlm::new());
        let engine = engine(dir.path(), llm.clone(), 1);

        let response = engine.query("Ollama serves local models.").unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].file_path, "/docs/ollama.txt");
        assert!(response.answer.contains("Ollama serves local models."));
        assert!(response.answer.ends_with("Query: Ollama serves local models.\nAnswer: "));
        assert_eq!(llm.prompts().len(), 1);
    }

    #[test]
    fn test_top_k_limits_sources() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), Arc::new(EchoLlm::new()), 5);
        let response = engine.query("anything").unwrap();
        assert_eq!(response.sources.len(), 2);
    }

    #[test]
    fn test_empty_question_rejected() {
        let dir = tempdir().unwrap();
        let llm = Arc::new(EchoLlm::new());
        let engine = engine(dir.path(), llm.clone(), 2);
        assert!(matches!(engine.query("   "), Err(QueryError::EmptyQuery)));
        assert!(llm.prompts().is_empty());
    }

    #[test]
    fn test_custom_template() {
        let dir = tempdir().unwrap();
        let engine = engine(dir.path(), Arc::new(EchoLlm::new()), 1)
            .with_template("Q={query_str}");
        assert_eq!(engine.query("why?").unwrap().answer, "Q=why?");
    }
}
