/// Language-model trait used to turn a prompt into an answer.
pub mod mock;
pub mod ollama;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("model '{model}' returned an empty response")]
    EmptyResponse { model: String },
}

/// A text-completion model.
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` and return the generated text.
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}
