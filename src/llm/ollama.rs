use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LanguageModel, LlmError};

/// Longest error body kept in [`LlmError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Client for the Ollama `/api/generate` endpoint (non-streaming).
pub struct OllamaLlm {
    client: Client,
    url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaLlm {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| LlmError::Request {
                url: url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url,
            model: model.to_string(),
        })
    }
}

impl LanguageModel for OllamaLlm {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request_err = |source: reqwest::Error| LlmError::Request {
            url: self.url.clone(),
            source,
        };

        debug!("POST {} (model {}, {} prompt chars)", self.url, self.model, prompt.len());
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(LlmError::Status {
                url: self.url.clone(),
                status,
                body,
            });
        }

        let generated: GenerateResponse = response.json().map_err(request_err)?;
        let answer = generated.response.trim();
        if answer.is_empty() {
            return Err(LlmError::EmptyResponse {
                model: self.model.clone(),
            });
        }

        Ok(answer.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
