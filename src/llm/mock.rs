/// Offline language model for tests.
use std::sync::{Mutex, PoisonError};

use super::{LanguageModel, LlmError};

/// Answers every prompt with the prompt itself and remembers what it saw.
#[derive(Debug, Default)]
pub struct EchoLlm {
    prompts: Mutex<Vec<String>>,
}

impl EchoLlm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LanguageModel for EchoLlm {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_records_prompts() {
        let llm = EchoLlm::new();
        assert_eq!(llm.complete("one").unwrap(), "one");
        assert_eq!(llm.complete("two").unwrap(), "two");
        assert_eq!(llm.prompts(), vec!["one", "two"]);
        assert_eq!(llm.model_name(), "echo");
    }
}
