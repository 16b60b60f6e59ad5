//! Mock LLM provider for testing
//!
//! This module provides a mock implementation of the `LlmProvider` trait
//! that can be configured to return predefined responses or errors,
//! without making real API calls. Every call is counted and its prompt recorded.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{Error, llms::LlmProvider};

/// Mock LLM provider for testing
///
/// Can be configured to:
/// - Return specific responses based on prompt content (first matching key wins)
/// - Return a default response for any prompt
/// - Simulate API failures
pub struct MockLlmProvider {
    /// Prompt substrings and their responses, checked in insertion order
    responses: Vec<(String, String)>,
    /// Default response if no specific match found
    default_response: Option<String>,
    /// If true, always return an error
    should_fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    /// Create a new empty mock provider
    pub fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_response: None,
            should_fail: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns a specific response when the prompt contains the given text
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let mut provider = Self::new();
        provider.add_response(prompt_contains, response);
        provider
    }

    /// Create a mock with multiple configured responses
    pub fn with_responses(responses: Vec<(&str, &str)>) -> Self {
        let mut provider = Self::new();
        for (prompt_part, response) in responses {
            provider.add_response(prompt_part, response);
        }
        provider
    }

    /// Create a mock with a default response for any prompt
    pub fn with_default(response: &str) -> Self {
        let mut provider = Self::new();
        provider.set_default(response);
        provider
    }

    /// Create a mock that always fails with an error
    pub fn with_failure() -> Self {
        let mut provider = Self::new();
        provider.set_should_fail(true);
        provider
    }

    /// Analysis prompts get `analysis`, repair prompts get `repair`.
    pub fn with_analysis_and_repair(analysis: &str, repair: &str) -> Self {
        Self::with_responses(vec![(ANALYSIS_PROMPT_KEY, analysis), (REPAIR_PROMPT_KEY, repair)])
    }

    /// Create a mock that answers every prompt with schema-conformant output
    pub fn with_valid_output() -> Self {
        Self::with_default(sample_valid_output())
    }

    /// Add a response mapping to this provider
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses.push((prompt_contains.to_string(), response.to_string()));
    }

    /// Set the default response
    pub fn set_default(&mut self, response: &str) {
        self.default_response = Some(response.to_string());
    }

    /// Set whether this provider should fail
    pub fn set_should_fail(&mut self, should_fail: bool) {
        self.should_fail = should_fail;
    }

    /// Number of prompts received, including failed calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of received prompts containing `needle`.
    pub fn count_prompts_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete_prompt(&self, prompt: &str) -> Result<String, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if self.should_fail {
            return Err(Error::ModelUnavailable("Mock LLM provider configured to fail".to_string()));
        }

        // Try to find a matching response based on prompt content
        for (key, response) in &self.responses {
            if prompt.contains(key.as_str()) {
                return Ok(response.clone());
            }
        }

        // Use default response if available
        if let Some(default) = &self.default_response {
            return Ok(default.clone());
        }

        // No response configured
        Err(Error::ModelUnavailable(
            "Mock LLM provider has no response configured for this prompt".to_string(),
        ))
    }
}

//
// Test Fixtures
//

/// Text only the analysis prompt contains.
pub const ANALYSIS_PROMPT_KEY: &str = "in one word";

/// Text only the repair prompt contains.
pub const REPAIR_PROMPT_KEY: &str = "did not satisfy the constraints";

/// Output for `#!/bin/bash\npython train.py` that passes validation
pub fn sample_valid_output() -> &'static str {
    r#"{"language": "Python", "module": ["bash"], "package": [], "technique": ["batch-scripting"], "summary": "Runs a training script via bash."}"#
}

/// Valid output wrapped in a fenced block with chatter around it, as chat models tend to answer
pub fn sample_fenced_output() -> &'static str {
    r#"Here is the analysis of the script:

```json
{
  "language": "bash",
  "module": ["cuda", "python"],
  "package": ["torch"],
  "technique": ["distributed-training", "gpu"],
  "summary": "Loads CUDA and Python modules and launches distributed PyTorch training with srun."
}
```

Let me know if you need anything else."#
}

/// Prose with no JSON in it
pub fn sample_prose_output() -> &'static str {
    "The script is a bash script that runs a Python training program."
}

/// JSON that is missing the required `summary` field
pub fn sample_missing_field_output() -> &'static str {
    r#"{"language": "Python", "module": ["bash"], "package": [], "technique": ["batch-scripting"]}"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_with_default_response() {
        let provider = MockLlmProvider::with_default("test response");
        let result = provider.complete_prompt("any prompt").await.unwrap();
        assert_eq!(result, "test response");
    }

    #[tokio::test]
    async fn test_mock_with_specific_response() {
        let provider = MockLlmProvider::with_response("analyze", "analysis");

        let result = provider.complete_prompt("analyze this script").await.unwrap();
        assert_eq!(result, "analysis");
    }

    #[tokio::test]
    async fn test_mock_first_matching_key_wins() {
        let provider = MockLlmProvider::with_responses(vec![("script", "first"), ("bash script", "second")]);

        assert_eq!(provider.complete_prompt("a bash script").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let provider = MockLlmProvider::with_failure();
        let result = provider.complete_prompt("any prompt").await;
        assert!(result.is_err_and(|e| e.is_model_failure()));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_no_response_configured() {
        let provider = MockLlmProvider::new();
        let result = provider.complete_prompt("any prompt").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let provider = MockLlmProvider::with_default("ok");
        provider.complete_prompt("first").await.unwrap();
        provider.complete_prompt("second").await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.prompts(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(provider.count_prompts_containing("sec"), 1);
    }

    #[tokio::test]
    async fn test_mock_set_should_fail() {
        let mut provider = MockLlmProvider::with_default("response");
        provider.set_should_fail(true);

        let result = provider.complete_prompt("any prompt").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_fixtures_are_different() {
        assert_ne!(sample_valid_output(), sample_fenced_output());
        assert_ne!(sample_valid_output(), sample_missing_field_output());
        assert!(!sample_prose_output().contains('{'));
    }
}
