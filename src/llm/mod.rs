//! Grading-model client.
//!
//! Rubric and agentic graders ask a chat-completion model to judge agent
//! output. They depend only on the [`LlmProvider`] trait; the OpenRouter
//! provider is the production implementation.

pub mod providers;

pub use providers::OpenRouterProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub model: String,
    pub content: String,
}

/// Trait for models that can judge agent output.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Extract the first complete JSON object from a model reply.
///
/// Handles bare JSON, fenced code blocks, and objects embedded in prose.
pub fn extract_json_object(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let mut search = trimmed;
    while let Some(start) = search.find('{') {
        let candidate = &search[start..];
        if let Some(end) = find_matching_brace(candidate) {
            if let Ok(value @ serde_json::Value::Object(_)) =
                serde_json::from_str(&candidate[..=end])
            {
                return Some(value);
            }
        }
        search = &candidate[1..];
    }
    None
}

/// Index of the brace closing the object that opens at byte 0.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_json() {
        let v = extract_json_object(r#"{"score": 1.0, "reasoning": "ok"}"#).unwrap();
        assert_eq!(v["score"], 1.0);
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "Here is my verdict:\n```json\n{\"passed\": true, \"note\": \"a } in text\"}\n```";
        let v = extract_json_object(reply).unwrap();
        assert_eq!(v["passed"], true);
        assert_eq!(v["note"], "a } in text");
    }

    #[test]
    fn test_extract_skips_invalid_prefix() {
        let reply = "template {not json} then {\"action\": \"bash\", \"command\": \"ls\"}";
        let v = extract_json_object(reply).unwrap();
        assert_eq!(v["action"], "bash");
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{\"unterminated\": ").is_none());
    }
}
