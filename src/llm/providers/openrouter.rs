//! OpenRouter chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider, Message};

/// Default OpenRouter API endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Grading-model provider backed by OpenRouter (or any compatible proxy).
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    /// Create a provider against the public OpenRouter endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, OPENROUTER_BASE_URL)
    }

    /// Create a provider against an OpenRouter-compatible base URL.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute_with_retry(&self, request: &ApiRequest) -> Result<GenerationResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(attempt = attempt + 1, delay_ms, "Retrying grading-model request");
            }

            match self.execute_request(&url, request).await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("max retries exceeded".to_string())
        }))
    }

    async fn execute_request(
        &self,
        url: &str,
        request: &ApiRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let http_response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let text = http_response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            if code == 429 {
                return Err(LlmError::RateLimited(message));
            }
            return Err(LlmError::ApiError { code, message });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("failed to parse API response: {e}")))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::ParseError("response has no choices".to_string()))?;

        Ok(GenerationResponse {
            model: api_response.model,
            content,
        })
    }
}

fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout") || msg.contains("connection") || msg.contains("temporarily")
        }
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500,
        _ => false,
    }
}

/// OpenRouter model id for `model`. Ids that already name a provider pass
/// through; bare Anthropic, OpenAI and Google names get their prefix, and a
/// trailing `-<major>-<minor>` Claude version becomes `-<major>.<minor>`.
pub fn openrouter_model_id(model: &str) -> String {
    if model.contains('/') {
        return model.to_string();
    }
    if model.starts_with("claude-") {
        return format!("anthropic/{}", dotted_claude_version(model));
    }
    let provider = if model.starts_with("gpt-")
        || model
            .strip_prefix('o')
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit())) {
        "openai"
    } else if model.starts_with("gemini-") {
        "google"
    } else {
        return model.to_string();
    };
    format!("{provider}/{model}")
}

fn dotted_claude_version(model: &str) -> String {
    let parts: Vec<&str> = model.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [minor, major, stem]
            if [minor, major]
                .iter()
                .all(|p| !p.is_empty() && p.len() <= 2 && p.bytes().all(|b| b.is_ascii_digit())) =>
        {
            format!("{stem}-{major}.{minor}")
        }
        _ => model.to_string(),
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_request = ApiRequest {
            model: openrouter_model_id(&request.model),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        self.execute_with_retry(&api_request).await
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            OpenRouterProvider::new(""),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let p = OpenRouterProvider::with_base_url("k", "http://localhost:4000/v1/").unwrap();
        assert_eq!(p.base_url(), "http://localhost:4000/v1");
    }

    #[test]
    fn test_model_ids_get_provider_prefix() {
        assert_eq!(openrouter_model_id("claude-opus-4-6"), "anthropic/claude-opus-4.6");
        assert_eq!(openrouter_model_id("claude-sonnet-4"), "anthropic/claude-sonnet-4");
        assert_eq!(
            openrouter_model_id("claude-3-5-sonnet-20241022"),
            "anthropic/claude-3-5-sonnet-20241022"
        );
        assert_eq!(openrouter_model_id("anthropic/claude-sonnet-4"), "anthropic/claude-sonnet-4");
        assert_eq!(openrouter_model_id("gpt-4o"), "openai/gpt-4o");
        assert_eq!(openrouter_model_id("o3-mini"), "openai/o3-mini");
        assert_eq!(openrouter_model_id("gemini-2.5-pro"), "google/gemini-2.5-pro");
        assert_eq!(openrouter_model_id("mistral-large"), "mistral-large");
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_error(&LlmError::RateLimited("slow down".into())));
        assert!(is_transient_error(&LlmError::ApiError {
            code: 503,
            message: String::new()
        }));
        assert!(!is_transient_error(&LlmError::ApiError {
            code: 401,
            message: String::new()
        }));
        assert!(!is_transient_error(&LlmError::ParseError("bad".into())));
    }
}
