/*!
 * OpenAI chat-completions backend.
 *
 * Sends the system instructions, the few-shot history and the user prompt as
 * one chat conversation and returns the first choice's content.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::tokens::TokenCounter;
use super::{Backend, HistoryItem};
use crate::app_config::OpenAiConfig;
use crate::errors::{BackendError, ConfigError};

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Chat completions request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Build the conversation: system first, then history in order, then the user prompt
pub fn build_messages(user: &str, system: Option<&str>, history: &[HistoryItem]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    if let Some(system) = system.filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::new("system", system));
    }

    for item in history {
        messages.push(ChatMessage::new(item.role.as_str(), &item.content));
    }

    messages.push(ChatMessage::new("user", user));
    messages
}

/// OpenAI client implementing the backend contract
#[derive(Debug)]
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
    completions_url: Url,
    tokens: TokenCounter,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBackend {
            backend: "open_ai".to_string(),
            reason,
        };

        let base = format!("{}/", config.endpoint.trim_end_matches('/'));
        let completions_url = Url::parse(&base)
            .and_then(|url| url.join("chat/completions"))
            .map_err(|e| invalid(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| invalid(format!("failed to build HTTP client: {}", e)))?;

        let tokens = TokenCounter::for_model(&config.model);

        Ok(Self {
            config,
            client,
            completions_url,
            tokens,
        })
    }

    fn extract_content(response: ChatCompletionResponse) -> Result<String, BackendError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(BackendError::MalformedResponse(
                "OpenAI returned no choices or an empty message".to_string(),
            ));
        }

        Ok(content)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        if self.config.secret_key.is_empty() {
            return Err(BackendError::Initialization(
                "OpenAI API key is required, pass it with --secret-key".to_string(),
            ));
        }
        Ok(())
    }

    async fn query(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        if log::log_enabled!(log::Level::Debug) {
            let short_query: String = user.chars().take(50).collect::<String>().replace('\n', " ");
            debug!(
                "Requesting a query for {} tokens ('{}...')",
                self.count_tokens(user),
                short_query
            );
        }

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(user, system, history),
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.completions_url.clone())
            .bearer_auth(&self.config.secret_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::RequestFailed(format!("Failed to send request to OpenAI API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("OpenAI API error ({}): {}", status, error_text);
            return Err(BackendError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| BackendError::MalformedResponse(format!("Failed to parse OpenAI API response: {}", e)))?;

        Self::extract_content(completion)
    }

    fn fits_in_one_prompt(&self, token_count: usize) -> bool {
        token_count < self.config.max_tokens
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.tokens.count(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildMessages_shouldOrderSystemHistoryUser() {
        let history = vec![HistoryItem::user("u1"), HistoryItem::assistant("a1")];
        let messages = build_messages("prompt", Some("system"), &history);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "prompt");
    }

    #[test]
    fn test_buildMessages_withoutSystem_shouldSkipIt() {
        let messages = build_messages("prompt", None, &[]);
        assert_eq!(messages, vec![ChatMessage::new("user", "prompt")]);
    }

    #[test]
    fn test_extractContent_withNoChoices_shouldBeMalformed() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenAiBackend::extract_content(response),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_extractContent_shouldReturnFirstChoice() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "func _ready():"}}]}"#,
        )
        .unwrap();
        assert_eq!(OpenAiBackend::extract_content(response).unwrap(), "func _ready():");
    }

    #[test]
    fn test_new_withCustomEndpoint_shouldJoinCompletionsPath() {
        let config = OpenAiConfig {
            endpoint: "http://localhost:1234/v1/".to_string(),
            ..OpenAiConfig::default()
        };
        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(backend.completions_url.as_str(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_fitsInOnePrompt_shouldUseMaxTokensExclusively() {
        let config = OpenAiConfig {
            max_tokens: 100,
            ..OpenAiConfig::default()
        };
        let backend = OpenAiBackend::new(config).unwrap();
        assert!(backend.fits_in_one_prompt(99));
        assert!(!backend.fits_in_one_prompt(100));
    }

    #[test]
    fn test_countTokens_shouldUseModelEncoding() {
        let backend = OpenAiBackend::new(OpenAiConfig::default()).unwrap();
        assert_eq!(backend.count_tokens("hello world"), 2);
    }

    #[tokio::test]
    async fn test_initialize_withoutKey_shouldFail() {
        let backend = OpenAiBackend::new(OpenAiConfig::default()).unwrap();
        assert!(matches!(backend.initialize().await, Err(BackendError::Initialization(_))));
    }
}
