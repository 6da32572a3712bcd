/*!
 * Ollama backend.
 *
 * Talks to a local Ollama server through `/api/chat`. Streaming is disabled in
 * the request, but some server versions still answer with JSON lines, so the
 * parser accepts both shapes.
 */

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::openai::{build_messages, ChatMessage};
use super::tokens::estimate_token_count;
use super::{Backend, HistoryItem};
use crate::app_config::OllamaConfig;
use crate::errors::{BackendError, ConfigError};

/// Model parameters of a chat request
#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Context window, sized after the configured capacity
    num_ctx: usize,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    options: ChatOptions,
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

/// Ollama client implementing the backend contract
#[derive(Debug)]
pub struct OllamaBackend {
    config: OllamaConfig,
    client: Client,
    chat_url: String,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint.trim_end_matches('/');
        url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidBackend {
            backend: "ollama".to_string(),
            reason: format!("invalid endpoint '{}': {}", config.endpoint, e),
        })?;
        let chat_url = format!("{}/api/chat", endpoint);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidBackend {
                backend: "ollama".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            client,
            chat_url,
        })
    }

    /// Parse a chat answer, either one JSON object or a stream of JSON lines
    fn parse_chat_response(response_text: &str) -> Result<String, BackendError> {
        let content = match serde_json::from_str::<ChatResponse>(response_text) {
            Ok(chat_response) => chat_response.message.content,
            Err(e) => {
                let lines: Vec<ChatResponse> = response_text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .filter_map(|line| serde_json::from_str::<ChatResponse>(line).ok())
                    .collect();

                if lines.is_empty() {
                    let preview: String = response_text.chars().take(500).collect();
                    error!("Failed to parse Ollama API chat response: {}. Raw response (first 500 chars): {}", e, preview);
                    return Err(BackendError::MalformedResponse(format!(
                        "Failed to parse Ollama API chat response: {}",
                        e
                    )));
                }

                if !lines.iter().any(|line| line.done) {
                    debug!("Ollama stream ended without a done message");
                }

                lines.into_iter().map(|line| line.message.content).collect()
            }
        };

        if content.is_empty() {
            return Err(BackendError::MalformedResponse(
                "Ollama returned an empty message".to_string(),
            ));
        }

        Ok(content)
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn query(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: build_messages(user, system, history),
            options: ChatOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.max_tokens,
            },
            stream: false,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::RequestFailed(format!("Failed to send chat request to Ollama API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(BackendError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| BackendError::RequestFailed(format!("Failed to get response text from Ollama API: {}", e)))?;

        Self::parse_chat_response(&response_text)
    }

    fn fits_in_one_prompt(&self, token_count: usize) -> bool {
        token_count < self.config.max_tokens
    }

    fn count_tokens(&self, text: &str) -> usize {
        estimate_token_count(text)
    }
}
