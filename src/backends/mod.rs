/*!
 * Translation backends.
 *
 * This module contains the contract every text-generation backend implements and
 * the implementations shipped with the tool:
 * - `trivial`: echoes the prompt back, used as a wiring example and in tests
 * - `mock`: scripted behaviours for exercising failure paths
 * - `openai`: OpenAI chat-completions client
 * - `ollama`: local model runner served by Ollama
 * - `pool`: the parallel dispatcher, running another backend in worker processes
 */

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_config::BackendConfig;
use crate::errors::{BackendError, ConfigError};

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod pool;
pub mod tokens;
pub mod trivial;
pub mod worker;

/// Author of a conversation history item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name as used by chat APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One previous exchange supplied to the backend as few-shot context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
}

impl HistoryItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single backend call: the prompt plus optional system instructions and history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryItem>,
}

impl TranslationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system_instructions = system;
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }
}

/// Common contract for all translation backends
///
/// The orchestrator only ever talks to this trait, so a remote API, a local
/// model and a test double are interchangeable.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Prepare the backend for queries. Calling it again is a no-op.
    async fn initialize(&self) -> Result<(), BackendError>;

    /// Send one prompt and return the raw response text
    async fn query(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError>;

    /// Whether a prompt of `token_count` tokens can be sent in one call
    fn fits_in_one_prompt(&self, token_count: usize) -> bool;

    /// Size of `text` in the backend's own units
    fn count_tokens(&self, text: &str) -> usize;

    /// Capacity check on raw text
    fn fits(&self, text: &str) -> bool {
        self.fits_in_one_prompt(self.count_tokens(text))
    }

    /// Send a prepared request
    async fn submit(&self, request: &TranslationRequest) -> Result<String, BackendError> {
        self.query(
            &request.prompt,
            request.system_instructions.as_deref(),
            &request.history,
        )
        .await
    }
}

/// Build the backend declared in the configuration
pub fn load_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>, ConfigError> {
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::Trivial => Arc::new(trivial::TrivialBackend::new()),
        BackendConfig::Mock(mock_config) => Arc::new(mock::MockBackend::from_config(mock_config)),
        BackendConfig::OpenAi(openai_config) => {
            Arc::new(openai::OpenAiBackend::new(openai_config.clone())?)
        }
        BackendConfig::Ollama(ollama_config) => {
            Arc::new(ollama::OllamaBackend::new(ollama_config.clone())?)
        }
        BackendConfig::Pooled { inner, pool } => {
            Arc::new(pool::PooledBackend::new(inner.as_ref().clone(), pool.clone())?)
        }
    };

    Ok(backend)
}
