/*!
 * Mock backend for testing.
 *
 * This module provides a backend that simulates different behaviours:
 * - `MockBackend::echo()` - Always succeeds, answering with the prompt
 * - `MockBackend::intermittent(n)` - Fails every n-th request
 * - `MockBackend::failing()` - Always fails with an error
 *
 * The behaviour is serializable so the same scripts can run inside worker
 * processes of the parallel dispatcher.
 */

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{Backend, HistoryItem, TranslationRequest};
use crate::errors::BackendError;

/// Behaviour mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MockBehavior {
    /// Always succeeds, answering with the prompt (or the custom responder)
    #[default]
    Echo,
    /// Fails every `fail_every`-th request
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns an empty response
    Empty,
    /// Sleeps before answering (for timeout testing)
    Slow { delay_ms: u64 },
    /// Panics inside the query
    Panicking,
    /// Terminates the hosting process (for worker crash testing)
    Exit { code: i32 },
}

/// Serializable mock declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MockConfig {
    #[serde(default)]
    pub behavior: MockBehavior,

    /// Capacity in tokens (characters); `None` means everything fits
    #[serde(default)]
    pub capacity: Option<usize>,
}

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Mock backend for testing orchestration and dispatch behaviour
#[derive(Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    capacity: Option<usize>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
    responder: Option<Responder>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("behavior", &self.behavior)
            .field("capacity", &self.capacity)
            .field("request_count", &self.request_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockBackend {
    /// Create a new mock backend with the specified behaviour
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            capacity: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            responder: None,
        }
    }

    pub fn from_config(config: &MockConfig) -> Self {
        let mut backend = Self::new(config.behavior);
        backend.capacity = config.capacity;
        backend
    }

    /// Create a mock that always answers with the prompt
    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    /// Create a mock that always fails
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock failing every `fail_every`-th request
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Limit the prompt size; prompts of `capacity` characters or more do not fit
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Answer successful queries with a custom function of the prompt
    pub fn with_responder(mut self, responder: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Number of queries received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    fn respond(&self, user: &str) -> String {
        match &self.responder {
            Some(responder) => responder(user),
            None => user.to_string(),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn query(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(TranslationRequest {
            prompt: user.to_string(),
            system_instructions: system.map(str::to_string),
            history: history.to_vec(),
        });

        match self.behavior {
            MockBehavior::Echo => Ok(self.respond(user)),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(BackendError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(self.respond(user))
                }
            }

            MockBehavior::Failing => Err(BackendError::RequestFailed(
                "Simulated backend failure".to_string(),
            )),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                Ok(self.respond(user))
            }

            MockBehavior::Panicking => panic!("Simulated backend panic"),

            MockBehavior::Exit { code } => std::process::exit(code),
        }
    }

    fn fits_in_one_prompt(&self, token_count: usize) -> bool {
        self.capacity.is_none_or(|capacity| token_count < capacity)
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}
