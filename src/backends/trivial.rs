use async_trait::async_trait;

use super::{Backend, HistoryItem};
use crate::errors::BackendError;

/// Backend that answers every query with the prompt itself.
///
/// Used to wire up new pipelines and as the inner backend of worker-pool tests.
#[derive(Debug, Default, Clone)]
pub struct TrivialBackend;

impl TrivialBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for TrivialBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn query(
        &self,
        user: &str,
        _system: Option<&str>,
        _history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        Ok(user.to_string())
    }

    fn fits_in_one_prompt(&self, _token_count: usize) -> bool {
        true
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_shouldEchoUserPrompt() {
        let backend = TrivialBackend::new();
        let response = backend.query("QUERY 7", Some("sys"), &[]).await.unwrap();
        assert_eq!(response, "QUERY 7");
    }

    #[test]
    fn test_countTokens_shouldCountCharacters() {
        assert_eq!(TrivialBackend::new().count_tokens("some text"), 9);
    }
}
