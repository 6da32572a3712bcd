/*!
 * Integration tests for the worker process pool, driven through the real binary
 */

use std::sync::Arc;

use futures::future::join_all;

use codeferry::app_config::BackendConfig;
use codeferry::backends::mock::{MockBehavior, MockConfig};
use codeferry::backends::pool::PooledBackend;
use codeferry::backends::{Backend, HistoryItem, load_backend};
use codeferry::errors::BackendError;
use crate::common;

fn mock(behavior: MockBehavior) -> BackendConfig {
    BackendConfig::Mock(MockConfig {
        behavior,
        capacity: None,
    })
}

async fn started(inner: BackendConfig, num_workers: usize, query_timeout_secs: u64) -> PooledBackend {
    common::init_logging();
    let backend = PooledBackend::new(inner, common::pool_config(num_workers, query_timeout_secs)).unwrap();
    backend.initialize().await.unwrap();
    backend
}

/// 200 concurrent queries on 5 workers each get their own answer back
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_query_withManyConcurrentCalls_shouldAnswerEachCallItself() {
    let backend = Arc::new(started(BackendConfig::Trivial, 5, 60).await);

    let calls = (0..200).map(|i| {
        let backend = Arc::clone(&backend);
        async move {
            let query = format!("QUERY {}", i);
            let response = backend.query(&query, None, &[]).await;
            (query, response)
        }
    });

    for (query, response) in join_all(calls).await {
        assert_eq!(response.unwrap(), query);
    }

    assert_eq!(backend.count_tokens("some text"), 9);
    assert!(backend.fits_in_one_prompt(123));
}

/// System prompt and history travel through the wire protocol
#[tokio::test]
async fn test_query_withHistory_shouldReachTheWorker() {
    let backend = started(BackendConfig::Trivial, 1, 30).await;
    let history = vec![HistoryItem::user("a"), HistoryItem::assistant("b")];

    let response = backend.query("multi\nline\nprompt", Some("system"), &history).await;
    assert_eq!(response.unwrap(), "multi\nline\nprompt");
}

/// A hanging worker is abandoned after the timeout
#[tokio::test]
async fn test_query_withSlowWorker_shouldTimeOut() {
    let backend = started(mock(MockBehavior::Slow { delay_ms: 10_000 }), 1, 1).await;

    let result = backend.query("QUERY", None, &[]).await;
    assert_eq!(result, Err(BackendError::Timeout { seconds: 1 }));
}

/// A backend error inside the worker is relayed and the worker keeps serving
#[tokio::test]
async fn test_query_withFailingBackend_shouldRelayTheCause() {
    let backend = started(mock(MockBehavior::Failing), 1, 30).await;

    for _ in 0..2 {
        match backend.query("QUERY", None, &[]).await {
            Err(BackendError::WorkerFailed(reason)) => {
                assert!(reason.contains("Simulated backend failure"), "reason: {}", reason)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}

/// A panic inside the worker fails only that call
#[tokio::test]
async fn test_query_withPanickingBackend_shouldReportFailure() {
    let backend = started(mock(MockBehavior::Panicking), 2, 30).await;

    match backend.query("QUERY", None, &[]).await {
        Err(BackendError::WorkerFailed(reason)) => assert!(reason.contains("panic"), "reason: {}", reason),
        other => panic!("unexpected result {:?}", other),
    }
}

/// A worker dying mid-call fails the call; the next call gets a fresh worker
#[tokio::test]
async fn test_query_withExitingWorker_shouldFailAndRespawn() {
    let backend = started(mock(MockBehavior::Exit { code: 3 }), 1, 30).await;

    for _ in 0..2 {
        match backend.query("QUERY", None, &[]).await {
            Err(BackendError::WorkerFailed(reason)) => assert!(reason.contains("exited"), "reason: {}", reason),
            other => panic!("unexpected result {:?}", other),
        }
    }
}

/// Intermittent failures do not affect the calls around them
#[tokio::test]
async fn test_query_withIntermittentBackend_shouldOnlyFailScriptedCalls() {
    let backend = started(mock(MockBehavior::Intermittent { fail_every: 2 }), 1, 30).await;

    assert_eq!(backend.query("first", None, &[]).await.unwrap(), "first");
    assert!(matches!(
        backend.query("second", None, &[]).await,
        Err(BackendError::WorkerFailed(_))
    ));
    assert_eq!(backend.query("third", None, &[]).await.unwrap(), "third");
}

/// The pooled declaration loads through the regular backend factory
#[tokio::test]
async fn test_loadBackend_withPooledDeclaration_shouldServeQueries() {
    let backend = load_backend(&common::pooled(BackendConfig::Trivial, 2, 30)).unwrap();
    backend.initialize().await.unwrap();

    assert_eq!(backend.query("QUERY 42", None, &[]).await.unwrap(), "QUERY 42");
}
