/*!
 * Worker process side of the parallel dispatcher.
 *
 * A worker is the same executable started with the hidden `worker`
 * subcommand. It reads one JSON request per line from stdin, runs it against
 * its own instance of the inner backend and writes one JSON response per line
 * to stdout. Logs go to stderr so they never mix with responses.
 *
 * Backend errors and panics are captured here and relayed as failures, so a
 * misbehaving query never takes the worker down with it.
 */

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{Backend, HistoryItem, load_backend};
use crate::app_config::BackendConfig;

/// Query sent from the pool to a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: u64,
    pub user: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

/// Result of one query inside the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Response(String),
    Failure(String),
}

/// Answer sent from a worker back to the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: u64,
    pub outcome: WorkerOutcome,
}

/// Serve queries from stdin until it is closed
///
/// `backend_json` is the serialized inner backend declaration. If the backend
/// cannot be built or initialized the worker keeps running and answers every
/// request with the initialization failure.
pub async fn run_worker(backend_json: &str) -> Result<()> {
    let backend = match prepare_backend(backend_json).await {
        Ok(backend) => Ok(backend),
        Err(e) => {
            error!("Failed to load worker backend: {:#}", e);
            Err(format!("{:#}", e))
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read worker request")? {
        if line.trim().is_empty() {
            continue;
        }

        let request: WorkerRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                error!("Ignoring malformed worker request: {}", e);
                continue;
            }
        };

        let id = request.id;
        let outcome = match &backend {
            Ok(backend) => serve(Arc::clone(backend), request).await,
            Err(reason) => WorkerOutcome::Failure(format!("Worker backend unavailable: {}", reason)),
        };

        let mut payload = serde_json::to_string(&WorkerResponse { id, outcome })
            .context("Failed to serialize worker response")?;
        payload.push('\n');

        stdout
            .write_all(payload.as_bytes())
            .await
            .context("Failed to write worker response")?;
        stdout.flush().await.context("Failed to flush worker response")?;
    }

    debug!("Worker input closed, exiting");
    Ok(())
}

async fn prepare_backend(backend_json: &str) -> Result<Arc<dyn Backend>> {
    let config: BackendConfig =
        serde_json::from_str(backend_json).context("Failed to parse worker backend declaration")?;

    if matches!(config, BackendConfig::Pooled { .. }) {
        return Err(anyhow!("a worker cannot host another pooled backend"));
    }

    let backend = load_backend(&config)?;
    backend.initialize().await?;
    Ok(backend)
}

/// Run one query in its own task so a panic only fails this request
async fn serve(backend: Arc<dyn Backend>, request: WorkerRequest) -> WorkerOutcome {
    let id = request.id;
    let task = tokio::spawn(async move {
        backend
            .query(&request.user, request.system.as_deref(), &request.history)
            .await
    });

    match task.await {
        Ok(Ok(response)) => WorkerOutcome::Response(response),
        Ok(Err(e)) => {
            error!("Failed to query worker backend (request {}): {}", id, e);
            WorkerOutcome::Failure(e.to_string())
        }
        Err(join_error) => {
            let reason = panic_message(join_error);
            error!("Worker backend panicked (request {}): {}", id, reason);
            WorkerOutcome::Failure(format!("backend panicked: {}", reason))
        }
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }

    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
