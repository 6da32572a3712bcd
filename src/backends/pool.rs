/*!
 * Parallel dispatcher.
 *
 * `PooledBackend` wraps an inner backend declaration and executes its queries
 * in a fixed pool of worker processes (see `worker`). Capacity checks and token
 * counts are answered by a local, non-pooled instance of the same backend.
 *
 * The pool is created on first use and then shared by every clone of the
 * owning `Arc`. Each worker process is owned by one supervisor task which
 * takes jobs from a shared queue, one at a time. A worker that hangs past the
 * timeout or dies is killed and respawned for the next job.
 */

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use once_cell::sync::OnceCell;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::worker::{WorkerOutcome, WorkerRequest, WorkerResponse};
use super::{Backend, HistoryItem, load_backend};
use crate::app_config::{BackendConfig, PoolConfig};
use crate::errors::{BackendError, ConfigError};

type Reply = oneshot::Sender<Result<String, BackendError>>;

struct Job {
    request: WorkerRequest,
    reply: Reply,
}

/// How worker processes are started
#[derive(Debug, Clone)]
struct WorkerLauncher {
    program: PathBuf,
    backend_json: String,
}

impl WorkerLauncher {
    fn spawn(&self) -> Result<WorkerProcess, BackendError> {
        let mut child = Command::new(&self.program)
            .arg("worker")
            .arg("--backend")
            .arg(&self.backend_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::WorkerUnavailable(format!(
                    "failed to start worker '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            BackendError::WorkerUnavailable("worker stdin is not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            BackendError::WorkerUnavailable("worker stdout is not captured".to_string())
        })?;

        Ok(WorkerProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }
}

/// One live worker process
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    /// Send one request and read its answer. `Err` means the worker itself is unusable.
    async fn roundtrip(&mut self, request: &WorkerRequest) -> Result<WorkerOutcome, BackendError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| BackendError::WorkerFailed(format!("failed to encode request: {}", e)))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BackendError::WorkerFailed(format!("failed to send request to worker: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| BackendError::WorkerFailed(format!("failed to send request to worker: {}", e)))?;

        let answer = self
            .stdout
            .next_line()
            .await
            .map_err(|e| BackendError::WorkerFailed(format!("failed to read worker response: {}", e)))?
            .ok_or_else(|| BackendError::WorkerFailed("worker process exited while serving the query".to_string()))?;

        let response: WorkerResponse = serde_json::from_str(&answer)
            .map_err(|e| BackendError::WorkerFailed(format!("malformed worker response: {}", e)))?;

        if response.id != request.id {
            return Err(BackendError::WorkerFailed(format!(
                "worker answered request {} instead of {}",
                response.id, request.id
            )));
        }

        Ok(response.outcome)
    }

    fn kill(mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Worker already gone: {}", e);
        }
    }
}

/// Fixed-size pool of worker processes fed from one job queue
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    timeout: Duration,
    next_id: AtomicU64,
    supervisors: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start the supervisors; processes are spawned lazily on their first job.
    /// Must be called from within a tokio runtime.
    fn start(launcher: WorkerLauncher, config: &PoolConfig) -> Self {
        let timeout = Duration::from_secs(config.query_timeout_secs);
        let (sender, receiver) = mpsc::channel::<Job>(config.num_workers * 4);
        let receiver = Arc::new(Mutex::new(receiver));

        let supervisors = (0..config.num_workers)
            .map(|index| {
                tokio::spawn(supervise(
                    index,
                    Arc::clone(&receiver),
                    launcher.clone(),
                    timeout,
                ))
            })
            .collect();

        debug!(
            "Started worker pool: {} workers, {}s query timeout",
            config.num_workers, config.query_timeout_secs
        );

        Self {
            sender,
            timeout,
            next_id: AtomicU64::new(1),
            supervisors,
        }
    }

    /// Submit one query and wait for it, bounded by the pool timeout
    pub async fn execute(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        let (reply, answer) = oneshot::channel();
        let job = Job {
            request: WorkerRequest {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                user: user.to_string(),
                system: system.map(str::to_string),
                history: history.to_vec(),
            },
            reply,
        };

        let waited = tokio::time::timeout(self.timeout, async {
            self.sender
                .send(job)
                .await
                .map_err(|_| BackendError::WorkerUnavailable("worker pool is shut down".to_string()))?;

            answer
                .await
                .map_err(|_| BackendError::WorkerUnavailable("worker pool dropped the query".to_string()))?
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for supervisor in &self.supervisors {
            supervisor.abort();
        }
    }
}

/// Owns one worker slot: takes jobs from the queue and serves them one by one
async fn supervise(
    index: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    launcher: WorkerLauncher,
    timeout: Duration,
) {
    let mut worker: Option<WorkerProcess> = None;

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(mut job) = job else {
            break;
        };

        // The caller already gave up while the job was queued
        if job.reply.is_closed() {
            continue;
        }

        let mut process = match worker.take() {
            Some(process) => process,
            None => match launcher.spawn() {
                Ok(process) => {
                    debug!("Worker {} started", index);
                    process
                }
                Err(e) => {
                    error!("Worker {} failed to start: {}", index, e);
                    let _ = job.reply.send(Err(e));
                    continue;
                }
            },
        };

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, process.roundtrip(&job.request)) => result,
            _ = job.reply.closed() => {
                warn!("Query {} abandoned by its caller, restarting worker {}", job.request.id, index);
                process.kill();
                continue;
            }
        };

        let outcome = match result {
            Ok(Ok(WorkerOutcome::Response(response))) => {
                worker = Some(process);
                Ok(response)
            }
            Ok(Ok(WorkerOutcome::Failure(reason))) => {
                worker = Some(process);
                Err(BackendError::WorkerFailed(reason))
            }
            Ok(Err(e)) => {
                warn!("Worker {} failed, restarting it on next use: {}", index, e);
                process.kill();
                Err(e)
            }
            Err(_) => {
                warn!("Worker {} timed out, restarting it on next use", index);
                process.kill();
                Err(BackendError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
        };

        let _ = job.reply.send(outcome);
    }

    if let Some(process) = worker {
        process.kill();
    }
}

/// Backend running another backend in worker processes
pub struct PooledBackend {
    pool_config: PoolConfig,
    launcher: WorkerLauncher,
    local: Arc<dyn Backend>,
    pool: OnceCell<Arc<WorkerPool>>,
}

impl std::fmt::Debug for PooledBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBackend")
            .field("pool_config", &self.pool_config)
            .field("local", &self.local)
            .field("started", &self.pool.get().is_some())
            .finish()
    }
}

impl PooledBackend {
    pub fn new(inner: BackendConfig, pool_config: PoolConfig) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBackend {
            backend: "pooled".to_string(),
            reason,
        };

        if matches!(inner, BackendConfig::Pooled { .. }) {
            return Err(invalid("a pooled backend cannot wrap another pooled backend".to_string()));
        }
        if pool_config.num_workers == 0 {
            return Err(invalid("num_workers must be greater than zero".to_string()));
        }
        if pool_config.query_timeout_secs == 0 {
            return Err(invalid("query_timeout_secs must be greater than zero".to_string()));
        }

        let program = match &pool_config.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()
                .map_err(|e| invalid(format!("cannot locate the worker executable: {}", e)))?,
        };

        let backend_json = serde_json::to_string(&inner)
            .map_err(|e| invalid(format!("cannot serialize inner backend: {}", e)))?;

        let local = load_backend(&inner)?;

        Ok(Self {
            pool_config,
            launcher: WorkerLauncher {
                program,
                backend_json,
            },
            local,
            pool: OnceCell::new(),
        })
    }

    /// The shared pool, started on first call; later calls return the same pool
    fn pool(&self) -> Arc<WorkerPool> {
        Arc::clone(
            self.pool
                .get_or_init(|| Arc::new(WorkerPool::start(self.launcher.clone(), &self.pool_config))),
        )
    }
}

#[async_trait]
impl Backend for PooledBackend {
    async fn initialize(&self) -> Result<(), BackendError> {
        self.local.initialize().await?;
        self.pool();
        Ok(())
    }

    async fn query(
        &self,
        user: &str,
        system: Option<&str>,
        history: &[HistoryItem],
    ) -> Result<String, BackendError> {
        self.pool().execute(user, system, history).await
    }

    fn fits_in_one_prompt(&self, token_count: usize) -> bool {
        self.local.fits_in_one_prompt(token_count)
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.local.count_tokens(text)
    }
}
