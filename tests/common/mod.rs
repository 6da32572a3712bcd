/*!
 * Common test utilities for the codeferry test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use codeferry::app_config::{BackendConfig, PoolConfig};

/// Routes library logs to the test output (`RUST_LOG=debug cargo test` to see them)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content, creating parent folders
pub fn create_test_file(dir: &Path, relative_path: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(relative_path);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Helper to get the absolute path to a test resource
pub fn test_resource_path(relative_path: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("resources");
    path.push(relative_path);
    path
}

/// Reads a test resource
pub fn load_resource(relative_path: &str) -> String {
    fs::read_to_string(test_resource_path(relative_path)).unwrap()
}

/// Creates a minimal Unity project layout holding the given scripts under Assets/
pub fn create_unity_project(dir: &Path, scripts: &[(&str, &str)]) -> Result<()> {
    fs::create_dir_all(dir.join("ProjectSettings"))?;
    fs::create_dir_all(dir.join("Assets"))?;
    for (name, content) in scripts {
        create_test_file(dir, &format!("Assets/{}", name), content)?;
    }
    Ok(())
}

/// The codeferry binary, used as worker program
pub fn worker_program() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_codeferry"))
}

pub fn pool_config(num_workers: usize, query_timeout_secs: u64) -> PoolConfig {
    PoolConfig {
        num_workers,
        query_timeout_secs,
        worker_program: Some(worker_program()),
    }
}

/// A pooled declaration around `inner`
pub fn pooled(inner: BackendConfig, num_workers: usize, query_timeout_secs: u64) -> BackendConfig {
    BackendConfig::Pooled {
        inner: Box::new(inner),
        pool: pool_config(num_workers, query_timeout_secs),
    }
}
