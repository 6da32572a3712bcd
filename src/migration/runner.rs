/*!
 * Concurrent execution of file migrations.
 *
 * Files are migrated by at most `workers` tasks at once. A failing file is
 * recorded and logged as a warning; it never stops the other files.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use super::{FileMigration, MigrationContext};

/// Outcome of a migration run
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Source files migrated with their written outputs
    pub succeeded: Vec<(PathBuf, Vec<PathBuf>)>,
    /// Source files that failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Files that had no strategy
    pub skipped: usize,
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Migration completed: {} migrated, {} skipped, {} failed in {:.1}s",
            self.succeeded.len(),
            self.skipped,
            self.failed.len(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Runs file migrations with bounded concurrency
pub struct MigrationRunner {
    context: Arc<MigrationContext>,
    workers: usize,
    show_progress: bool,
}

impl MigrationRunner {
    pub fn new(context: Arc<MigrationContext>, workers: usize) -> Self {
        Self {
            context,
            workers: workers.max(1),
            show_progress: true,
        }
    }

    /// Hide the progress bar (tests, non-interactive runs)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Migrating files");
        progress_bar
    }

    /// Execute every migration and report per-file outcomes
    pub async fn run(&self, migrations: Vec<FileMigration>) -> MigrationReport {
        let start_time = Instant::now();
        info!("Executing {} migration strategies...", migrations.len());

        let progress_bar = self.progress_bar(migrations.len());
        let mut report = MigrationReport::default();

        let mut results = stream::iter(migrations)
            .map(|migration| {
                let context = self.context.clone();
                async move {
                    let result = migration.execute(&context).await;
                    (migration, result)
                }
            })
            .buffer_unordered(self.workers);

        while let Some((migration, result)) = results.next().await {
            match result {
                Ok(written) => {
                    progress_bar.set_message(format!("Migrated: {}", migration.source_file().display()));
                    report.succeeded.push((migration.source_file().to_path_buf(), written));
                }
                Err(e) => {
                    warn!("Failed to execute {}: {}", migration, e);
                    report.failed.push((migration.source_file().to_path_buf(), e.to_string()));
                }
            }
            progress_bar.inc(1);
        }

        progress_bar.finish_with_message("Migration complete");
        report.succeeded.sort();
        report.failed.sort();
        report.elapsed = start_time.elapsed();
        report
    }
}
