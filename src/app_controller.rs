use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::app_config::Config;
use crate::backends::load_backend;
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::migration::{MigrationContext, MigrationPlanner, MigrationReport, MigrationRunner};
use crate::translation::memory::TranslationMemory;

// @module: Application controller for project migration

/// Runs one project migration from a validated configuration
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Progress bar on stderr
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            show_progress: true,
        })
    }

    /// Disable the progress bar
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Migrate every file of `source` into `destination`
    ///
    /// Fails only when the run cannot start; per-file failures are in the report.
    pub async fn run(&self, source: &Path, destination: &Path) -> Result<MigrationReport, AppError> {
        let planner = MigrationPlanner::new(source, destination, &self.config.source);
        planner.verify_source()?;

        if FileManager::dir_exists(destination) {
            info!("Using existing destination folder '{}'", destination.display());
        } else {
            info!("Creating destination folder '{}'...", destination.display());
            FileManager::ensure_dir(destination).map_err(|e| AppError::File(format!("{:#}", e)))?;
        }

        let backend = load_backend(&self.config.backend)?;
        info!("Initializing '{}' backend...", self.config.backend.class_name());
        backend.initialize().await?;

        let memory = match &self.config.known_translations {
            Some(known_translations) => {
                let memory = TranslationMemory::new(known_translations.clone())?;
                // Indexing embeds every corpus entry on the ONNX runtime
                let memory = tokio::task::spawn_blocking(move || memory.initialize().map(|()| memory))
                    .await
                    .map_err(|e| AppError::Unknown(format!("translation memory loading stopped: {}", e)))??;
                info!("Loaded {} known translations", memory.len());
                Some(Arc::new(memory))
            }
            None => None,
        };

        let plan = planner.plan()?;
        for warning in &plan.warnings {
            warn!("{}", warning);
        }

        let context = Arc::new(MigrationContext::from_config(&self.config, backend, memory));
        let mut runner = MigrationRunner::new(context, self.config.concurrency.execute_strategy_workers);
        if !self.show_progress {
            runner = runner.without_progress();
        }

        let mut report = runner.run(plan.migrations).await;
        report.skipped = plan.skipped;
        info!("{}", report.summary());

        Ok(report)
    }
}
