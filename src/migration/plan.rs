use std::path::{Path, PathBuf};

use log::{debug, info};

use super::FileMigration;
use crate::app_config::SourceConfig;
use crate::errors::ConfigError;
use crate::file_utils::FileManager;

/// Migrations found in a source folder
#[derive(Debug, Default)]
pub struct MigrationPlan {
    pub migrations: Vec<FileMigration>,
    /// Files without a strategy for their extension
    pub skipped: usize,
    /// Files that could not be planned, one message each
    pub warnings: Vec<String>,
}

/// Turns a source folder into file migrations
pub struct MigrationPlanner<'a> {
    source_root: PathBuf,
    destination_root: PathBuf,
    config: &'a SourceConfig,
}

impl<'a> MigrationPlanner<'a> {
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>, config: &'a SourceConfig) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            config,
        }
    }

    /// The source must be a directory holding every required entry
    pub fn verify_source(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSource {
            path: self.source_root.clone(),
            reason,
        };

        if !FileManager::dir_exists(&self.source_root) {
            return Err(invalid("not an existing directory".to_string()));
        }

        let entries = FileManager::entry_names(&self.source_root).map_err(|e| invalid(e.to_string()))?;
        for required in &self.config.required_entries {
            if !entries.contains(required) {
                return Err(invalid(format!("missing required entry '{}'", required)));
            }
        }

        Ok(())
    }

    /// Verify the source and map every file to a migration
    pub fn plan(&self) -> Result<MigrationPlan, ConfigError> {
        self.verify_source()?;

        info!("Loading source files from '{}'...", self.source_root.display());
        let files = FileManager::find_files(&self.source_root, &self.config.ignore_locations).map_err(|e| {
            ConfigError::InvalidSource {
                path: self.source_root.clone(),
                reason: e.to_string(),
            }
        })?;

        info!("Computing migration strategies for {} files...", files.len());
        let mut plan = MigrationPlan::default();
        for file in files {
            match self.plan_file(&file) {
                Ok(Some(migration)) => plan.migrations.push(migration),
                Ok(None) => plan.skipped += 1,
                Err(reason) => plan
                    .warnings
                    .push(format!("'{}' failed to create strategy: {}", file.display(), reason)),
            }
        }

        Ok(plan)
    }

    fn plan_file(&self, file: &Path) -> Result<Option<FileMigration>, String> {
        if !file.starts_with(&self.source_root) {
            return Err("file is outside of the source folder".to_string());
        }

        let Some(extension) = file.extension() else {
            debug!("No extension, skipping {}", file.display());
            return Ok(None);
        };
        let extension = extension
            .to_str()
            .ok_or_else(|| "extension is not valid UTF-8".to_string())?;

        Ok(self
            .config
            .strategies
            .get(&format!(".{}", extension))
            .map(|strategy| {
                FileMigration::new(file, &self.source_root, &self.destination_root, *strategy)
            }))
    }
}
