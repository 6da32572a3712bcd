use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::MigrationContext;
use crate::app_config::{StrategyKind, TargetConfig};
use crate::errors::MigrationError;
use crate::file_utils::FileManager;
use crate::translation::extract::ExtractionMode;
use crate::translation::orchestrator::TranslatedOutput;

// Literal pattern, cannot fail to compile
static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

/// `SomeFile` -> `some_file`
pub fn camel_to_snake(name: &str) -> String {
    CAMEL_BOUNDARY.replace_all(name, "${1}_${2}").to_lowercase()
}

/// `some_file_name` -> `someFileName`; the first word is kept as is
pub fn snake_to_camel(name: &str) -> String {
    let mut words = name.split('_');
    let mut result = words.next().unwrap_or_default().to_string();

    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(&chars.as_str().to_lowercase());
        }
    }

    result
}

/// Migration of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMigration {
    source_file: PathBuf,
    source_root: PathBuf,
    destination_root: PathBuf,
    strategy: StrategyKind,
}

impl FileMigration {
    pub fn new(
        source_file: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            strategy,
        }
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Where the output with `extension` (including its dot) is written
    pub fn destination_path(&self, target: &TargetConfig, extension: &str) -> PathBuf {
        let relative = self
            .source_file
            .strip_prefix(&self.source_root)
            .unwrap_or(&self.source_file);

        let mut folder = relative
            .parent()
            .map(|parent| parent.to_string_lossy().to_string())
            .unwrap_or_default();
        if target.lower_folder_names {
            folder = folder.to_lowercase();
        }

        let stem = relative
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = if target.convert_filename_to_camelcase {
            snake_to_camel(&stem)
        } else if target.convert_filename_to_snake_case {
            camel_to_snake(&stem)
        } else {
            stem
        };

        self.destination_root
            .join(folder)
            .join(format!("{}{}", stem, extension))
    }

    fn extraction_mode(&self) -> ExtractionMode {
        match self.strategy {
            StrategyKind::SingleFile => ExtractionMode::Single,
            StrategyKind::HeaderImplementation => ExtractionMode::HeaderImplementation,
        }
    }

    /// Parse, translate and write the file; returns the written paths
    ///
    /// Nothing is written unless every output stream was produced.
    pub async fn execute(&self, context: &MigrationContext) -> Result<Vec<PathBuf>, MigrationError> {
        let unit = context.parser().parse_file(&self.source_file)?;
        debug!(
            "{}: {} members, skeleton of {} bytes",
            self.source_file.display(),
            unit.members().len(),
            unit.skeleton().len()
        );

        let output = context.orchestrator().translate(&unit, self.extraction_mode()).await?;

        let target = context.target();
        let files = match output {
            TranslatedOutput::Single(code) => vec![(self.destination_path(target, &target.extension), code)],
            TranslatedOutput::Split { header, implementation } => vec![
                (self.destination_path(target, &target.header_extension), header),
                (self.destination_path(target, &target.implementation_extension), implementation),
            ],
        };

        FileManager::write_all_or_nothing(&files).map_err(|(path, source)| MigrationError::Io { path, source })?;

        Ok(files.into_iter().map(|(path, _)| path).collect())
    }
}

impl fmt::Display for FileMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            StrategyKind::SingleFile => "single_file",
            StrategyKind::HeaderImplementation => "header_implementation",
        };
        write!(f, "{} ({})", self.source_file.display(), strategy)
    }
}
