/*!
 * Project migration: planning the files of a source folder, migrating each
 * of them and running the migrations concurrently.
 *
 * - `plan`: verifies the source folder and maps files to strategies
 * - `file`: one file's parse, translate and write cycle
 * - `runner`: bounded concurrent execution with progress reporting
 */

pub mod file;
pub mod plan;
pub mod runner;

use std::sync::Arc;

use crate::app_config::{Config, TargetConfig};
use crate::backends::Backend;
use crate::source::csharp::CSharpParser;
use crate::translation::extract::ResponseExtractor;
use crate::translation::memory::TranslationMemory;
use crate::translation::orchestrator::{Orchestrator, WhitespacePolicy};
use crate::translation::prompts::PromptLibrary;

pub use file::FileMigration;
pub use plan::{MigrationPlan, MigrationPlanner};
pub use runner::{MigrationReport, MigrationRunner};

/// Services shared by every file migration of a run
#[derive(Debug)]
pub struct MigrationContext {
    orchestrator: Orchestrator,
    parser: CSharpParser,
    target: TargetConfig,
}

impl MigrationContext {
    pub fn new(orchestrator: Orchestrator, parser: CSharpParser, target: TargetConfig) -> Self {
        Self {
            orchestrator,
            parser,
            target,
        }
    }

    /// Wire the pipeline from the configuration around an initialized backend
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn Backend>,
        memory: Option<Arc<TranslationMemory>>,
    ) -> Self {
        let prompts = Arc::new(PromptLibrary::new(config.prompts.clone()));
        let extractor = ResponseExtractor::new(config.extraction.clone());
        let whitespace = WhitespacePolicy {
            tabs_to_spaces: config.target.convert_tabs_to_spaces,
            spaces_to_tabs: config.target.convert_spaces_to_tabs,
        };

        let mut orchestrator = Orchestrator::new(backend, prompts, extractor).with_whitespace(whitespace);
        if let Some(memory) = memory {
            orchestrator = orchestrator.with_memory(memory);
        }

        Self::new(
            orchestrator,
            CSharpParser::new(config.source.convert_macros_to_comments),
            config.target.clone(),
        )
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn parser(&self) -> &CSharpParser {
        &self.parser
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }
}
