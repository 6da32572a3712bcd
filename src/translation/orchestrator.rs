/*!
 * Per-unit translation pipeline.
 *
 * A unit that fits one backend call is translated whole with the `full`
 * prompt. Otherwise the skeleton is translated with `class_only`, the members
 * are chunked and translated in order with `methods_only`, and the results are
 * reassembled around the `${METHODS}` placeholder.
 *
 * Chunks of one unit are translated strictly sequentially. Any failure aborts
 * the unit; nothing partial is returned.
 */

use std::sync::Arc;

use log::{debug, warn};

use super::chunker::{Chunker, MEMBER_SEPARATOR};
use super::extract::{Extracted, ExtractionMode, ResponseExtractor};
use super::memory::TranslationMemory;
use super::prompts::{CLASS_ONLY_PROMPT, FULL_PROMPT, METHODS_ONLY_PROMPT, PromptLibrary, SYSTEM_PROMPT};
use crate::backends::{Backend, HistoryItem};
use crate::errors::{BackendError, MigrationError};
use crate::source::StructuralUnit;

/// Marks where translated members go in a translated skeleton
pub const METHODS_PLACEHOLDER: &str = "${METHODS}";

/// Final text of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatedOutput {
    Single(String),
    Split { header: String, implementation: String },
}

impl TranslatedOutput {
    fn map(self, f: impl Fn(String) -> String) -> Self {
        match self {
            Self::Single(code) => Self::Single(f(code)),
            Self::Split { header, implementation } => Self::Split {
                header: f(header),
                implementation: f(implementation),
            },
        }
    }
}

/// Tab/space conversion applied to every output stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitespacePolicy {
    pub tabs_to_spaces: bool,
    pub spaces_to_tabs: bool,
}

impl WhitespacePolicy {
    pub fn apply(&self, text: String) -> String {
        let mut text = text;
        if self.tabs_to_spaces {
            text = text.replace('\t', "    ");
        }
        if self.spaces_to_tabs {
            text = text.replace("    ", "\t");
        }
        text
    }
}

/// Drives the translate/extract cycle of one unit
#[derive(Debug, Clone)]
pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    prompts: Arc<PromptLibrary>,
    extractor: ResponseExtractor,
    memory: Option<Arc<TranslationMemory>>,
    whitespace: WhitespacePolicy,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, prompts: Arc<PromptLibrary>, extractor: ResponseExtractor) -> Self {
        Self {
            backend,
            prompts,
            extractor,
            memory: None,
            whitespace: WhitespacePolicy::default(),
        }
    }

    /// Use nearest known translations as few-shot history
    pub fn with_memory(mut self, memory: Arc<TranslationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_whitespace(mut self, whitespace: WhitespacePolicy) -> Self {
        self.whitespace = whitespace;
        self
    }

    /// Translate a unit into one code stream or a header/implementation pair
    pub async fn translate(
        &self,
        unit: &StructuralUnit,
        mode: ExtractionMode,
    ) -> Result<TranslatedOutput, MigrationError> {
        let output = if self.backend.fits(unit.source_text()) {
            debug!("Unit fits one call, translating it whole");
            into_output(self.translate_code(unit.source_text(), FULL_PROMPT, mode).await?)
        } else {
            self.translate_in_chunks(unit, mode).await?
        };

        Ok(output.map(|text| self.whitespace.apply(text)))
    }

    async fn translate_in_chunks(
        &self,
        unit: &StructuralUnit,
        mode: ExtractionMode,
    ) -> Result<TranslatedOutput, MigrationError> {
        let skeleton = self.translate_code(unit.skeleton(), CLASS_ONLY_PROMPT, mode).await?;

        let chunks = Chunker::new(self.backend.as_ref()).chunk_members(unit.members());
        debug!(
            "Translating {} members in {} chunks",
            unit.members().len(),
            chunks.len()
        );

        let mut member_codes = Vec::with_capacity(chunks.len());
        let mut member_headers = Vec::with_capacity(chunks.len());
        let mut member_implementations = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            match self.translate_code(&chunk.text, METHODS_ONLY_PROMPT, mode).await? {
                Extracted::Code(code) => member_codes.push(code),
                Extracted::Split { header, implementation } => {
                    member_headers.push(header);
                    member_implementations.push(implementation);
                }
            }
        }

        let output = match skeleton {
            Extracted::Code(code) => TranslatedOutput::Single(reassemble(&code, &member_codes)),
            Extracted::Split { header, implementation } => {
                let header = reassemble(&header, &member_headers);
                let implementation = if member_implementations.is_empty() {
                    implementation
                } else {
                    format!(
                        "{}{}{}",
                        implementation,
                        MEMBER_SEPARATOR,
                        member_implementations.join(MEMBER_SEPARATOR)
                    )
                };
                TranslatedOutput::Split { header, implementation }
            }
        };

        Ok(output)
    }

    /// One backend call: render the prompt, attach system and history, extract the answer
    async fn translate_code(
        &self,
        code: &str,
        prompt_name: &str,
        mode: ExtractionMode,
    ) -> Result<Extracted, MigrationError> {
        let user = self.prompts.render_code(prompt_name, code)?;
        let system = self.prompts.optional(SYSTEM_PROMPT);
        let history = self.history_for(code).await;

        let response = self.backend.query(&user, system, &history).await?;
        if response.trim().is_empty() {
            return Err(BackendError::MalformedResponse(format!(
                "empty response to the '{}' prompt",
                prompt_name
            ))
            .into());
        }

        Ok(self.extractor.extract(mode, &response))
    }

    async fn history_for(&self, code: &str) -> Vec<HistoryItem> {
        let Some(memory) = self.memory.clone() else {
            return Vec::new();
        };

        // Embedding the query runs the ONNX model synchronously
        let code = code.to_string();
        match tokio::task::spawn_blocking(move || memory.fetch_nearest_as_history(&code)).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Translation memory lookup failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn into_output(extracted: Extracted) -> TranslatedOutput {
    match extracted {
        Extracted::Code(code) => TranslatedOutput::Single(code),
        Extracted::Split { header, implementation } => TranslatedOutput::Split { header, implementation },
    }
}

/// Put translated members at the placeholder, or after the skeleton when there is none
pub fn reassemble(skeleton: &str, members: &[String]) -> String {
    let joined = members.join(MEMBER_SEPARATOR);

    if skeleton.contains(METHODS_PLACEHOLDER) {
        skeleton.replace(METHODS_PLACEHOLDER, &joined)
    } else if members.is_empty() {
        skeleton.to_string()
    } else {
        format!("{}{}{}", skeleton, MEMBER_SEPARATOR, joined)
    }
}
