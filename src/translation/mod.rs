/*!
 * Translation of structural units through a backend.
 *
 * - `chunker`: packs members into backend-sized chunks
 * - `prompts`: named prompt templates with `${KEY}` substitution
 * - `extract`: recovers code from free-form responses
 * - `memory`: known translations used as few-shot history
 * - `orchestrator`: the per-unit translate, extract and reassemble cycle
 */

pub mod chunker;
pub mod extract;
pub mod memory;
pub mod orchestrator;
pub mod prompts;

pub use self::chunker::{Chunk, ChunkKind, Chunker};
pub use self::extract::{Extracted, ExtractionMode, ResponseExtractor};
pub use self::memory::{KnownTranslation, TranslationMemory};
pub use self::orchestrator::{Orchestrator, TranslatedOutput};
pub use self::prompts::PromptLibrary;
