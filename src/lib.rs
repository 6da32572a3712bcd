/*!
 * # codeferry
 *
 * Migrates source files between ecosystems by delegating code translation to
 * pluggable LLM backends.
 *
 * ## Features
 *
 * - Structural parsing of C# files into a skeleton and member blocks
 * - Chunking of large files to the capacity of the backend
 * - Reassembly of translated members around a `${METHODS}` placeholder
 * - Single-file or header/implementation output
 * - Backends: OpenAI, Ollama, and a pool of isolated worker processes
 * - Few-shot prompting from a corpus of known translations
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `backends`: The backend contract and its implementations
 * - `source`: Structural units and the C# parser
 * - `translation`: Chunking, prompts, extraction, memory and orchestration
 * - `migration`: Planning and concurrent execution of file migrations
 * - `app_controller`: One project migration end to end
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod backends;
pub mod errors;
pub mod file_utils;
pub mod migration;
pub mod source;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use backends::{Backend, HistoryItem, load_backend};
pub use errors::{AppError, BackendError, ConfigError, MemoryError, MigrationError, ParseError};
pub use source::StructuralUnit;
pub use translation::{Orchestrator, TranslatedOutput};
