/*!
 * Error types for the codeferry application.
 *
 * This module contains custom error types for the different parts of the
 * migration pipeline, using the thiserror crate for ergonomic error definitions.
 * A failure of one unit is always expressed as a `MigrationError`; the batch
 * driver turns those into warnings instead of aborting sibling units.
 */

use std::path::PathBuf;

use thiserror::Error;

/// Exit status for configuration and source folder errors
pub const EX_CONFIG: i32 = 78;
/// Exit status when the destination cannot be created
pub const EX_IOERR: i32 = 74;
/// Exit status for a failed migration run
pub const EX_SOFTWARE: i32 = 70;

/// Errors that can occur when querying a translation backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Error when making a request to the backend fails
    #[error("Backend request failed: {0}")]
    RequestFailed(String),

    /// Error returned by a remote API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The backend answered, but the answer is unusable (empty, no choices, ...)
    #[error("Backend returned a malformed response: {0}")]
    MalformedResponse(String),

    /// A pooled call did not complete within the configured timeout
    #[error("Backend query timed out after {seconds}s")]
    Timeout {
        /// The timeout that elapsed
        seconds: u64,
    },

    /// A worker process reported a failure or died while serving the call
    #[error("Worker query failed: {0}")]
    WorkerFailed(String),

    /// The worker pool cannot accept calls anymore
    #[error("Worker pool unavailable: {0}")]
    WorkerUnavailable(String),

    /// The backend could not be initialized
    #[error("Backend initialization failed: {0}")]
    Initialization(String),
}

/// Errors caused by the tool configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A prompt template was requested but is not declared
    #[error("Prompt '{0}' is not defined, please declare it under 'prompts' in the configuration")]
    MissingPrompt(String),

    /// The backend declaration cannot be used
    #[error("Invalid backend declaration '{backend}': {reason}")]
    InvalidBackend {
        /// Name of the backend class
        backend: String,
        /// What is wrong with it
        reason: String,
    },

    /// The source folder cannot be migrated
    #[error("Invalid source folder {path:?}: {reason}")]
    InvalidSource {
        /// Source folder
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Any other invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can occur while turning a source file into a structural unit
#[derive(Error, Debug)]
pub enum ParseError {
    /// The source file does not exist or is not a file
    #[error("File {0:?} does not exist")]
    NotFound(PathBuf),

    /// The source file has no content
    #[error("File {0:?} is empty")]
    Empty(PathBuf),

    /// The grammar could not be loaded into the parser
    #[error("Failed to load grammar: {0}")]
    Grammar(String),

    /// The parser could not produce a tree
    #[error("Failed to parse {path:?}: {reason}")]
    Failed {
        /// The source file
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// The source file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Io {
        /// The source file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the translation memory
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The corpus file exists but cannot be used
    #[error("Known translations corpus {path:?} is unusable: {reason}")]
    Corpus {
        /// Corpus location
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The embedder failed to produce a vector
    #[error("Embedding failed: {0}")]
    Embedding(String),
}

/// Failure of one unit's migration
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Configuration problem (missing prompt, bad backend)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend problem (timeout, malformed response, worker failure)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Source could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Translation memory problem
    #[error("Translation memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Output could not be written
    #[error("Failed to write {path:?}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The backend could not be prepared
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The translation memory could not be loaded
    #[error("Translation memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Error from a unit migration
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Process exit status (sysexits) for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EX_CONFIG,
            Self::File(_) => EX_IOERR,
            _ => EX_SOFTWARE,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
