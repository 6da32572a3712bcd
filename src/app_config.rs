//! Application configuration module
//! This module handles the tool configuration including loading,
//! validating and saving configuration settings.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::backends::mock::MockConfig;
use crate::errors::ConfigError;
use crate::translation::memory::resolve_embedding_model;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "codeferry.json";

/// Represents the tool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Backend performing the code translation
    #[serde(default)]
    pub backend: BackendConfig,

    /// Named prompt templates (`system`, `full`, `class_only`, `methods_only`)
    #[serde(default = "default_prompts")]
    pub prompts: BTreeMap<String, String>,

    /// Source project settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Destination project settings
    #[serde(default)]
    pub target: TargetConfig,

    /// How code is recognized in backend responses
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Translation memory used for few-shot history (optional)
    #[serde(default)]
    pub known_translations: Option<KnownTranslationsConfig>,

    /// Batch driver settings
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Backend declaration, tagged by `class`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Echoes the prompt back
    #[default]
    Trivial,
    /// Scripted test double
    Mock(MockConfig),
    /// OpenAI chat completions
    OpenAi(OpenAiConfig),
    /// Local Ollama server
    Ollama(OllamaConfig),
    /// Another backend executed in a pool of worker processes
    Pooled {
        inner: Box<BackendConfig>,
        #[serde(default)]
        pool: PoolConfig,
    },
}

impl BackendConfig {
    // @returns: Class name as written in the configuration
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Mock(_) => "mock",
            Self::OpenAi(_) => "open_ai",
            Self::Ollama(_) => "ollama",
            Self::Pooled { .. } => "pooled",
        }
    }

    /// Inject an API key into every OpenAI declaration, including pooled ones
    pub fn set_secret_key(&mut self, key: &str) {
        match self {
            Self::OpenAi(config) => config.secret_key = key.to_string(),
            Self::Pooled { inner, .. } => inner.set_secret_key(key),
            _ => {}
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::OpenAi(config) => {
                if config.model.is_empty() {
                    return Err(self.invalid("model must not be empty"));
                }
                if config.max_tokens == 0 {
                    return Err(self.invalid("max_tokens must be greater than zero"));
                }
            }
            Self::Ollama(config) => {
                if config.model.is_empty() {
                    return Err(self.invalid("model must not be empty"));
                }
                if config.max_tokens == 0 {
                    return Err(self.invalid("max_tokens must be greater than zero"));
                }
            }
            Self::Pooled { inner, pool } => {
                if matches!(inner.as_ref(), Self::Pooled { .. }) {
                    return Err(self.invalid("a pooled backend cannot wrap another pooled backend"));
                }
                if pool.num_workers == 0 {
                    return Err(self.invalid("num_workers must be greater than zero"));
                }
                if pool.query_timeout_secs == 0 {
                    return Err(self.invalid("query_timeout_secs must be greater than zero"));
                }
                inner.validate()?;
            }
            Self::Trivial | Self::Mock(_) => {}
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidBackend {
            backend: self.class_name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// OpenAI service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OpenAiConfig {
    /// Model name (e.g., "gpt-4")
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API key for the service, usually injected from the command line
    #[serde(default)]
    pub secret_key: String,

    /// Service endpoint URL (for Azure OpenAI or compatible servers)
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    /// Prompt capacity in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature parameter for text generation
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: default_openai_model(),
            secret_key: String::new(),
            endpoint: default_openai_endpoint(),
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Ollama service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Model name (e.g., "codellama")
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Service endpoint URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Prompt capacity in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature parameter for text generation
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Worker pool parameters of the pooled backend
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PoolConfig {
    /// Number of worker processes
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Hard timeout of one pooled call
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Executable started as worker; defaults to the running executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_program: Option<PathBuf>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            query_timeout_secs: default_query_timeout_secs(),
            worker_program: None,
        }
    }
}

/// How a source file is migrated
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One destination file with the target extension
    SingleFile,
    /// A header file plus an implementation file
    HeaderImplementation,
}

/// Source project settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    /// Path fragments that exclude a file from the migration
    #[serde(default = "default_ignore_locations")]
    pub ignore_locations: Vec<String>,

    /// Entries that must exist at the root of the source folder
    #[serde(default = "default_required_entries")]
    pub required_entries: Vec<String>,

    /// Rewrite preprocessor lines into comments before parsing
    #[serde(default = "default_true")]
    pub convert_macros_to_comments: bool,

    /// File extension (with leading dot) to strategy
    #[serde(default = "default_strategies")]
    pub strategies: BTreeMap<String, StrategyKind>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ignore_locations: default_ignore_locations(),
            required_entries: default_required_entries(),
            convert_macros_to_comments: true,
            strategies: default_strategies(),
        }
    }
}

/// Destination project settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TargetConfig {
    /// Extension of single-file outputs
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Extension of header outputs
    #[serde(default = "default_header_extension")]
    pub header_extension: String,

    /// Extension of implementation outputs
    #[serde(default = "default_implementation_extension")]
    pub implementation_extension: String,

    #[serde(default)]
    pub lower_folder_names: bool,

    #[serde(default)]
    pub convert_filename_to_camelcase: bool,

    #[serde(default)]
    pub convert_filename_to_snake_case: bool,

    #[serde(default)]
    pub convert_tabs_to_spaces: bool,

    #[serde(default)]
    pub convert_spaces_to_tabs: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            header_extension: default_header_extension(),
            implementation_extension: default_implementation_extension(),
            lower_folder_names: false,
            convert_filename_to_camelcase: false,
            convert_filename_to_snake_case: false,
            convert_tabs_to_spaces: false,
            convert_spaces_to_tabs: false,
        }
    }
}

/// Markers recognized in backend responses
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Fenced code block delimiter
    #[serde(default = "default_code_delimiter")]
    pub code_delimiter: String,

    /// Prefix of comment lines naming a file
    #[serde(default = "default_comment_prefix")]
    pub comment_prefix: String,

    /// Suffix of a comment line introducing the header section
    #[serde(default = "default_header_marker")]
    pub header_marker: String,

    /// Suffix of a comment line introducing the implementation section
    #[serde(default = "default_implementation_marker")]
    pub implementation_marker: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            code_delimiter: default_code_delimiter(),
            comment_prefix: default_comment_prefix(),
            header_marker: default_header_marker(),
            implementation_marker: default_implementation_marker(),
        }
    }
}

/// Translation memory settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KnownTranslationsConfig {
    /// YAML corpus with a `translations` list of `{source, target}` pairs
    pub path: PathBuf,

    /// Default number of neighbours turned into history
    #[serde(default = "default_result_count")]
    pub result_count: usize,

    /// User history template; `${SOURCE}` and `${TARGET}` are substituted
    #[serde(default = "default_user_request")]
    pub user_request: String,

    /// Fixed assistant acknowledgment
    #[serde(default = "default_assistant_response")]
    pub assistant_response: String,

    /// Sentence-transformer model used to embed sources (e.g. `all-MiniLM-L6-v2`)
    #[serde(default = "default_embedding_function")]
    pub embedding_function: String,

    /// Where downloaded embedding models are cached (fastembed default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for KnownTranslationsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("known_translations.yaml"),
            result_count: default_result_count(),
            user_request: default_user_request(),
            assistant_response: default_assistant_response(),
            embedding_function: default_embedding_function(),
            cache_dir: None,
        }
    }
}

/// Batch driver settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConcurrencyConfig {
    /// Number of files migrated at the same time
    #[serde(default = "default_execute_strategy_workers")]
    pub execute_strategy_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            execute_strategy_workers: default_execute_strategy_workers(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> usize {
    4000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_num_workers() -> usize {
    4
}

fn default_query_timeout_secs() -> u64 {
    600
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_ollama_model() -> String {
    "codellama".to_string()
}

fn default_ignore_locations() -> Vec<String> {
    vec!["Library".to_string(), "Temp".to_string(), "Packages".to_string()]
}

fn default_required_entries() -> Vec<String> {
    vec!["Assets".to_string(), "ProjectSettings".to_string()]
}

fn default_strategies() -> BTreeMap<String, StrategyKind> {
    BTreeMap::from([(".cs".to_string(), StrategyKind::SingleFile)])
}

fn default_extension() -> String {
    ".gd".to_string()
}

fn default_header_extension() -> String {
    ".h".to_string()
}

fn default_implementation_extension() -> String {
    ".cpp".to_string()
}

fn default_code_delimiter() -> String {
    "```".to_string()
}

fn default_comment_prefix() -> String {
    "//".to_string()
}

fn default_header_marker() -> String {
    ".h".to_string()
}

fn default_implementation_marker() -> String {
    ".cpp".to_string()
}

fn default_result_count() -> usize {
    3
}

fn default_user_request() -> String {
    "This code:\n```\n${SOURCE}\n```\nis translated as:\n```\n${TARGET}\n```".to_string()
}

fn default_assistant_response() -> String {
    "Understood.".to_string()
}

fn default_embedding_function() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_execute_strategy_workers() -> usize {
    4
}

fn default_prompts() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "system".to_string(),
            "You are a professional game developer migrating a Unity project written in C# to Godot 4 and GDScript. Answer with code only, inside a single fenced code block.".to_string(),
        ),
        (
            "full".to_string(),
            "Translate the following C# file to GDScript:\n```\n${CODE}\n```".to_string(),
        ),
        (
            "class_only".to_string(),
            "Translate the following C# class declaration to GDScript. Method bodies were removed; put the literal line ${METHODS} where the methods belong:\n```\n${CODE}\n```".to_string(),
        ),
        (
            "methods_only".to_string(),
            "Translate the following C# methods to GDScript:\n```\n${CODE}\n```".to_string(),
        ),
    ])
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;

        if self.target.convert_filename_to_camelcase && self.target.convert_filename_to_snake_case {
            return Err(ConfigError::Invalid(
                "convert_filename_to_camelcase and convert_filename_to_snake_case are mutually exclusive".to_string(),
            ));
        }

        if let Some(extension) = self.source.strategies.keys().find(|ext| !ext.starts_with('.')) {
            return Err(ConfigError::Invalid(format!(
                "strategy extension '{}' must start with a dot",
                extension
            )));
        }

        if self.concurrency.execute_strategy_workers == 0 {
            return Err(ConfigError::Invalid(
                "execute_strategy_workers must be greater than zero".to_string(),
            ));
        }

        if let Some(known) = &self.known_translations {
            if resolve_embedding_model(&known.embedding_function).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "known_translations.embedding_function '{}' is not a supported embedding model",
                    known.embedding_function
                )));
            }
        }

        Ok(())
    }

    /// Load the configuration from `path`, writing a default one when the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;

            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            Ok(config)
        } else {
            warn!("Config file not found at '{}', creating default config.", path.display());

            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            prompts: default_prompts(),
            source: SourceConfig::default(),
            target: TargetConfig::default(),
            extraction: ExtractionConfig::default(),
            known_translations: None,
            concurrency: ConcurrencyConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
