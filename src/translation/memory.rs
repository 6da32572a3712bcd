/*!
 * Translation memory.
 *
 * A corpus of known (source, target) pairs is embedded once and queried by
 * nearest neighbour. The neighbours of a piece of code are turned into
 * few-shot history: one templated user message and one fixed assistant
 * acknowledgment per pair.
 *
 * Sources are embedded with a sentence-transformer model run locally by
 * fastembed. The model named by `embedding_function` is loaded on the first
 * embedding, so an empty or missing corpus never downloads it.
 *
 * The memory is an explicitly constructed service: build it, call
 * `initialize` (idempotent), then share it behind an `Arc`. Lookups on a
 * memory that was never initialized return nothing. Embedding blocks the
 * calling thread; async callers go through `spawn_blocking`.
 */

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::prompts::substitute;
use crate::app_config::KnownTranslationsConfig;
use crate::backends::HistoryItem;
use crate::errors::MemoryError;

/// Text embedding used to index the memory
pub trait Embedder: Send + Sync + Debug {
    /// Embed a single text into a vector of `dimensions()` values
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    /// Embed several texts
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimensions(&self) -> usize;
}

/// Model name without its organisation prefix and `-onnx` suffix, lower-cased
fn normalize_model_name(name: &str) -> String {
    let name = name.rsplit('/').next().unwrap_or(name);
    name.trim_end_matches("-onnx").to_lowercase()
}

/// Find the fastembed model for a sentence-transformer name such as
/// `all-MiniLM-L6-v2` or `sentence-transformers/all-MiniLM-L6-v2`
pub fn resolve_embedding_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    let wanted = normalize_model_name(name);
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| info.model_code.eq_ignore_ascii_case(name) || normalize_model_name(&info.model_code) == wanted)
        .map(|info| (info.model, info.dim))
}

/// Sentence embeddings computed locally with fastembed (ONNX runtime)
pub struct FastEmbedEmbedder {
    name: String,
    model: EmbeddingModel,
    dimensions: usize,
    cache_dir: Option<PathBuf>,
    engine: OnceCell<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    /// Embedder for the named model; the model itself is loaded on first use
    pub fn new(name: &str, cache_dir: Option<PathBuf>) -> Result<Self, MemoryError> {
        let (model, dimensions) = resolve_embedding_model(name)
            .ok_or_else(|| MemoryError::Embedding(format!("unsupported embedding function '{}'", name)))?;

        Ok(Self {
            name: name.to_string(),
            model,
            dimensions,
            cache_dir,
            engine: OnceCell::new(),
        })
    }

    fn engine(&self) -> Result<&Mutex<TextEmbedding>, MemoryError> {
        self.engine.get_or_try_init(|| {
            info!("Loading embedding model '{}'...", self.name);
            let mut options = TextInitOptions::new(self.model.clone()).with_show_download_progress(false);
            if let Some(cache_dir) = &self.cache_dir {
                options = options.with_cache_dir(cache_dir.clone());
            }

            TextEmbedding::try_new(options)
                .map(Mutex::new)
                .map_err(|e| MemoryError::Embedding(format!("failed to load '{}': {}", self.name, e)))
        })
    }
}

impl Debug for FastEmbedEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastEmbedEmbedder")
            .field("name", &self.name)
            .field("dimensions", &self.dimensions)
            .field("loaded", &self.engine.get().is_some())
            .finish()
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| MemoryError::Embedding("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = texts.iter().map(|text| text.to_string()).collect();
        self.engine()?
            .lock()
            .embed(texts, None)
            .map_err(|e| MemoryError::Embedding(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Feature-hashing embedder over lower-cased words and character trigrams
///
/// Deterministic and offline, for tests and benchmarks.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let lowered = text.to_lowercase();
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in lowered
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|word| !word.is_empty())
        {
            embedding[self.bucket(&format!("w:{}", word))] += 1.0;
        }

        let chars: Vec<char> = lowered.chars().collect();
        for trigram in chars.windows(3) {
            let trigram: String = trigram.iter().collect();
            embedding[self.bucket(&format!("t:{}", trigram))] += 1.0;
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity of two vectors; 0 when either is null
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// One known (source, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownTranslation {
    pub source: String,
    pub target: String,
}

impl KnownTranslation {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Corpus {
    #[serde(default)]
    translations: Option<Vec<KnownTranslation>>,
}

#[derive(Debug)]
struct MemoryIndex {
    entries: Vec<KnownTranslation>,
    vectors: Vec<Vec<f32>>,
}

/// Nearest-neighbour lookup over known translations
#[derive(Debug)]
pub struct TranslationMemory {
    config: KnownTranslationsConfig,
    embedder: Arc<dyn Embedder>,
    index: OnceCell<MemoryIndex>,
}

impl TranslationMemory {
    /// Memory embedding with the configured `embedding_function`
    pub fn new(config: KnownTranslationsConfig) -> Result<Self, MemoryError> {
        let embedder = FastEmbedEmbedder::new(&config.embedding_function, config.cache_dir.clone())?;
        Ok(Self::with_embedder(config, Arc::new(embedder)))
    }

    pub fn with_embedder(config: KnownTranslationsConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            embedder,
            index: OnceCell::new(),
        }
    }

    /// Load and index the configured corpus; later calls are no-ops
    pub fn initialize(&self) -> Result<(), MemoryError> {
        self.index
            .get_or_try_init(|| {
                let entries = load_corpus(&self.config.path)?;
                self.build_index(entries)
            })
            .map(|_| ())
    }

    /// Index the given pairs instead of reading the corpus; a no-op when already initialized
    pub fn initialize_with_entries(&self, entries: Vec<KnownTranslation>) -> Result<(), MemoryError> {
        self.index
            .get_or_try_init(|| self.build_index(entries))
            .map(|_| ())
    }

    /// Drop the index and load the corpus again
    pub fn reload(&mut self) -> Result<(), MemoryError> {
        self.index.take();
        self.initialize()
    }

    pub fn is_initialized(&self) -> bool {
        self.index.get().is_some()
    }

    /// Number of indexed pairs
    pub fn len(&self) -> usize {
        self.index.get().map_or(0, |index| index.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `count` pairs closest to `query` (configured default when `None`), closest first
    pub fn fetch_nearest(&self, query: &str, count: Option<usize>) -> Vec<KnownTranslation> {
        let Some(index) = self.index.get() else {
            debug!("Known translations memory was not initialized, not returning anything");
            return Vec::new();
        };

        let count = count.unwrap_or(self.config.result_count);
        if count == 0 || index.entries.is_empty() {
            return Vec::new();
        }

        let query_vector = match self.embedder.embed(query) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Failed to embed translation memory query: {}", e);
                return Vec::new();
            }
        };

        let mut ranked: Vec<(usize, f32)> = index
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, cosine_similarity(&query_vector, vector)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(count)
            .map(|(i, _)| index.entries[i].clone())
            .collect()
    }

    /// Nearest pairs as history: user request then assistant acknowledgment, per pair
    pub fn fetch_nearest_as_history(&self, query: &str) -> Vec<HistoryItem> {
        self.fetch_nearest(query, None)
            .into_iter()
            .flat_map(|known| {
                let user_request = substitute(
                    &self.config.user_request,
                    &[("SOURCE", &known.source), ("TARGET", &known.target)],
                );
                [
                    HistoryItem::user(user_request),
                    HistoryItem::assistant(self.config.assistant_response.clone()),
                ]
            })
            .collect()
    }

    fn build_index(&self, entries: Vec<KnownTranslation>) -> Result<MemoryIndex, MemoryError> {
        let sources: Vec<&str> = entries.iter().map(|entry| entry.source.as_str()).collect();
        let vectors = self.embedder.embed_batch(&sources)?;
        debug!("Indexed {} known translations", entries.len());

        Ok(MemoryIndex { entries, vectors })
    }
}

fn load_corpus(path: &Path) -> Result<Vec<KnownTranslation>, MemoryError> {
    if !path.is_file() {
        warn!("No known translations found at '{}'", path.display());
        return Ok(Vec::new());
    }

    let corpus_error = |reason: String| MemoryError::Corpus {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| corpus_error(e.to_string()))?;
    let corpus: Corpus = serde_yaml::from_str(&text).map_err(|e| corpus_error(e.to_string()))?;

    match corpus.translations {
        Some(translations) => Ok(translations),
        None => {
            warn!("'{}' is malformed: no root node called 'translations' found", path.display());
            Ok(Vec::new())
        }
    }
}
