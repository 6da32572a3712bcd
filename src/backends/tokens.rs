use std::fmt;

use log::{debug, warn};
use tiktoken_rs::CoreBPE;

/// Characters per token used by the estimate. Conservative on purpose for code,
/// which tokenizes denser than prose.
const CHARS_PER_TOKEN: f64 = 2.5;

/// Approximate token count based on character count
pub fn estimate_token_count(text: &str) -> usize {
    let char_count = text.chars().count();
    let tokens = (char_count as f64 / CHARS_PER_TOKEN).ceil() as usize;

    if tokens > 50_000 {
        debug!("Large prompt: ~{} tokens ({} chars)", tokens, char_count);
    }

    tokens
}

/// Counts tokens the way the remote model does
///
/// Uses the BPE encoding of the model when tiktoken knows it, `cl100k_base`
/// otherwise, and the character estimate when no encoding can be loaded.
pub enum TokenCounter {
    Bpe(CoreBPE),
    Estimate,
}

impl TokenCounter {
    pub fn for_model(model: &str) -> Self {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Self::Bpe(bpe),
            Err(e) => {
                debug!("No BPE encoding for model '{}' ({}), using cl100k_base", model, e);
                match tiktoken_rs::cl100k_base() {
                    Ok(bpe) => Self::Bpe(bpe),
                    Err(e) => {
                        warn!("Failed to load cl100k_base, estimating token counts: {}", e);
                        Self::Estimate
                    }
                }
            }
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Self::Estimate => estimate_token_count(text),
        }
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bpe(_) => f.write_str("TokenCounter::Bpe"),
            Self::Estimate => f.write_str("TokenCounter::Estimate"),
        }
    }
}
