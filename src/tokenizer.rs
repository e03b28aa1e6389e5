use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Text tokenizer splitting on unicode word boundaries with case folding
///
/// Tokenization is deterministic: identical text always yields the identical
/// token sequence and positions. Positions are 0-indexed token offsets and
/// are the basis for phrase and sequence matching.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Apply the configured case folding to a single token
    pub fn normalize(&self, token: &str) -> String {
        if self.config.lowercase {
            token.to_lowercase()
        } else {
            token.to_string()
        }
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|word| self.normalize(word))
            .collect()
    }

    /// Tokenize and return (term, position) pairs in order
    ///
    /// This is the form used when building posting lists with position data.
    pub fn tokenize_with_positions_ordered(&self, text: &str) -> Vec<(String, u32)> {
        text.unicode_words()
            .enumerate()
            .map(|(pos, word)| (self.normalize(word), pos as u32))
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}
