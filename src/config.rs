use serde::{Deserialize, Serialize};

/// Tokenizer configuration
///
/// Tokenization must stay deterministic: identical text always yields the
/// identical token sequence and positions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { lowercase: true }
    }
}

/// Index-wide configuration passed to `Index::open_with_config`
#[derive(Clone, Debug, Default)]
pub struct IndexConfig {
    pub tokenizer: TokenizerConfig,
}

/// Commit-boundary policy for the ingestion driver
///
/// `PerDirectory` commits once per directory visited, which bounds memory
/// during large-tree ingestion. `Single` stages the whole traversal into
/// one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPolicy {
    PerDirectory,
    Single,
}

/// Configuration for the ingestion driver
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub batch_policy: BatchPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_policy: BatchPolicy::PerDirectory,
        }
    }
}
