pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod ingest;
pub mod query;
pub mod schema;
pub mod segment;
pub mod tokenizer;

pub use config::{BatchPolicy, IndexConfig, IngestConfig, TokenizerConfig};
pub use document::Document;
pub use error::{Result, TagdexError};
pub use index::{Index, WriteBatch};
pub use ingest::{AudioTagExtractor, IngestDriver, IngestStats, TagExtractor, TagOutcome};
pub use query::{QueryNode, SearchHit, Searcher};
pub use schema::Schema;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
