//! Ingestion driver
//!
//! Glue between directory traversal, tag extraction and the index writer.
//! Failures are isolated per file: an unreadable or unsupported file is
//! logged and skipped, and the surrounding batch still commits.

mod extractor;

pub use extractor::{join_tag_values, AudioTagExtractor, TagExtractor, TagOutcome};

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{BatchPolicy, IngestConfig};
use crate::error::Result;
use crate::index::Index;

/// Counters reported after a traversal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Documents staged and committed
    pub indexed: usize,
    /// Files skipped as unsupported formats
    pub unsupported: usize,
    /// Files skipped after extraction errors
    pub failed: usize,
    /// Batches committed
    pub commits: usize,
}

/// Walks a directory tree and indexes every supported file
pub struct IngestDriver<'a, E: TagExtractor> {
    index: &'a Index,
    extractor: E,
    config: IngestConfig,
}

impl<'a, E: TagExtractor> IngestDriver<'a, E> {
    pub fn new(index: &'a Index, extractor: E) -> Self {
        Self::with_config(index, extractor, IngestConfig::default())
    }

    pub fn with_config(index: &'a Index, extractor: E, config: IngestConfig) -> Self {
        Self {
            index,
            extractor,
            config,
        }
    }

    /// Traverse `base` and index all supported files beneath it
    ///
    /// With the per-directory batch policy, a commit happens every time the
    /// traversal leaves a directory with staged documents.
    pub fn ingest(&self, base: &Path) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let mut batch = self.index.begin_batch()?;
        let mut current_dir: Option<PathBuf> = None;

        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("traversal error: {}", e);
                    stats.failed += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                info!("entering directory {}", entry.path().display());
                continue;
            }

            let dir = entry.path().parent().map(|p| p.to_path_buf());
            if self.config.batch_policy == BatchPolicy::PerDirectory
                && current_dir.is_some()
                && current_dir != dir
                && batch.staged_count() > 0
            {
                batch.commit()?;
                stats.commits += 1;
                batch = self.index.begin_batch()?;
            }
            current_dir = dir;

            info!("processing file {}", entry.path().display());
            match self.extractor.extract(entry.path()) {
                TagOutcome::Supported(tags) => {
                    debug!("found taginfo: {:?}", tags);
                    batch.add_document(
                        entry.path().to_string_lossy(),
                        join_tag_values(&tags),
                        Utc::now(),
                    );
                    stats.indexed += 1;
                }
                TagOutcome::Unsupported => {
                    debug!("unsupported file type");
                    stats.unsupported += 1;
                }
                TagOutcome::Failed(message) => {
                    warn!("extraction error: {}", message);
                    stats.failed += 1;
                }
            }
        }

        if batch.staged_count() > 0 {
            batch.commit()?;
            stats.commits += 1;
        } else {
            batch.abort();
        }

        Ok(stats)
    }
}
