//! Write batch: the single-writer update protocol
//!
//! A batch stages documents in memory and publishes them as one atomic
//! generation on commit. Staging a path that already exists in committed
//! state replaces it at commit; staging the same path twice keeps the last
//! version. Dropping a batch without committing discards everything.

use std::collections::HashMap;
use std::fs::File;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{Result, TagdexError};
use crate::segment::SegmentBuilder;

use super::Index;

/// An open write transaction against an index
///
/// Holds the exclusive writer lock for its lifetime.
pub struct WriteBatch<'a> {
    index: &'a Index,
    _lock: File,
    staged: Vec<Document>,
    staged_paths: HashMap<String, usize>,
    keep_predicate: Option<Box<dyn Fn(&str) -> bool>>,
}

impl<'a> std::fmt::Debug for WriteBatch<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("index", &self.index)
            .field("staged", &self.staged)
            .field("staged_paths", &self.staged_paths)
            .field("keep_predicate", &self.keep_predicate.is_some())
            .finish()
    }
}

impl<'a> WriteBatch<'a> {
    pub(super) fn new(index: &'a Index, lock: File) -> Self {
        Self {
            index,
            _lock: lock,
            staged: Vec::new(),
            staged_paths: HashMap::new(),
            keep_predicate: None,
        }
    }

    /// Stage a document; the eventual commit replaces any committed document
    /// with the same path
    pub fn add_document(
        &mut self,
        path: impl Into<String>,
        tags_text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) {
        let doc = Document::new(path, tags_text, timestamp);
        match self.staged_paths.get(&doc.path) {
            Some(&slot) => self.staged[slot] = doc,
            None => {
                self.staged_paths.insert(doc.path.clone(), self.staged.len());
                self.staged.push(doc);
            }
        }
    }

    /// Drop committed documents whose path fails the predicate
    ///
    /// Intended for removing entries whose backing files no longer exist:
    /// pass a predicate that returns true for paths that still exist.
    /// Removal happens at commit time.
    pub fn prune<F>(&mut self, existing_paths_predicate: F)
    where
        F: Fn(&str) -> bool + 'static,
    {
        self.keep_predicate = Some(Box::new(existing_paths_predicate));
    }

    /// Number of documents staged so far
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Durably publish the staged documents as one atomic generation
    ///
    /// On failure the previously committed state remains fully intact and
    /// the error is `CommitFailed`.
    pub fn commit(self) -> Result<()> {
        let snapshot = self.index.snapshot();
        let staged_paths = self.staged_paths;
        let keep_predicate = self.keep_predicate;

        let schema = self.index.schema().clone();
        let mut builder = SegmentBuilder::new(&schema, self.index.tokenizer());
        builder
            .carry_over(&snapshot, |doc| {
                !staged_paths.contains_key(&doc.path)
                    && keep_predicate.as_ref().map_or(true, |keep| keep(&doc.path))
            })
            .map_err(TagdexError::CommitFailed)?;

        let staged_count = self.staged.len();
        for doc in self.staged {
            builder.add_document(doc);
        }

        let generation = snapshot.generation() + 1;
        let payload = builder
            .build(generation, Utc::now().timestamp())
            .map_err(TagdexError::CommitFailed)?;

        let segment = self.index.store().publish(payload)?;
        info!(
            "committed generation {} ({} staged, {} total documents)",
            generation,
            staged_count,
            segment.doc_count()
        );
        self.index.install(segment);
        Ok(())
    }

    /// Discard all staged changes; committed state is unaffected
    pub fn abort(self) {
        debug!("write batch aborted, {} staged documents discarded", self.staged.len());
    }
}
