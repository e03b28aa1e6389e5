//! Index handle and write protocol
//!
//! `Index` combines the on-disk segment store with an in-process snapshot of
//! the committed state. Readers never block on a writer: a `Searcher` binds
//! the snapshot current at its creation and is unaffected by commits that
//! complete while it runs.

mod writer;

pub use writer::WriteBatch;

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::Result;
use crate::query::Searcher;
use crate::schema::Schema;
use crate::segment::{Segment, SegmentStore};
use crate::tokenizer::Tokenizer;

/// Handle to an open tag index
#[derive(Debug)]
pub struct Index {
    store: SegmentStore,
    schema: Schema,
    tokenizer: Tokenizer,
    current: ArcSwap<Segment>,
}

impl Index {
    /// Open the index at `dir`, creating an empty one when absent
    ///
    /// Opening an existing index validates the stored schema against
    /// `schema` and fails with `SchemaMismatch` when they differ.
    pub fn open_or_create(dir: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        Self::open_with_config(dir, schema, IndexConfig::default())
    }

    /// Whether an index has been initialized at `dir`
    pub fn exists(dir: impl AsRef<Path>) -> bool {
        SegmentStore::exists(dir)
    }

    /// Open with explicit configuration
    pub fn open_with_config(
        dir: impl AsRef<Path>,
        schema: Schema,
        config: IndexConfig,
    ) -> Result<Self> {
        let store = SegmentStore::open_or_create(dir, &schema)?;
        let segment = store.load_current()?;
        Ok(Self {
            store,
            schema,
            tokenizer: Tokenizer::new(&config.tokenizer),
            current: ArcSwap::from_pointee(segment),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of documents in the committed state
    pub fn doc_count(&self) -> u32 {
        self.current.load().doc_count()
    }

    /// Generation of the committed state
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Fetch the current document for a path
    pub fn get(&self, path: &str) -> Option<Document> {
        self.current.load().get(path).cloned()
    }

    /// Create a searcher bound to the current committed snapshot
    pub fn searcher(&self) -> Searcher {
        Searcher::new(
            self.snapshot(),
            self.schema.clone(),
            self.tokenizer.clone(),
        )
    }

    /// Begin an exclusive write batch
    ///
    /// At most one batch may be open per index location; a concurrent
    /// attempt fails fast with `WriterBusy` rather than blocking.
    pub fn begin_batch(&self) -> Result<WriteBatch<'_>> {
        let lock = self.store.acquire_writer_lock()?;
        Ok(WriteBatch::new(self, lock))
    }

    /// Re-read the committed state from storage
    ///
    /// Picks up generations published by other processes; commits made
    /// through this handle publish automatically.
    pub fn reload(&self) -> Result<()> {
        let segment = self.store.load_current()?;
        self.current.store(Arc::new(segment));
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Arc<Segment> {
        self.current.load_full()
    }

    pub(crate) fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn install(&self, segment: Segment) {
        self.current.store(Arc::new(segment));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagdexError;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn ts(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn open(tmp: &TempDir) -> Index {
        Index::open_or_create(tmp.path(), Schema::tag_schema()).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(100));
        batch.commit().unwrap();

        let doc = index.get("/a.mp3").unwrap();
        assert_eq!(doc.tags, "pink floyd");
        assert_eq!(doc.last_updated, ts(100));
        assert_eq!(index.doc_count(), 1);
    }

    #[test]
    fn test_replace_by_path() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(100));
        batch.commit().unwrap();

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "genesis", ts(200));
        batch.commit().unwrap();

        assert_eq!(index.doc_count(), 1);
        let doc = index.get("/a.mp3").unwrap();
        assert_eq!(doc.tags, "genesis");
        assert_eq!(doc.last_updated, ts(200));

        // Old postings must be gone, new ones present.
        let searcher = index.searcher();
        assert!(searcher.query("pink", None).unwrap().is_empty());
        assert_eq!(searcher.query("genesis", None).unwrap().len(), 1);
    }

    #[test]
    fn test_replace_within_batch() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "first", ts(1));
        batch.add_document("/a.mp3", "second", ts(2));
        batch.commit().unwrap();

        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.get("/a.mp3").unwrap().tags, "second");
    }

    #[test]
    fn test_abort_discards() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(1));
        batch.abort();

        assert_eq!(index.doc_count(), 0);
        assert!(index.get("/a.mp3").is_none());

        // Drop without commit behaves the same.
        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/b.mp3", "blur", ts(2));
        drop(batch);
        assert_eq!(index.doc_count(), 0);
    }

    #[test]
    fn test_writer_busy() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let _batch = index.begin_batch().unwrap();
        let err = index.begin_batch().unwrap_err();
        assert!(matches!(err, TagdexError::WriterBusy));
    }

    #[test]
    fn test_commit_releases_lock() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(1));
        batch.commit().unwrap();

        assert!(index.begin_batch().is_ok());
    }

    #[test]
    fn test_idempotent_commit() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        for _ in 0..2 {
            let mut batch = index.begin_batch().unwrap();
            batch.add_document("/a.mp3", "pink floyd", ts(100));
            batch.add_document("/b.mp3", "blur", ts(100));
            batch.commit().unwrap();
        }

        assert_eq!(index.doc_count(), 2);
        let searcher = index.searcher();
        assert_eq!(searcher.query("pink", None).unwrap().len(), 1);
        assert_eq!(searcher.query("blur", None).unwrap().len(), 1);
    }

    #[test]
    fn test_prune() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(1));
        batch.add_document("/gone.mp3", "vanished", ts(1));
        batch.commit().unwrap();

        let mut batch = index.begin_batch().unwrap();
        batch.prune(|path| path != "/gone.mp3");
        batch.commit().unwrap();

        assert_eq!(index.doc_count(), 1);
        assert!(index.get("/gone.mp3").is_none());
        assert!(index.get("/a.mp3").is_some());
        assert!(index
            .searcher()
            .query("vanished", None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_snapshot_isolation() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp);

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(1));
        batch.commit().unwrap();

        // Searcher bound before the second commit keeps seeing generation 1.
        let searcher = index.searcher();

        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/b.mp3", "blur", ts(2));
        batch.commit().unwrap();

        assert!(searcher.query("blur", None).unwrap().is_empty());
        assert_eq!(index.searcher().query("blur", None).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_sees_committed_state() {
        let tmp = TempDir::new().unwrap();
        {
            let index = open(&tmp);
            let mut batch = index.begin_batch().unwrap();
            batch.add_document("/a.mp3", "pink floyd", ts(1));
            batch.commit().unwrap();
        }

        let index = open(&tmp);
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.get("/a.mp3").unwrap().tags, "pink floyd");
    }
}
