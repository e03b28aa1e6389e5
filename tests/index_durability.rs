//! Durability and update-protocol invariants of the index store

use std::fs;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use tagdex::schema::{FieldKind, FieldSpec};
use tagdex::{Index, Schema, TagdexError};

fn ts(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn db_path(tmp: &TempDir) -> std::path::PathBuf {
    tmp.path().join("tagdb")
}

#[test]
fn roundtrip_returns_latest_committed_document() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.add_document("/a.mp3", "pink floyd", ts(100));
    batch.commit().unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.add_document("/a.mp3", "pink floyd remastered", ts(200));
    batch.commit().unwrap();

    let doc = index.get("/a.mp3").unwrap();
    assert_eq!(doc.tags, "pink floyd remastered");
    assert_eq!(doc.last_updated, ts(200));
    assert_eq!(index.doc_count(), 1);

    // No stale postings: the replaced text is searchable, once.
    let hits = index.searcher().query("remastered", None).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn double_commit_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

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
fn interrupted_commit_leaves_prior_state() {
    let tmp = TempDir::new().unwrap();
    {
        let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();
        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(100));
        batch.commit().unwrap();
    }

    // Simulate a crash between segment write and pointer swap: a partial
    // next-generation file exists but CURRENT was never updated.
    fs::write(db_path(&tmp).join("gen_2.seg"), b"partial garbage").unwrap();

    let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();
    assert_eq!(index.generation(), 1);
    assert_eq!(index.doc_count(), 1);
    assert_eq!(index.get("/a.mp3").unwrap().tags, "pink floyd");
}

#[test]
fn corrupted_live_segment_is_detected() {
    let tmp = TempDir::new().unwrap();
    {
        let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();
        let mut batch = index.begin_batch().unwrap();
        batch.add_document("/a.mp3", "pink floyd", ts(100));
        batch.commit().unwrap();
    }

    let seg = db_path(&tmp).join("gen_1.seg");
    let mut bytes = fs::read(&seg).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&seg, bytes).unwrap();

    let err = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap_err();
    assert!(matches!(err, TagdexError::IndexCorrupted(_)));
}

#[test]
fn schema_mismatch_on_reopen() {
    let tmp = TempDir::new().unwrap();
    Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let other = Schema::new(vec![
        FieldSpec::new("url", FieldKind::Id),
        FieldSpec::new("body", FieldKind::Text),
    ]);
    let err = Index::open_or_create(db_path(&tmp), other).unwrap_err();
    assert!(matches!(err, TagdexError::SchemaMismatch { .. }));
}

#[test]
fn concurrent_writers_fail_fast() {
    let tmp = TempDir::new().unwrap();
    let index_a = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();
    let index_b = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let _open = index_a.begin_batch().unwrap();
    let err = index_b.begin_batch().unwrap_err();
    assert!(matches!(err, TagdexError::WriterBusy));
    assert!(err.is_retriable());
}

#[test]
fn abort_keeps_committed_state() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.add_document("/a.mp3", "pink floyd", ts(100));
    batch.commit().unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.add_document("/a.mp3", "overwritten", ts(200));
    batch.add_document("/b.mp3", "staged only", ts(200));
    batch.abort();

    assert_eq!(index.doc_count(), 1);
    assert_eq!(index.get("/a.mp3").unwrap().tags, "pink floyd");
    assert!(index.get("/b.mp3").is_none());
}

#[test]
fn reader_reload_sees_external_commit() {
    let tmp = TempDir::new().unwrap();
    let writer = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();
    let reader = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let mut batch = writer.begin_batch().unwrap();
    batch.add_document("/a.mp3", "pink floyd", ts(100));
    batch.commit().unwrap();

    // The reader handle keeps its snapshot until reloaded.
    assert_eq!(reader.doc_count(), 0);
    reader.reload().unwrap();
    assert_eq!(reader.doc_count(), 1);
}

#[test]
fn prune_removes_stale_paths_at_commit() {
    let tmp = TempDir::new().unwrap();
    let index = Index::open_or_create(db_path(&tmp), Schema::tag_schema()).unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.add_document("/keep.mp3", "pink floyd", ts(100));
    batch.add_document("/stale.mp3", "blur", ts(100));
    batch.commit().unwrap();

    let mut batch = index.begin_batch().unwrap();
    batch.prune(|path| path != "/stale.mp3");
    batch.commit().unwrap();

    assert_eq!(index.doc_count(), 1);
    assert!(index.get("/stale.mp3").is_none());
    assert!(index.searcher().query("blur", None).unwrap().is_empty());
}
