//! Persistent storage for the index directory
//!
//! Layout: `meta.json` (schema descriptor), `gen_<N>.seg` segment files,
//! `CURRENT` pointing at the live generation, `write.lock` for single-writer
//! exclusion.
//!
//! Commit protocol:
//! 1. Write the new `gen_<N>.seg` file and fsync it
//! 2. Write `CURRENT.tmp` and fsync it
//! 3. Atomic rename to `CURRENT`, then fsync the directory
//!
//! A crash before step 3 leaves the previous `CURRENT` pointing at the
//! prior generation, so partially written segments are never visible.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TagdexError};
use crate::schema::Schema;

use super::reader::{Segment, SegmentPayload};

const META_FILE: &str = "meta.json";
const CURRENT_FILE: &str = "CURRENT";
const CURRENT_TMP_FILE: &str = "CURRENT.tmp";
const LOCK_FILE: &str = "write.lock";

/// Magic bytes opening every segment file
const SEGMENT_MAGIC: &[u8; 8] = b"TAGDEXSG";
/// On-disk format version
const FORMAT_VERSION: u32 = 1;

/// Index metadata persisted as `meta.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexMeta {
    format_version: u32,
    schema: Schema,
}

/// Handle to the index storage directory
#[derive(Debug)]
pub struct SegmentStore {
    dir: PathBuf,
}

impl SegmentStore {
    /// Open an existing store or initialize an empty one
    ///
    /// Creating writes `meta.json`; opening validates the stored schema and
    /// format version against the expected ones.
    pub fn open_or_create(dir: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let meta_path = dir.join(META_FILE);

        if !meta_path.exists() {
            debug!("tag database not found, creating new one in {}", dir.display());
            fs::create_dir_all(&dir)?;
            let meta = IndexMeta {
                format_version: FORMAT_VERSION,
                schema: schema.clone(),
            };
            let json = serde_json::to_vec_pretty(&meta)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            fs::write(&meta_path, json)?;
            return Ok(Self { dir });
        }

        debug!("opening tag database in {}", dir.display());
        let bytes = fs::read(&meta_path)?;
        let meta: IndexMeta = serde_json::from_slice(&bytes)
            .map_err(|e| TagdexError::IndexCorrupted(format!("unreadable meta.json: {}", e)))?;

        if meta.format_version != FORMAT_VERSION {
            return Err(TagdexError::IndexCorrupted(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }
        if &meta.schema != schema {
            return Err(TagdexError::SchemaMismatch {
                expected: schema.describe(),
                found: meta.schema.describe(),
            });
        }

        Ok(Self { dir })
    }

    /// Whether an index has been initialized at `dir`
    pub fn exists(dir: impl AsRef<Path>) -> bool {
        dir.as_ref().join(META_FILE).exists()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn segment_path(&self, generation: u64) -> PathBuf {
        self.dir.join(format!("gen_{}.seg", generation))
    }

    /// Load the segment `CURRENT` points at, or an empty segment before the
    /// first commit
    pub fn load_current(&self) -> Result<Segment> {
        let current_path = self.dir.join(CURRENT_FILE);
        if !current_path.exists() {
            return Ok(Segment::empty());
        }

        let content = fs::read_to_string(&current_path)?;
        let generation: u64 = content.trim().parse().map_err(|_| {
            TagdexError::IndexCorrupted(format!("CURRENT holds '{}'", content.trim()))
        })?;

        let bytes = fs::read(self.segment_path(generation))
            .map_err(|e| TagdexError::IndexCorrupted(format!("gen_{}.seg: {}", generation, e)))?;
        let payload = decode_segment(&bytes)?;
        Segment::from_payload(payload)
    }

    /// Durably publish a new generation and return it as a loaded segment
    ///
    /// Any failure maps to `CommitFailed` and leaves the previously
    /// committed generation fully intact.
    pub fn publish(&self, payload: SegmentPayload) -> Result<Segment> {
        let generation = payload.meta.generation;
        self.write_generation(&payload)
            .map_err(TagdexError::CommitFailed)?;
        self.sweep_stale_generations(generation);
        Segment::from_payload(payload)
    }

    fn write_generation(&self, payload: &SegmentPayload) -> io::Result<()> {
        let generation = payload.meta.generation;
        let bytes = encode_segment(payload)?;

        let seg_path = self.segment_path(generation);
        let mut seg_file = File::create(&seg_path)?;
        seg_file.write_all(&bytes)?;
        seg_file.sync_all()?;

        let tmp_path = self.dir.join(CURRENT_TMP_FILE);
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(generation.to_string().as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, self.dir.join(CURRENT_FILE))?;
        File::open(&self.dir)?.sync_all()?;

        debug!("published generation {}", generation);
        Ok(())
    }

    /// Remove segment files from superseded generations; failures only warn
    fn sweep_stale_generations(&self, current: u64) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(gen) = name
                .strip_prefix("gen_")
                .and_then(|rest| rest.strip_suffix(".seg"))
                .and_then(|num| num.parse::<u64>().ok())
            {
                if gen != current {
                    if let Err(e) = fs::remove_file(entry.path()) {
                        warn!("could not remove stale segment {}: {}", name, e);
                    }
                }
            }
        }
    }

    /// Acquire the exclusive writer lock, failing fast with `WriterBusy`
    ///
    /// The lock is held for the lifetime of the returned file handle.
    pub fn acquire_writer_lock(&self) -> Result<File> {
        let lock_path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(TagdexError::WriterBusy)
            }
            Err(e) => Err(TagdexError::Io(e)),
        }
    }
}

/// Frame a payload: magic, version, bincode body, trailing CRC32 of the body
fn encode_segment(payload: &SegmentPayload) -> io::Result<Vec<u8>> {
    let body =
        bincode::serialize(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    let checksum = hasher.finalize();

    let mut bytes = Vec::with_capacity(SEGMENT_MAGIC.len() + 8 + body.len());
    bytes.extend_from_slice(SEGMENT_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    Ok(bytes)
}

/// Validate framing and decode the payload, or fail with `IndexCorrupted`
fn decode_segment(bytes: &[u8]) -> Result<SegmentPayload> {
    let header_len = SEGMENT_MAGIC.len() + 4;
    if bytes.len() < header_len + 4 {
        return Err(TagdexError::IndexCorrupted(
            "segment file truncated".to_string(),
        ));
    }
    if &bytes[..SEGMENT_MAGIC.len()] != SEGMENT_MAGIC {
        return Err(TagdexError::IndexCorrupted(
            "bad segment magic".to_string(),
        ));
    }

    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&bytes[SEGMENT_MAGIC.len()..header_len]);
    let version = u32::from_le_bytes(version_bytes);
    if version != FORMAT_VERSION {
        return Err(TagdexError::IndexCorrupted(format!(
            "unsupported segment version {}",
            version
        )));
    }

    let body = &bytes[header_len..bytes.len() - 4];
    let mut checksum_bytes = [0u8; 4];
    checksum_bytes.copy_from_slice(&bytes[bytes.len() - 4..]);
    let stored_checksum = u32::from_le_bytes(checksum_bytes);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_checksum {
        return Err(TagdexError::IndexCorrupted(
            "segment checksum mismatch".to_string(),
        ));
    }

    bincode::deserialize(body)
        .map_err(|e| TagdexError::IndexCorrupted(format!("undecodable segment payload: {}", e)))
}
