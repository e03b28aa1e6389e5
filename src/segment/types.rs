//! Core types for the segment-based index

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense document number within a segment (0..doc_count)
///
/// Used internally for posting list storage; the external identity of a
/// document is its path.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocNo(pub u32);

impl DocNo {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc_{}", self.0)
    }
}

/// A single posting entry within a posting list
///
/// Positions are 0-indexed token offsets within the field's text and are
/// strictly increasing per posting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Dense document number within the segment
    pub docno: DocNo,
    /// Token positions where the term occurs
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(docno: DocNo, positions: Vec<u32>) -> Self {
        Self { docno, positions }
    }

    /// Term frequency in this document
    pub fn term_frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Posting list metadata stored in the term dictionary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostingListMeta {
    /// Offset in the postings byte stream
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Document frequency (number of documents containing this term)
    pub doc_frequency: u32,
    /// Total term frequency across all documents
    pub total_term_frequency: u64,
}

/// Metadata describing one committed segment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Generation number; each commit publishes the next generation
    pub generation: u64,
    /// Number of documents in the segment
    pub doc_count: u32,
    /// Unix timestamp of the commit that produced this segment
    pub created_at: i64,
}
