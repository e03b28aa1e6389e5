//! Immutable view over one committed segment
//!
//! A `Segment` is the unit of committed index state: the stored documents
//! plus one term dictionary and postings stream per indexed field. Searches
//! bind to an `Arc<Segment>` snapshot and are unaffected by commits that
//! complete while they run.

use std::collections::{BTreeMap, HashMap};
use std::io;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Result, TagdexError};

use super::postings::PostingsReader;
use super::term_dict::TermDictionary;
use super::types::{DocNo, Posting, PostingListMeta, SegmentMeta};

/// Serialized form of one field's inverted index
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldPayload {
    pub fst: Vec<u8>,
    pub term_meta: Vec<PostingListMeta>,
    pub postings: Vec<u8>,
    pub doc_lengths: Vec<u32>,
}

/// Serialized form of a whole segment, the bincode payload of a `gen_<N>.seg` file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentPayload {
    pub meta: SegmentMeta,
    pub docs: Vec<Document>,
    pub fields: BTreeMap<String, FieldPayload>,
}

/// Per-field reader: term dictionary + postings + length statistics
#[derive(Debug)]
pub struct FieldReader {
    terms: TermDictionary,
    postings: PostingsReader,
    doc_lengths: Vec<u32>,
    avg_doc_length: f32,
}

impl FieldReader {
    fn from_payload(payload: FieldPayload) -> io::Result<Self> {
        let terms = TermDictionary::new(payload.fst, payload.term_meta)?;
        let total: u64 = payload.doc_lengths.iter().map(|&l| l as u64).sum();
        let avg_doc_length = if payload.doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / payload.doc_lengths.len() as f32
        };
        Ok(Self {
            terms,
            postings: PostingsReader::new(payload.postings),
            doc_lengths: payload.doc_lengths,
            avg_doc_length,
        })
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    /// Decode the posting list for a term, or None if the term is unknown
    pub fn postings_for(&self, term: &str) -> io::Result<Option<Vec<Posting>>> {
        match self.terms.get(term) {
            Some(meta) => Ok(Some(self.postings.decode(meta)?)),
            None => Ok(None),
        }
    }

    /// Decode the posting list behind already-resolved metadata
    pub fn decode_postings(&self, meta: &PostingListMeta) -> io::Result<Vec<Posting>> {
        self.postings.decode(meta)
    }

    pub fn doc_frequency(&self, term: &str) -> u32 {
        self.terms.get(term).map(|m| m.doc_frequency).unwrap_or(0)
    }

    pub fn doc_length(&self, docno: DocNo) -> u32 {
        self.doc_lengths.get(docno.as_usize()).copied().unwrap_or(0)
    }

    pub fn doc_lengths(&self) -> &[u32] {
        &self.doc_lengths
    }

    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }
}

/// One committed generation of the index
#[derive(Debug)]
pub struct Segment {
    meta: SegmentMeta,
    docs: Vec<Document>,
    path_index: HashMap<String, DocNo>,
    fields: BTreeMap<String, FieldReader>,
}

impl Segment {
    /// The state of an index before its first commit
    pub fn empty() -> Self {
        Self {
            meta: SegmentMeta {
                generation: 0,
                doc_count: 0,
                created_at: 0,
            },
            docs: Vec::new(),
            path_index: HashMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Materialize a segment from its serialized payload
    pub fn from_payload(payload: SegmentPayload) -> Result<Self> {
        let mut fields = BTreeMap::new();
        for (name, field_payload) in payload.fields {
            let reader = FieldReader::from_payload(field_payload)
                .map_err(|e| TagdexError::IndexCorrupted(format!("field '{}': {}", name, e)))?;
            fields.insert(name, reader);
        }

        let mut path_index = HashMap::with_capacity(payload.docs.len());
        for (i, doc) in payload.docs.iter().enumerate() {
            path_index.insert(doc.path.clone(), DocNo(i as u32));
        }

        Ok(Self {
            meta: payload.meta,
            docs: payload.docs,
            path_index,
            fields,
        })
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn generation(&self) -> u64 {
        self.meta.generation
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Look up the current document for a path
    pub fn get(&self, path: &str) -> Option<&Document> {
        self.path_index
            .get(path)
            .and_then(|docno| self.docs.get(docno.as_usize()))
    }

    pub fn doc(&self, docno: DocNo) -> Option<&Document> {
        self.docs.get(docno.as_usize())
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn field(&self, name: &str) -> Option<&FieldReader> {
        self.fields.get(name)
    }
}
