//! Query execution context
//!
//! The `QueryContext` gives query nodes access to one immutable segment
//! snapshot plus per-search caches shared between the execute and score
//! passes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use roaring::RoaringBitmap;

use crate::error::Result;
use crate::schema::{FieldKind, Schema};
use crate::segment::{DocNo, Posting, Segment};
use crate::tokenizer::Tokenizer;

use super::scoring::bm25_score;

/// Context passed to query nodes during execution
pub struct QueryContext<'a> {
    segment: &'a Segment,
    schema: &'a Schema,
    tokenizer: &'a Tokenizer,
    /// Decoded posting lists, keyed by "field\0term"
    postings_cache: RwLock<HashMap<String, Arc<Vec<Posting>>>>,
    /// Bitmap results of executed subqueries, keyed by node cache key
    filter_cache: RwLock<HashMap<String, RoaringBitmap>>,
    /// Term expansions of fuzzy/wildcard nodes: (term, edit distance)
    expansion_cache: RwLock<HashMap<String, Arc<Vec<(String, u32)>>>>,
}

impl<'a> QueryContext<'a> {
    pub fn new(segment: &'a Segment, schema: &'a Schema, tokenizer: &'a Tokenizer) -> Self {
        Self {
            segment,
            schema,
            tokenizer,
            postings_cache: RwLock::new(HashMap::new()),
            filter_cache: RwLock::new(HashMap::new()),
            expansion_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn segment(&self) -> &Segment {
        self.segment
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        self.tokenizer
    }

    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        self.schema.field(field).map(|f| f.kind)
    }

    /// Total number of documents in the snapshot
    pub fn total_docs(&self) -> u32 {
        self.segment.doc_count()
    }

    /// Bitmap of every document number in the snapshot
    pub fn all_docs(&self) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        if self.total_docs() > 0 {
            bitmap.insert_range(0..self.total_docs());
        }
        bitmap
    }

    /// Decoded posting list for a term, cached for the duration of the search
    ///
    /// Unknown fields and unknown terms both yield an empty list.
    pub fn postings(&self, field: &str, term: &str) -> Arc<Vec<Posting>> {
        let key = format!("{}\0{}", field, term);
        if let Some(cached) = self.postings_cache.read().get(&key) {
            return Arc::clone(cached);
        }

        let decoded = self
            .segment
            .field(field)
            .and_then(|f| f.postings_for(term).ok().flatten())
            .unwrap_or_default();
        let arc = Arc::new(decoded);
        self.postings_cache
            .write()
            .insert(key, Arc::clone(&arc));
        arc
    }

    /// Bitmap of documents containing a term in a field
    pub fn term_docs(&self, field: &str, term: &str) -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::new();
        for posting in self.postings(field, term).iter() {
            bitmap.insert(posting.docno.as_u32());
        }
        bitmap
    }

    pub fn doc_frequency(&self, field: &str, term: &str) -> u32 {
        self.segment
            .field(field)
            .map(|f| f.doc_frequency(term))
            .unwrap_or(0)
    }

    /// Term frequency of `term` in one document, if it occurs there
    pub fn term_frequency(&self, field: &str, term: &str, docno: DocNo) -> Option<u32> {
        let postings = self.postings(field, term);
        postings
            .binary_search_by_key(&docno, |p| p.docno)
            .ok()
            .map(|i| postings[i].term_frequency())
    }

    /// BM25 contribution of a term occurrence in a document field
    pub fn bm25(&self, field: &str, term: &str, docno: DocNo) -> Option<f32> {
        let tf = self.term_frequency(field, term, docno)?;
        let reader = self.segment.field(field)?;
        Some(bm25_score(
            tf as f32,
            reader.doc_frequency(term) as f32,
            self.total_docs() as f32,
            reader.doc_length(docno) as f32,
            reader.avg_doc_length(),
        ))
    }

    /// Get or compute a cached filter result
    pub fn get_or_cache_filter<F>(&self, cache_key: &str, compute: F) -> Result<RoaringBitmap>
    where
        F: FnOnce() -> Result<RoaringBitmap>,
    {
        if let Some(cached) = self.filter_cache.read().get(cache_key) {
            return Ok(cached.clone());
        }
        let bitmap = compute()?;
        self.filter_cache
            .write()
            .insert(cache_key.to_string(), bitmap.clone());
        Ok(bitmap)
    }

    /// Get or compute the term expansion of a fuzzy/wildcard node
    ///
    /// Entries pair each matched dictionary term with its edit distance from
    /// the query term (0 for wildcard expansions).
    pub fn get_or_cache_expansion<F>(&self, cache_key: &str, compute: F) -> Arc<Vec<(String, u32)>>
    where
        F: FnOnce() -> Vec<(String, u32)>,
    {
        if let Some(cached) = self.expansion_cache.read().get(cache_key) {
            return Arc::clone(cached);
        }
        let expansion = Arc::new(compute());
        self.expansion_cache
            .write()
            .insert(cache_key.to_string(), Arc::clone(&expansion));
        expansion
    }
}
