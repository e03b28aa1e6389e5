//! Term dictionary using FST (Finite State Transducer)
//!
//! Maps terms to postings metadata (offset, length, doc frequency). The FST
//! stores a u64 value which indexes into a metadata array. FST ordering
//! doubles as the lexical ordering used by range, prefix and wildcard scans.

use std::io;
use std::ops::Bound;

use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use super::types::PostingListMeta;

/// Term dictionary backed by FST
#[derive(Debug)]
pub struct TermDictionary {
    /// FST mapping term -> index in metadata array
    fst: Map<Vec<u8>>,
    /// Metadata for each term (parallel to FST output values)
    metadata: Vec<PostingListMeta>,
}

impl TermDictionary {
    /// Create a term dictionary from FST data and metadata
    pub fn new(fst_data: Vec<u8>, metadata: Vec<PostingListMeta>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self { fst, metadata })
    }

    /// Look up a term and return its postings metadata
    pub fn get(&self, term: &str) -> Option<&PostingListMeta> {
        self.fst
            .get(term.as_bytes())
            .and_then(|idx| self.metadata.get(idx as usize))
    }

    /// Check if a term exists
    pub fn contains(&self, term: &str) -> bool {
        self.fst.contains_key(term.as_bytes())
    }

    /// Get the number of terms
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// All terms sharing a prefix, in lexical order
    ///
    /// An empty prefix yields the whole dictionary.
    pub fn prefix_scan(&self, prefix: &str) -> Vec<(String, &PostingListMeta)> {
        let mut results = Vec::new();
        let mut stream = self.fst.range().ge(prefix.as_bytes()).into_stream();

        while let Some((key, idx)) = stream.next() {
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            if let Ok(term) = std::str::from_utf8(key) {
                if let Some(meta) = self.metadata.get(idx as usize) {
                    results.push((term.to_string(), meta));
                }
            }
        }

        results
    }

    /// Terms within a lexical range, in lexical order
    pub fn range_scan(
        &self,
        low: Bound<&str>,
        high: Bound<&str>,
    ) -> Vec<(String, &PostingListMeta)> {
        let mut builder = self.fst.range();
        match low {
            Bound::Included(lo) => builder = builder.ge(lo.as_bytes()),
            Bound::Excluded(lo) => builder = builder.gt(lo.as_bytes()),
            Bound::Unbounded => {}
        }
        match high {
            Bound::Included(hi) => builder = builder.le(hi.as_bytes()),
            Bound::Excluded(hi) => builder = builder.lt(hi.as_bytes()),
            Bound::Unbounded => {}
        }

        let mut results = Vec::new();
        let mut stream = builder.into_stream();
        while let Some((key, idx)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(key) {
                if let Some(meta) = self.metadata.get(idx as usize) {
                    results.push((term.to_string(), meta));
                }
            }
        }

        results
    }

    /// Iterate over all terms in the dictionary, in lexical order
    pub fn iter_terms(&self) -> Vec<(String, &PostingListMeta)> {
        self.prefix_scan("")
    }

    /// Get the raw FST data (for serialization)
    pub fn fst_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    /// Get the metadata array (for serialization)
    pub fn metadata(&self) -> &[PostingListMeta] {
        &self.metadata
    }
}

/// Builder for term dictionaries
pub struct TermDictionaryBuilder {
    builder: MapBuilder<Vec<u8>>,
    metadata: Vec<PostingListMeta>,
}

impl TermDictionaryBuilder {
    pub fn new() -> Self {
        Self {
            builder: MapBuilder::memory(),
            metadata: Vec::new(),
        }
    }

    /// Add a term with its postings metadata
    ///
    /// Terms MUST be added in lexicographic order.
    pub fn add(&mut self, term: &str, meta: PostingListMeta) -> io::Result<()> {
        let idx = self.metadata.len() as u64;
        self.builder
            .insert(term.as_bytes(), idx)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.metadata.push(meta);
        Ok(())
    }

    pub fn build(self) -> io::Result<TermDictionary> {
        let fst = self.builder.into_map();
        Ok(TermDictionary {
            fst,
            metadata: self.metadata,
        })
    }
}

impl Default for TermDictionaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(doc_frequency: u32) -> PostingListMeta {
        PostingListMeta {
            offset: 0,
            length: 0,
            doc_frequency,
            total_term_frequency: doc_frequency as u64,
        }
    }

    fn sample_dict() -> TermDictionary {
        let mut builder = TermDictionaryBuilder::new();
        for (i, term) in ["apple", "azores", "bear", "blur", "pink"].iter().enumerate() {
            builder.add(term, meta(i as u32 + 1)).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_get_and_contains() {
        let dict = sample_dict();
        assert_eq!(dict.len(), 5);
        assert!(dict.contains("pink"));
        assert!(!dict.contains("floyd"));
        assert_eq!(dict.get("bear").unwrap().doc_frequency, 3);
        assert!(dict.get("missing").is_none());
    }

    #[test]
    fn test_prefix_scan() {
        let dict = sample_dict();
        let hits: Vec<_> = dict.prefix_scan("a").into_iter().map(|(t, _)| t).collect();
        assert_eq!(hits, vec!["apple", "azores"]);

        let all: Vec<_> = dict.prefix_scan("").into_iter().map(|(t, _)| t).collect();
        assert_eq!(all, vec!["apple", "azores", "bear", "blur", "pink"]);
    }

    #[test]
    fn test_range_scan_inclusive() {
        let dict = sample_dict();
        let hits: Vec<_> = dict
            .range_scan(Bound::Included("apple"), Bound::Included("bear"))
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(hits, vec!["apple", "azores", "bear"]);
    }

    #[test]
    fn test_range_scan_exclusive() {
        let dict = sample_dict();
        let hits: Vec<_> = dict
            .range_scan(Bound::Excluded("apple"), Bound::Excluded("bear"))
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(hits, vec!["azores"]);
    }

    #[test]
    fn test_range_scan_unbounded() {
        let dict = sample_dict();
        let hits: Vec<_> = dict
            .range_scan(Bound::Unbounded, Bound::Excluded("bear"))
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(hits, vec!["apple", "azores"]);
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let dict = sample_dict();
        let restored =
            TermDictionary::new(dict.fst_bytes().to_vec(), dict.metadata().to_vec()).unwrap();
        assert!(restored.contains("blur"));
        assert_eq!(restored.len(), 5);
    }
}
