//! Phrase and sequence matching
//!
//! With `slop == 0` this is an exact phrase: terms must be adjacent and in
//! order. With `slop > 0` it is a sequence: one position is chosen per term
//! so that the total displacement from perfect adjacency stays within the
//! slop budget, which also tolerates reordered terms. `"pink floyd"~5`
//! matches a document tagged `floyd pink` (displacement 2) but `"pink
//! floyd"` does not.

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocNo;

/// Query matching an ordered sequence of terms within a slop budget
#[derive(Clone, Debug)]
pub struct PhraseQuery {
    /// Field to search in
    pub field: String,
    /// The phrase text, tokenized at execution time
    pub phrase: String,
    /// Maximum total positional displacement (0 = exact phrase)
    pub slop: u32,
}

impl PhraseQuery {
    /// Create an exact phrase query (slop = 0)
    pub fn new(field: impl Into<String>, phrase: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            phrase: phrase.into(),
            slop: 0,
        }
    }

    /// Set the slop budget
    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    fn cache_key(&self) -> String {
        format!("phrase:{}:{}:{}", self.field, self.phrase, self.slop)
    }

    fn terms(&self, ctx: &QueryContext) -> Vec<String> {
        ctx.tokenizer().tokenize(&self.phrase)
    }

    /// Check the position constraint for one candidate document
    fn positions_match(&self, ctx: &QueryContext, terms: &[String], docno: DocNo) -> bool {
        let mut position_lists: Vec<Vec<u32>> = Vec::with_capacity(terms.len());
        for term in terms {
            let postings = ctx.postings(&self.field, term);
            match postings.binary_search_by_key(&docno, |p| p.docno) {
                Ok(i) => position_lists.push(postings[i].positions.clone()),
                Err(_) => return false,
            }
        }
        let slices: Vec<&[u32]> = position_lists.iter().map(|l| l.as_slice()).collect();
        sequence_matches(&slices, self.slop)
    }
}

impl QueryNode for PhraseQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let cache_key = self.cache_key();
        ctx.get_or_cache_filter(&cache_key, || {
            let terms = self.terms(ctx);
            if terms.is_empty() {
                return Ok(RoaringBitmap::new());
            }

            // Intersect candidate documents containing every term.
            let mut candidates: Option<RoaringBitmap> = None;
            for term in &terms {
                let term_docs = ctx.term_docs(&self.field, term);
                candidates = Some(match candidates {
                    Some(existing) => existing & term_docs,
                    None => term_docs,
                });
                if candidates.as_ref().map(|c| c.is_empty()).unwrap_or(true) {
                    return Ok(RoaringBitmap::new());
                }
            }

            let mut result = RoaringBitmap::new();
            for docno in candidates.unwrap_or_default() {
                if self.positions_match(ctx, &terms, DocNo(docno)) {
                    result.insert(docno);
                }
            }
            Ok(result)
        })
    }

    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32> {
        let terms = self.terms(ctx);
        let mut total = 0.0;
        let mut matched = false;
        for term in &terms {
            if let Some(score) = ctx.bm25(&self.field, term, docno) {
                total += score;
                matched = true;
            }
        }
        if matched {
            Some(total)
        } else {
            None
        }
    }

    fn query_type(&self) -> &'static str {
        if self.slop == 0 {
            "phrase"
        } else {
            "sequence"
        }
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

/// Check whether one position can be chosen per term so the total
/// displacement from perfect adjacency stays within `slop`
fn sequence_matches(position_lists: &[&[u32]], slop: u32) -> bool {
    if position_lists.is_empty() {
        return false;
    }
    let (first, rest) = position_lists.split_first().unwrap();
    first
        .iter()
        .any(|&start| matches_from(start, rest, slop as i64))
}

/// Recursively place the remaining terms, spending displacement budget
fn matches_from(prev: u32, remaining: &[&[u32]], budget: i64) -> bool {
    if remaining.is_empty() {
        return true;
    }
    let (next, rest) = remaining.split_first().unwrap();
    let expected = prev as i64 + 1;
    next.iter().any(|&pos| {
        if pos == prev {
            // Two query terms cannot occupy the same token.
            return false;
        }
        let cost = (pos as i64 - expected).abs();
        cost <= budget && matches_from(pos, rest, budget - cost)
    })
}
