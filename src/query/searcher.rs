//! Search execution
//!
//! A `Searcher` binds one immutable segment snapshot at creation: commits
//! that complete while a search runs never affect its results. Matches are
//! ranked by descending score with ties broken by insertion order, and the
//! limit is applied only after global ranking.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::schema::Schema;
use crate::segment::{DocNo, Segment};
use crate::tokenizer::Tokenizer;

use super::ast::QueryNode;
use super::context::QueryContext;
use super::query_string::parse_query;

/// A single search hit
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    /// Path of the matching document
    pub path: String,
    /// Relevance score
    pub score: f32,
}

/// Executes queries against one committed snapshot
pub struct Searcher {
    segment: Arc<Segment>,
    schema: Schema,
    tokenizer: Tokenizer,
    default_fields: Vec<String>,
}

impl Searcher {
    pub(crate) fn new(segment: Arc<Segment>, schema: Schema, tokenizer: Tokenizer) -> Self {
        let default_fields = schema.default_search_fields();
        Self {
            segment,
            schema,
            tokenizer,
            default_fields,
        }
    }

    /// Number of documents visible to this searcher
    pub fn doc_count(&self) -> u32 {
        self.segment.doc_count()
    }

    /// Parse a query string against this searcher's schema and default fields
    pub fn parse(&self, input: &str) -> Result<Box<dyn QueryNode>> {
        let query = parse_query(input, &self.schema, &self.default_fields)?;
        debug!("parsed search query {:?}", query);
        Ok(query)
    }

    /// Execute a query expression, returning ranked hits
    ///
    /// `limit` of None returns all matches. Truncation happens after global
    /// ranking, so a limited search returns the highest-ranked matches.
    pub fn search(&self, query: &dyn QueryNode, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let ctx = QueryContext::new(&self.segment, &self.schema, &self.tokenizer);
        let matches = query.execute(&ctx)?;

        let mut ranked: Vec<(DocNo, f32)> = matches
            .iter()
            .map(|docno| {
                let docno = DocNo(docno);
                let score = query.score(&ctx, docno).unwrap_or(0.0);
                (docno, score)
            })
            .collect();

        // Descending score; insertion order breaks ties deterministically.
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        if let Some(limit) = limit {
            ranked.truncate(limit);
        }

        Ok(ranked
            .into_iter()
            .filter_map(|(docno, score)| {
                self.segment.doc(docno).map(|doc| SearchHit {
                    path: doc.path.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Parse and execute in one step
    pub fn query(&self, input: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let query = self.parse(input)?;
        self.search(query.as_ref(), limit)
    }
}
