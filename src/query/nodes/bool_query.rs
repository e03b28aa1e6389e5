//! Boolean query - combines clauses with AND, OR, NOT semantics
//!
//! - `must`: every clause must match (intersection), contributes to score
//! - `should`: at least one clause must match when no `must` clauses exist
//!   (union); with `must` clauses present it only contributes to score
//! - `must_not`: no clause may match; the complement is taken within the
//!   snapshot's document domain
//!
//! `a ANDNOT b` is expressed as `must: [a], must_not: [b]`; a bare `NOT a`
//! as `must_not: [a]` alone.

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocNo;

/// Boolean query combining multiple clauses
#[derive(Clone, Debug, Default)]
pub struct BoolQuery {
    /// Clauses that must match (AND, scoring)
    pub must: Vec<Box<dyn QueryNode>>,
    /// Clauses where at least one should match (OR, scoring)
    pub should: Vec<Box<dyn QueryNode>>,
    /// Clauses that must not match (NOT, no scoring)
    pub must_not: Vec<Box<dyn QueryNode>>,
}

impl BoolQuery {
    /// Create a new empty boolean query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must clause (boxed)
    pub fn must_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.must.push(query);
        self
    }

    /// Add a should clause (boxed)
    pub fn should_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.should.push(query);
        self
    }

    /// Add a must_not clause (boxed)
    pub fn must_not_boxed(mut self, query: Box<dyn QueryNode>) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }
}

impl QueryNode for BoolQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;

        for query in &self.must {
            let matches = query.execute(ctx)?;
            result = Some(match result {
                Some(existing) => existing & matches,
                None => matches,
            });
            if result.as_ref().map(|r| r.is_empty()).unwrap_or(false) {
                return Ok(RoaringBitmap::new());
            }
        }

        // Without must clauses, should clauses select the union; with them,
        // should only influences scoring.
        if result.is_none() && !self.should.is_empty() {
            let mut union = RoaringBitmap::new();
            for query in &self.should {
                union |= query.execute(ctx)?;
            }
            result = Some(union);
        }

        // A pure must_not query complements within the whole domain.
        let mut result = match result {
            Some(bitmap) => bitmap,
            None => ctx.all_docs(),
        };

        for query in &self.must_not {
            result -= query.execute(ctx)?;
            if result.is_empty() {
                break;
            }
        }

        Ok(result)
    }

    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32> {
        let mut total = 0.0;
        let mut matched = false;
        for query in self.must.iter().chain(self.should.iter()) {
            if let Some(score) = query.score(ctx, docno) {
                total += score;
                matched = true;
            }
        }
        if matched {
            Some(total)
        } else {
            // Pure must_not queries match without ranking signal.
            Some(0.0)
        }
    }

    fn query_type(&self) -> &'static str {
        "bool"
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::context_fixture;
    use crate::query::nodes::TermQuery;
    use crate::query::QueryContext;

    fn term(field: &str, term: &str) -> Box<dyn QueryNode> {
        Box::new(TermQuery::new(field, term))
    }

    fn fixture() -> (
        crate::segment::Segment,
        crate::schema::Schema,
        crate::tokenizer::Tokenizer,
    ) {
        context_fixture(&[
            ("/1.mp3", "pink floyd"),
            ("/2.mp3", "pink"),
            ("/3.mp3", "floyd"),
        ])
    }

    #[test]
    fn test_must_is_intersection() {
        let (segment, schema, tokenizer) = fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = BoolQuery::new()
            .must_boxed(term("tags", "pink"))
            .must_boxed(term("tags", "floyd"));
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_should_is_union() {
        let (segment, schema, tokenizer) = fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = BoolQuery::new()
            .should_boxed(term("tags", "pink"))
            .should_boxed(term("tags", "floyd"));
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_must_not_is_difference() {
        let (segment, schema, tokenizer) = fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        // pink ANDNOT floyd
        let query = BoolQuery::new()
            .must_boxed(term("tags", "pink"))
            .must_not_boxed(term("tags", "floyd"));
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_pure_not_complements_domain() {
        let (segment, schema, tokenizer) = fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = BoolQuery::new().must_not_boxed(term("tags", "pink"));
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_score_sums_matching_children() {
        let (segment, schema, tokenizer) = fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = BoolQuery::new()
            .should_boxed(term("tags", "pink"))
            .should_boxed(term("tags", "floyd"));

        let both = query.score(&ctx, DocNo(0)).unwrap();
        let only_pink = query.score(&ctx, DocNo(1)).unwrap();
        assert!(both > only_pink);
    }
}
