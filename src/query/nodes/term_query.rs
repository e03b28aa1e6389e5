//! Term query - matches a single normalized token in one field

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocNo;

/// Query matching documents containing an exact term
#[derive(Clone, Debug)]
pub struct TermQuery {
    /// Field to search in
    pub field: String,
    /// Term to match, normalized at execution time
    pub term: String,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
        }
    }

    fn normalized(&self, ctx: &QueryContext) -> String {
        ctx.tokenizer().normalize(&self.term)
    }
}

impl QueryNode for TermQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        Ok(ctx.term_docs(&self.field, &self.normalized(ctx)))
    }

    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32> {
        ctx.bm25(&self.field, &self.normalized(ctx), docno)
    }

    fn query_type(&self) -> &'static str {
        "term"
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::context_fixture;

    #[test]
    fn test_term_query_matches() {
        let (segment, schema, tokenizer) =
            context_fixture(&[("/a.mp3", "pink floyd"), ("/b.mp3", "blur")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = TermQuery::new("tags", "pink");
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains(0));

        assert!(query.score(&ctx, DocNo(0)).is_some());
        assert!(query.score(&ctx, DocNo(1)).is_none());
    }

    #[test]
    fn test_term_query_normalizes_case() {
        let (segment, schema, tokenizer) = context_fixture(&[("/a.mp3", "pink floyd")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = TermQuery::new("tags", "PINK");
        assert_eq!(query.execute(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_field_matches_nothing() {
        let (segment, schema, tokenizer) = context_fixture(&[("/a.mp3", "pink floyd")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = TermQuery::new("artist", "pink");
        assert!(query.execute(&ctx).unwrap().is_empty());
    }
}
