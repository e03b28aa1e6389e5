//! Range query - matches terms within a lexical range
//!
//! On tokenized fields the bounds are compared against the term dictionary's
//! lexical ordering: `[apple TO bear]` matches a document containing
//! `azores` but not one containing `blur`. On the timestamp field the
//! bounds are parsed as dates and compared chronologically.

use std::ops::Bound;

use chrono::{DateTime, NaiveDate, Utc};
use roaring::RoaringBitmap;
use tracing::debug;

use crate::error::Result;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::schema::FieldKind;
use crate::segment::DocNo;

/// Query matching documents whose terms (or timestamp) fall in a range
#[derive(Clone, Debug)]
pub struct RangeQuery {
    /// Field to search in
    pub field: String,
    /// Lower bound; None = unbounded
    pub low: Option<String>,
    /// Upper bound; None = unbounded
    pub high: Option<String>,
    /// Lower bound is inclusive
    pub includes_low: bool,
    /// Upper bound is inclusive
    pub includes_high: bool,
}

impl RangeQuery {
    /// Create an inclusive range query
    pub fn new(field: impl Into<String>, low: Option<String>, high: Option<String>) -> Self {
        Self {
            field: field.into(),
            low,
            high,
            includes_low: true,
            includes_high: true,
        }
    }

    pub fn with_bounds_inclusive(mut self, includes_low: bool, includes_high: bool) -> Self {
        self.includes_low = includes_low;
        self.includes_high = includes_high;
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "range:{}:{:?}:{:?}:{}:{}",
            self.field, self.low, self.high, self.includes_low, self.includes_high
        )
    }

    fn term_range(&self, ctx: &QueryContext) -> RoaringBitmap {
        let reader = match ctx.segment().field(&self.field) {
            Some(reader) => reader,
            None => return RoaringBitmap::new(),
        };

        let low = self.low.as_ref().map(|b| ctx.tokenizer().normalize(b));
        let high = self.high.as_ref().map(|b| ctx.tokenizer().normalize(b));

        let low_bound = match (&low, self.includes_low) {
            (Some(lo), true) => Bound::Included(lo.as_str()),
            (Some(lo), false) => Bound::Excluded(lo.as_str()),
            (None, _) => Bound::Unbounded,
        };
        let high_bound = match (&high, self.includes_high) {
            (Some(hi), true) => Bound::Included(hi.as_str()),
            (Some(hi), false) => Bound::Excluded(hi.as_str()),
            (None, _) => Bound::Unbounded,
        };

        let mut result = RoaringBitmap::new();
        for (term, _) in reader.terms().range_scan(low_bound, high_bound) {
            result |= ctx.term_docs(&self.field, &term);
        }
        result
    }

    fn date_range(&self, ctx: &QueryContext) -> RoaringBitmap {
        let low = match self.low.as_deref().map(parse_date_bound) {
            Some(None) => {
                debug!("unparseable lower date bound {:?}", self.low);
                return RoaringBitmap::new();
            }
            Some(Some(ts)) => Some(ts),
            None => None,
        };
        let high = match self.high.as_deref().map(parse_date_bound) {
            Some(None) => {
                debug!("unparseable upper date bound {:?}", self.high);
                return RoaringBitmap::new();
            }
            Some(Some(ts)) => Some(ts),
            None => None,
        };

        let mut result = RoaringBitmap::new();
        for (i, doc) in ctx.segment().docs().iter().enumerate() {
            let ts = doc.last_updated;
            let above_low = match low {
                Some(lo) if self.includes_low => ts >= lo,
                Some(lo) => ts > lo,
                None => true,
            };
            let below_high = match high {
                Some(hi) if self.includes_high => ts <= hi,
                Some(hi) => ts < hi,
                None => true,
            };
            if above_low && below_high {
                result.insert(i as u32);
            }
        }
        result
    }
}

impl QueryNode for RangeQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let cache_key = self.cache_key();
        ctx.get_or_cache_filter(&cache_key, || {
            Ok(match ctx.field_kind(&self.field) {
                Some(FieldKind::Date) => self.date_range(ctx),
                Some(_) => self.term_range(ctx),
                None => RoaringBitmap::new(),
            })
        })
    }

    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32> {
        // Ranges filter rather than rank: constant score for matches.
        let matches = self
            .execute(ctx)
            .map(|bitmap| bitmap.contains(docno.as_u32()))
            .unwrap_or(false);
        if matches {
            Some(1.0)
        } else {
            None
        }
    }

    fn query_type(&self) -> &'static str {
        "range"
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

/// Parse a date bound as RFC 3339 or plain `YYYY-MM-DD`
fn parse_date_bound(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::{context_fixture, dated_fixture};

    #[test]
    fn test_lexical_range_inclusive() {
        let (segment, schema, tokenizer) =
            context_fixture(&[("/1.mp3", "azores"), ("/2.mp3", "blur")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = RangeQuery::new(
            "tags",
            Some("apple".to_string()),
            Some("bear".to_string()),
        );
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_lexical_range_exclusive() {
        let (segment, schema, tokenizer) = context_fixture(&[
            ("/1.mp3", "apple"),
            ("/2.mp3", "azores"),
            ("/3.mp3", "bear"),
        ]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = RangeQuery::new(
            "tags",
            Some("apple".to_string()),
            Some("bear".to_string()),
        )
        .with_bounds_inclusive(false, false);
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_unbounded_range() {
        let (segment, schema, tokenizer) =
            context_fixture(&[("/1.mp3", "apple"), ("/2.mp3", "zebra")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = RangeQuery::new("tags", None, Some("m".to_string()));
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_date_range() {
        let (segment, schema, tokenizer) = dated_fixture(&[
            ("/old.mp3", "x", "2020-06-01T00:00:00Z"),
            ("/new.mp3", "y", "2024-06-01T00:00:00Z"),
        ]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = RangeQuery::new(
            "last_updated",
            Some("2023-01-01".to_string()),
            Some("2025-01-01".to_string()),
        );
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_parse_date_bound() {
        assert!(parse_date_bound("2024-01-15").is_some());
        assert!(parse_date_bound("2024-01-15T10:30:00Z").is_some());
        assert!(parse_date_bound("not-a-date").is_none());
    }
}
