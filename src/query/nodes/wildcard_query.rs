//! Wildcard query - matches terms against a pattern
//!
//! `?` matches exactly one character, `*` zero or more. Patterns are matched
//! against individual dictionary terms, so a wildcard never expands across a
//! token boundary: `pin*oyd` does not match the two tokens of `pink floyd`.

use regex::Regex;
use roaring::RoaringBitmap;

use crate::error::{Result, TagdexError};
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocNo;

/// Query matching terms by wildcard pattern
#[derive(Clone, Debug)]
pub struct WildcardQuery {
    /// Field to search in
    pub field: String,
    /// Wildcard pattern
    pub pattern: String,
}

impl WildcardQuery {
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    fn cache_key(&self) -> String {
        format!("wildcard:{}:{}", self.field, self.pattern)
    }

    /// Convert the wildcard pattern to a compiled anchored regex
    fn pattern_to_regex(pattern: &str) -> Result<Regex> {
        let mut regex_pattern = String::with_capacity(pattern.len() + 8);
        regex_pattern.push('^');

        for ch in pattern.chars() {
            match ch {
                '*' => regex_pattern.push_str(".*"),
                '?' => regex_pattern.push('.'),
                '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                    regex_pattern.push('\\');
                    regex_pattern.push(ch);
                }
                _ => regex_pattern.push(ch),
            }
        }

        regex_pattern.push('$');

        Regex::new(&regex_pattern).map_err(|e| {
            TagdexError::syntax(0, format!("invalid wildcard pattern: {}", e))
        })
    }

    /// Longest literal prefix before the first wildcard, used to narrow the
    /// dictionary scan
    fn literal_prefix(pattern: &str) -> &str {
        let end = pattern
            .find(|c| c == '*' || c == '?')
            .unwrap_or(pattern.len());
        &pattern[..end]
    }

    fn has_wildcards(&self) -> bool {
        self.pattern.contains('*') || self.pattern.contains('?')
    }

    /// Dictionary terms the pattern expands to, cached per search
    fn expansion(&self, ctx: &QueryContext) -> Result<std::sync::Arc<Vec<(String, u32)>>> {
        let pattern = ctx.tokenizer().normalize(&self.pattern);
        let regex = Self::pattern_to_regex(&pattern)?;
        Ok(ctx.get_or_cache_expansion(&self.cache_key(), || {
            let reader = match ctx.segment().field(&self.field) {
                Some(reader) => reader,
                None => return Vec::new(),
            };
            reader
                .terms()
                .prefix_scan(Self::literal_prefix(&pattern))
                .into_iter()
                .filter(|(term, _)| regex.is_match(term))
                .map(|(term, _)| (term, 0))
                .collect()
        }))
    }
}

impl QueryNode for WildcardQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        if !self.has_wildcards() {
            // No wildcards: behaves as an exact term lookup.
            let term = ctx.tokenizer().normalize(&self.pattern);
            return Ok(ctx.term_docs(&self.field, &term));
        }

        let expansion = self.expansion(ctx)?;
        let cache_key = self.cache_key();
        ctx.get_or_cache_filter(&cache_key, || {
            let mut result = RoaringBitmap::new();
            for (term, _) in expansion.iter() {
                result |= ctx.term_docs(&self.field, term);
            }
            Ok(result)
        })
    }

    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32> {
        if !self.has_wildcards() {
            let term = ctx.tokenizer().normalize(&self.pattern);
            return ctx.bm25(&self.field, &term, docno);
        }
        // Constant scoring over the expanded terms.
        let expansion = self.expansion(ctx).ok()?;
        let matched = expansion
            .iter()
            .any(|(term, _)| ctx.term_frequency(&self.field, term, docno).is_some());
        if matched {
            Some(1.0)
        } else {
            None
        }
    }

    fn query_type(&self) -> &'static str {
        "wildcard"
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
