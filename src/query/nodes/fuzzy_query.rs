//! Fuzzy query - matches terms within a bounded edit distance
//!
//! One edit is an insertion, a deletion, or a transposition of adjacent
//! characters; replacing a character costs two edits (a deletion plus an
//! insertion). So `cat~` matches `cast`, `at` and `act`, while `bat` needs
//! `cat~2`. A prefix length constrains the expansion to dictionary terms
//! sharing that many leading characters exactly.

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::segment::DocNo;

/// Default maximum edit distance when none is given (`term~`)
pub const DEFAULT_MAX_EDITS: u32 = 1;

/// Query matching terms within an edit distance of the query term
#[derive(Clone, Debug)]
pub struct FuzzyQuery {
    /// Field to search in
    pub field: String,
    /// Term to match approximately
    pub term: String,
    /// Maximum edit distance
    pub max_edits: u32,
    /// Number of leading characters that must match exactly
    pub prefix_length: usize,
}

impl FuzzyQuery {
    pub fn new(field: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            term: term.into(),
            max_edits: DEFAULT_MAX_EDITS,
            prefix_length: 0,
        }
    }

    /// Set the maximum edit distance
    pub fn with_max_edits(mut self, max_edits: u32) -> Self {
        self.max_edits = max_edits;
        self
    }

    /// Set the number of leading characters that must match exactly
    pub fn with_prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "fuzzy:{}:{}:{}:{}",
            self.field, self.term, self.max_edits, self.prefix_length
        )
    }

    /// The prefix a dictionary term must share exactly
    fn required_prefix(term: &str, prefix_length: usize) -> &str {
        match term.char_indices().nth(prefix_length) {
            Some((byte_index, _)) => &term[..byte_index],
            None => term,
        }
    }

    /// Dictionary terms within the edit budget, paired with their distances
    fn expansion(&self, ctx: &QueryContext) -> std::sync::Arc<Vec<(String, u32)>> {
        let term = ctx.tokenizer().normalize(&self.term);
        ctx.get_or_cache_expansion(&self.cache_key(), || {
            let reader = match ctx.segment().field(&self.field) {
                Some(reader) => reader,
                None => return Vec::new(),
            };
            let prefix = Self::required_prefix(&term, self.prefix_length);
            let term_len = term.chars().count() as i64;

            reader
                .terms()
                .prefix_scan(prefix)
                .into_iter()
                .filter_map(|(candidate, _)| {
                    // Length difference is a lower bound on the distance.
                    let candidate_len = candidate.chars().count() as i64;
                    if (candidate_len - term_len).abs() > self.max_edits as i64 {
                        return None;
                    }
                    let distance = edit_distance(&term, &candidate);
                    if distance <= self.max_edits {
                        Some((candidate, distance))
                    } else {
                        None
                    }
                })
                .collect()
        })
    }
}

impl QueryNode for FuzzyQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap> {
        let expansion = self.expansion(ctx);
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
        // Closer variants contribute more.
        let expansion = self.expansion(ctx);
        let mut total = 0.0;
        let mut matched = false;
        for (term, distance) in expansion.iter() {
            if let Some(score) = ctx.bm25(&self.field, term, docno) {
                total += score / (1.0 + *distance as f32);
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
        "fuzzy"
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

/// Edit distance where insertions, deletions and adjacent transpositions
/// each cost one edit and a character replacement costs two
pub fn edit_distance(s1: &str, s2: &str) -> u32 {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2 as u32;
    }
    if len2 == 0 {
        return len1 as u32;
    }

    let mut matrix = vec![vec![0u32; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i as u32;
    }
    for j in 0..=len2 {
        matrix[0][j] = j as u32;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let same = s1_chars[i - 1] == s2_chars[j - 1];
            let diagonal = matrix[i - 1][j - 1] + if same { 0 } else { 2 };

            matrix[i][j] = std::cmp::min(
                std::cmp::min(
                    matrix[i - 1][j] + 1, // deletion
                    matrix[i][j - 1] + 1, // insertion
                ),
                diagonal,
            );

            // Adjacent transposition
            if i > 1
                && j > 1
                && s1_chars[i - 1] == s2_chars[j - 2]
                && s1_chars[i - 2] == s2_chars[j - 1]
            {
                matrix[i][j] = std::cmp::min(matrix[i][j], matrix[i - 2][j - 2] + 1);
            }
        }
    }

    matrix[len1][len2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_util::context_fixture;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("cat", "cat"), 0);
        assert_eq!(edit_distance("cat", "cast"), 1); // insertion
        assert_eq!(edit_distance("cat", "at"), 1); // deletion
        assert_eq!(edit_distance("cat", "act"), 1); // transposition
        assert_eq!(edit_distance("cat", "bat"), 2); // replacement = delete + insert
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
    }

    #[test]
    fn test_required_prefix() {
        assert_eq!(FuzzyQuery::required_prefix("johannson", 3), "joh");
        assert_eq!(FuzzyQuery::required_prefix("hi", 10), "hi");
        assert_eq!(FuzzyQuery::required_prefix("hi", 0), "");
    }

    fn fuzzy_fixture() -> (
        crate::segment::Segment,
        crate::schema::Schema,
        crate::tokenizer::Tokenizer,
    ) {
        context_fixture(&[
            ("/1.mp3", "cast"),
            ("/2.mp3", "at"),
            ("/3.mp3", "act"),
            ("/4.mp3", "bat"),
        ])
    }

    #[test]
    fn test_fuzzy_default_distance() {
        let (segment, schema, tokenizer) = fuzzy_fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = FuzzyQuery::new("tags", "cat");
        let result = query.execute(&ctx).unwrap();
        // cast, at and act are one edit away; bat is two.
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_fuzzy_distance_two() {
        let (segment, schema, tokenizer) = fuzzy_fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = FuzzyQuery::new("tags", "cat").with_max_edits(2);
        let result = query.execute(&ctx).unwrap();
        assert!(result.contains(3), "bat is two edits from cat");
    }

    #[test]
    fn test_fuzzy_prefix_constraint() {
        let (segment, schema, tokenizer) = fuzzy_fixture();
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        // Requiring the first character to match exactly drops "at" and "act".
        let query = FuzzyQuery::new("tags", "cat").with_prefix_length(1);
        let result = query.execute(&ctx).unwrap();
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_fuzzy_scores_closer_variant_higher() {
        let (segment, schema, tokenizer) =
            context_fixture(&[("/1.mp3", "cat"), ("/2.mp3", "cast")]);
        let ctx = QueryContext::new(&segment, &schema, &tokenizer);

        let query = FuzzyQuery::new("tags", "cat");
        let exact = query.score(&ctx, DocNo(0)).unwrap();
        let near = query.score(&ctx, DocNo(1)).unwrap();
        assert!(exact > near);
    }
}
