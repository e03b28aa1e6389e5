//! Query node implementations

mod bool_query;
mod fuzzy_query;
mod phrase_query;
mod range_query;
mod term_query;
mod wildcard_query;

pub use bool_query::BoolQuery;
pub use fuzzy_query::{edit_distance, FuzzyQuery, DEFAULT_MAX_EDITS};
pub use phrase_query::PhraseQuery;
pub use range_query::RangeQuery;
pub use term_query::TermQuery;
pub use wildcard_query::WildcardQuery;
