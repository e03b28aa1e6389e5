/// Scoring functions for search operations

/// BM25 parameters
pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

/// Compute BM25 score for a term in a document
///
/// # Arguments
/// * `tf` - Term frequency in document
/// * `df` - Document frequency (how many documents contain the term)
/// * `total_docs` - Total number of documents in the index
/// * `doc_len` - Length of the document field (in tokens)
/// * `avg_doc_len` - Average field length across all documents
pub fn bm25_score(tf: f32, df: f32, total_docs: f32, doc_len: f32, avg_doc_len: f32) -> f32 {
    let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
    let norm = 1.0 - BM25_B + BM25_B * (doc_len / avg_doc_len.max(1.0));
    idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm)
}
