//! Abstract syntax tree for query representation
//!
//! Every query type implements the `QueryNode` trait. The tree is immutable
//! once parsed; execution is pure and binds to the snapshot held by the
//! `QueryContext`.

use std::fmt::Debug;

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::segment::DocNo;

use super::context::QueryContext;

/// Core trait for all query nodes in the AST
pub trait QueryNode: Send + Sync + Debug {
    /// Execute the query and return matching document numbers as a bitmap
    fn execute(&self, ctx: &QueryContext) -> Result<RoaringBitmap>;

    /// Relevance contribution for a matching document
    ///
    /// Returns None when the document does not match this node.
    fn score(&self, ctx: &QueryContext, docno: DocNo) -> Option<f32>;

    /// Query type name for debugging and logging
    fn query_type(&self) -> &'static str;

    /// Clone this query node into a boxed trait object
    fn clone_box(&self) -> Box<dyn QueryNode>;
}

impl Clone for Box<dyn QueryNode> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
