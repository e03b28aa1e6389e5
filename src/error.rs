use thiserror::Error;

/// Main error type for tagdex operations
#[derive(Error, Debug)]
pub enum TagdexError {
    #[error("schema mismatch: index stores [{found}], expected [{expected}]")]
    SchemaMismatch { expected: String, found: String },

    #[error("another write batch is already open for this index")]
    WriterBusy,

    #[error("commit failed, committed state unchanged: {0}")]
    CommitFailed(#[source] std::io::Error),

    #[error("query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    #[error("index storage corrupted: {0}")]
    IndexCorrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type alias for tagdex operations
pub type Result<T> = std::result::Result<T, TagdexError>;

impl TagdexError {
    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TagdexError::WriterBusy | TagdexError::CommitFailed(_)
        )
    }

    /// Shorthand for a query syntax error
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        TagdexError::QuerySyntax {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TagdexError::syntax(7, "unterminated phrase");
        assert_eq!(
            err.to_string(),
            "query syntax error at position 7: unterminated phrase"
        );
    }

    #[test]
    fn test_retriable_errors() {
        assert!(TagdexError::WriterBusy.is_retriable());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(TagdexError::CommitFailed(io).is_retriable());
        assert!(!TagdexError::IndexCorrupted("bad magic".to_string()).is_retriable());
    }
}
