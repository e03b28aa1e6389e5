use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored record in the tag database
///
/// `path` is the primary key: re-adding a document with the same path
/// replaces the previously committed record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Absolute or base-relative file path, unique per index
    pub path: String,
    /// All extracted tag values joined into one text blob
    pub tags: String,
    /// When this document was (re)indexed
    pub last_updated: DateTime<Utc>,
}

impl Document {
    pub fn new(
        path: impl Into<String>,
        tags: impl Into<String>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            tags: tags.into(),
            last_updated,
        }
    }

    /// Text content of a named field, for tokenization
    ///
    /// The date field has no tokenizable text.
    pub fn field_text(&self, field: &str) -> Option<&str> {
        match field {
            "path" => Some(&self.path),
            "tags" => Some(&self.tags),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_text() {
        let doc = Document::new("/music/a.mp3", "pink floyd", Utc::now());
        assert_eq!(doc.field_text("path"), Some("/music/a.mp3"));
        assert_eq!(doc.field_text("tags"), Some("pink floyd"));
        assert_eq!(doc.field_text("last_updated"), None);
    }
}
