//! Schema and field type system
//!
//! The schema is an explicit value handed to `Index::open_or_create`, never
//! process-global state. Opening an existing index validates the stored
//! schema against the expected one and fails with `SchemaMismatch` when they
//! disagree.

use serde::{Deserialize, Serialize};

/// Kind of an indexed field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Unique identifier. Acts as the primary key and is also tokenized
    /// so its words are searchable.
    Id,
    /// Full-text field, tokenized with positions.
    Text,
    /// Timestamp field, stored and range-queryable, not tokenized.
    Date,
}

/// A single field definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Fixed record shape for an index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The tag database schema: path identifier, tags text, update timestamp
    pub fn tag_schema() -> Self {
        Self::new(vec![
            FieldSpec::new("path", FieldKind::Id),
            FieldSpec::new("tags", FieldKind::Text),
            FieldSpec::new("last_updated", FieldKind::Date),
        ])
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Fields whose text is tokenized into the inverted index
    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Id | FieldKind::Text))
    }

    /// Default fields an unscoped query atom is searched against
    pub fn default_search_fields(&self) -> Vec<String> {
        self.indexed_fields().map(|f| f.name.clone()).collect()
    }

    /// Compact descriptor used in `SchemaMismatch` messages
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}:{:?}", f.name, f.kind).to_lowercase())
            .collect::<Vec<_>>()
            .join(",")
    }
}
