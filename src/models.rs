//! Core data models for the schema extracted from markdown documentation.
//!
//! These types are produced by the [`markdown`](crate::markdown) parser and
//! read by everything downstream: rendering, JSON export, tool responses.

use serde::Serialize;

/// One field of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    /// Free-text type, with any `NOT NULL` marker already removed.
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub description: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            description: String::new(),
        }
    }
}

/// A foreign-key edge declared with an `FK: col -> table.col` line.
///
/// Directional only; reverse lookups scan all tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

/// One schema entity. Always has at least one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub name: String,
    pub description: String,
    pub columns: Vec<Column>,
    pub relationships: Vec<Relationship>,
}

impl Table {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn foreign_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_foreign_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A retrieval slice of a [`SchemaDocument`](crate::documents::SchemaDocument).
///
/// `chunk_index` is contiguous from 0 within a document; `hash` is the
/// SHA-256 of `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub hash: String,
}
