//! The in-memory schema model and its text renderings.
//!
//! Tables are keyed by lower-cased name, so lookups are case-insensitive
//! and a later declaration of the same table replaces the earlier one.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::markdown::Metadata;
use crate::models::{Relationship, Table};

/// Every loaded table plus merged front-matter metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaModel {
    pub metadata: Metadata,
    pub tables: BTreeMap<String, Table>,
}

fn table_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+(\w+)").expect("valid table reference regex")
    })
}

impl SchemaModel {
    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(table.name.to_lowercase(), table);
    }

    /// Merge front matter; later keys overwrite earlier ones.
    pub fn merge_metadata(&mut self, metadata: Metadata) {
        self.metadata.extend(metadata);
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Relationships in other tables that point at `name`.
    pub fn references_to(&self, name: &str) -> Vec<(&Table, &Relationship)> {
        self.tables
            .values()
            .flat_map(|t| t.relationships.iter().map(move |r| (t, r)))
            .filter(|(_, r)| r.references_table.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Check that every table named after FROM/JOIN/INTO/UPDATE is loaded.
    ///
    /// Purely lexical: aliases, subqueries, schema-qualified and quoted
    /// names are not understood. Returns `(true, "")` or
    /// `(false, "Unknown tables: a, b")`.
    pub fn validate_query_tables(&self, query: &str) -> (bool, String) {
        let mut unknown: Vec<&str> = Vec::new();
        for caps in table_reference_re().captures_iter(query) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if self.contains_table(name) {
                continue;
            }
            if !unknown.iter().any(|u| u.eq_ignore_ascii_case(name)) {
                unknown.push(name);
            }
        }

        if unknown.is_empty() {
            (true, String::new())
        } else {
            (false, format!("Unknown tables: {}", unknown.join(", ")))
        }
    }

    /// Fixed-format human summary: table count, column counts, key names.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("Database Schema Summary\n");
        out.push_str(&"=".repeat(50));
        out.push('\n');
        out.push_str(&format!("Total tables: {}\n", self.tables.len()));
        out.push('\n');

        for table in self.tables.values() {
            out.push_str(&format!("Table: {}\n", table.name));
            if !table.description.is_empty() {
                out.push_str(&format!("  Description: {}\n", table.description));
            }
            out.push_str(&format!("  Columns: {}\n", table.columns.len()));

            let pks = table.primary_keys();
            if !pks.is_empty() {
                out.push_str(&format!("  Primary Keys: {}\n", pks.join(", ")));
            }
            let fks = table.foreign_keys();
            if !fks.is_empty() {
                out.push_str(&format!("  Foreign Keys: {}\n", fks.join(", ")));
            }
            out.push('\n');
        }
        out
    }

    /// Every table rendered for inclusion in a language-model prompt.
    pub fn context_for_llm(&self) -> String {
        let mut out = String::from("Available Database Schema:\n\n");
        for table in self.tables.values() {
            out.push_str(&render_table(table));
            out.push('\n');
        }
        out
    }
}

/// One table with annotated columns and relationship lines.
pub fn render_table(table: &Table) -> String {
    let mut out = String::new();
    out.push_str(&format!("Table: {}\n", table.name));
    if !table.description.is_empty() {
        out.push_str(&format!("Description: {}\n", table.description));
    }

    out.push_str("Columns:\n");
    for col in &table.columns {
        out.push_str(&format!("  - {} ({})", col.name, col.data_type));
        if col.is_primary_key {
            out.push_str(" [PK]");
        }
        if col.is_foreign_key {
            out.push_str(" [FK]");
        }
        if !col.nullable {
            out.push_str(" NOT NULL");
        }
        if !col.description.is_empty() {
            out.push_str(&format!(" - {}", col.description));
        }
        out.push('\n');
    }

    if !table.relationships.is_empty() {
        out.push_str("Relationships:\n");
        for rel in &table.relationships {
            out.push_str(&format!(
                "  - {} -> {}.{}\n",
                rel.column, rel.references_table, rel.references_column
            ));
        }
    }
    out
}
