//! Retrieval documents built from schema files.
//!
//! Each schema file becomes one [`SchemaDocument`] whose `text` restates
//! the extracted tables in a fixed layout and then appends the raw file,
//! so both structured and free-form wording are searchable:
//!
//! ```text
//! # Shop schema
//!
//! Database: shop
//!
//! ## Table: orders
//! Description: Customer orders.
//!
//! Columns:
//! - id (INT): Order id
//!
//!
//! --- Original Content ---
//! <file contents>
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::DataConfig;
use crate::connector_fs::scan_schema_dir;
use crate::loader::read_document;
use crate::markdown::{Metadata, ParsedDocument};
use crate::traits::SchemaDocumentParser;

/// Separator between the structured rendering and the raw file.
pub const ORIGINAL_CONTENT_MARKER: &str = "--- Original Content ---";

#[derive(Debug, Clone, Serialize)]
pub struct SchemaDocument {
    /// Path relative to the schema directory.
    pub id: String,
    pub file_name: String,
    pub path: PathBuf,
    pub title: Option<String>,
    pub database: Option<String>,
    pub tables: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Metadata,
    pub text: String,
}

/// Build one document per readable schema file, in path order.
///
/// A missing directory yields no documents; unreadable files are skipped.
pub fn build_documents(
    config: &DataConfig,
    parser: &dyn SchemaDocumentParser,
) -> Result<Vec<SchemaDocument>> {
    if !config.schema_path.exists() {
        warn!(
            path = %config.schema_path.display(),
            "Schema path does not exist"
        );
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for path in scan_schema_dir(config)? {
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(e) => {
                error!(error = %e, "Failed to build schema document");
                continue;
            }
        };
        let parsed = parser.parse(&content);
        let doc = to_document(&config.schema_path, &path, &content, parsed);
        info!(
            file = %doc.file_name,
            tables = doc.tables.len(),
            "Parsed schema document"
        );
        documents.push(doc);
    }

    info!(count = documents.len(), "Total documents parsed");
    Ok(documents)
}

fn to_document(root: &Path, path: &Path, content: &str, parsed: ParsedDocument) -> SchemaDocument {
    let id = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let updated_at = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();

    let text = render_document_text(&parsed, content);
    SchemaDocument {
        id,
        file_name,
        path: path.to_path_buf(),
        title: parsed.title,
        database: parsed.database,
        tables: parsed.tables.iter().map(|t| t.name.clone()).collect(),
        updated_at,
        metadata: parsed.front_matter.unwrap_or_default(),
        text,
    }
}

/// Structured rendering of a parsed file followed by the raw content.
pub fn render_document_text(parsed: &ParsedDocument, raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(title) = &parsed.title {
        lines.push(format!("# {}", title));
        lines.push(String::new());
    }
    if let Some(database) = &parsed.database {
        lines.push(format!("Database: {}", database));
        lines.push(String::new());
    }

    for table in &parsed.tables {
        lines.push(format!("## Table: {}", table.name));
        if !table.description.is_empty() {
            lines.push(format!("Description: {}", table.description));
        }
        lines.push("\nColumns:".to_string());
        for col in &table.columns {
            let mut line = format!("- {} ({})", col.name, col.data_type);
            if !col.description.is_empty() {
                line.push_str(": ");
                line.push_str(&col.description);
            }
            lines.push(line);
        }
        lines.push(String::new());
    }

    lines.push(format!("\n{}", ORIGINAL_CONTENT_MARKER));
    lines.push(raw.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{parse_markdown, MarkdownSchemaParser};
    use std::fs;

    const SHOP: &str = "# Shop schema\n\nDatabase: shop\n\n## Table: orders\nCustomer orders.\n\n| Column | Type | Description |\n|---|---|---|\n| id | INT | Order id |\n";

    #[test]
    fn test_render_layout() {
        let text = render_document_text(&parse_markdown(SHOP), SHOP);
        let expected_head = "# Shop schema\n\nDatabase: shop\n\n## Table: orders\nDescription: Customer orders.\n\nColumns:\n- id (INT): Order id\n\n\n--- Original Content ---\n";
        assert!(text.starts_with(expected_head), "got:\n{}", text);
        assert!(text.ends_with(SHOP));
    }

    #[test]
    fn test_render_without_tables() {
        let text = render_document_text(&ParsedDocument::default(), "plain");
        assert_eq!(text, "\n--- Original Content ---\nplain");
    }

    #[test]
    fn test_build_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shop.md"), SHOP).unwrap();
        fs::write(dir.path().join("empty.md"), "nothing").unwrap();

        let docs = build_documents(&DataConfig::for_dir(dir.path()), &MarkdownSchemaParser).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "empty.md");
        assert!(docs[0].tables.is_empty());
        assert_eq!(docs[1].file_name, "shop.md");
        assert_eq!(docs[1].title.as_deref(), Some("Shop schema"));
        assert_eq!(docs[1].database.as_deref(), Some("shop"));
        assert_eq!(docs[1].tables, vec!["orders"]);
    }

    #[test]
    fn test_missing_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = DataConfig::for_dir(dir.path().join("absent"));
        assert!(build_documents(&config, &MarkdownSchemaParser).unwrap().is_empty());
    }
}
