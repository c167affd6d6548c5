//! Built-in agent tools.
//!
//! | Tool          | Parameters          | Success                   |
//! |---------------|---------------------|---------------------------|
//! | `rag_search`  | `query`, `top_k?`   | [`ToolResponse::Sources`] |
//! | `schema_info` | `table`             | [`ToolResponse::Text`]    |
//! | `sql_query`   | `query`             | [`ToolResponse::Text`]    |
//!
//! `sql_query` stops at a prepared, row-limited statement. Running it
//! against a database belongs to the caller.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::schema::render_table;
use crate::search::SearchHit;
use crate::sql_guard::{apply_row_limit, sanitize_query};
use crate::traits::{Tool, ToolContext};

/// Result of a tool call. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResponse {
    Text { text: String },
    Sources { hits: Vec<SearchHit> },
    Failure { error: String },
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    /// Plain-text form handed to a language model.
    pub fn render(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Sources { hits } if hits.is_empty() => "No relevant documents found.".to_string(),
            Self::Sources { hits } => {
                let mut out = String::new();
                for (i, hit) in hits.iter().enumerate() {
                    if i > 0 {
                        out.push_str("\n\n");
                    }
                    out.push_str(&format!(
                        "Result {} (Score: {:.3}):\nSource: {}\nContent: {}",
                        i + 1,
                        hit.score,
                        hit.source,
                        hit.snippet
                    ));
                }
                out
            }
            Self::Failure { error } => error.clone(),
        }
    }
}

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolResponse> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolResponse::failure(format!("Missing required parameter: {}", key)))
}

/// Search schema documentation.
pub struct RagSearchTool;

impl Tool for RagSearchTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Search through database schema documentation"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "top_k": { "type": "integer", "minimum": 1, "description": "Number of results" }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, params: &Value, ctx: &ToolContext) -> ToolResponse {
        let query = match required_str(params, "query") {
            Ok(q) => q,
            Err(failure) => return failure,
        };
        let top_k = match params.get("top_k") {
            None | Some(Value::Null) => ctx.config.retrieval.top_k,
            Some(v) => match v.as_u64().filter(|&k| k >= 1) {
                Some(k) => k as usize,
                None => return ToolResponse::failure("top_k must be a positive integer"),
            },
        };

        match ctx.retriever.search(query, top_k) {
            Ok(hits) => ToolResponse::Sources { hits },
            Err(e) => {
                warn!(target: "query_log", error = %e, "RAG search failed");
                ToolResponse::failure(format!("Search failed: {}", e))
            }
        }
    }
}

/// Describe one table, including tables that reference it.
pub struct SchemaInfoTool;

impl Tool for SchemaInfoTool {
    fn name(&self) -> &str {
        "schema_info"
    }

    fn description(&self) -> &str {
        "Get columns, keys and relationships of a table"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table": { "type": "string", "description": "Table name (case-insensitive)" }
            },
            "required": ["table"]
        })
    }

    fn execute(&self, params: &Value, ctx: &ToolContext) -> ToolResponse {
        let name = match required_str(params, "table") {
            Ok(n) => n,
            Err(failure) => return failure,
        };

        let model = ctx.loader.snapshot();
        let Some(table) = model.get_table(name) else {
            return ToolResponse::failure(format!("Table not found: {}", name));
        };

        let mut text = render_table(table);
        let referenced_by = model.references_to(&table.name);
        if !referenced_by.is_empty() {
            text.push_str("Referenced by:\n");
            for (other, rel) in referenced_by {
                text.push_str(&format!(
                    "  - {}.{} -> {}\n",
                    other.name, rel.column, rel.references_column
                ));
            }
        }
        ToolResponse::text(text)
    }
}

/// Validate and prepare a read-only SQL statement.
pub struct SqlQueryTool;

impl Tool for SqlQueryTool {
    fn name(&self) -> &str {
        "sql_query"
    }

    fn description(&self) -> &str {
        "Validate a read-only SQL query and return it row-limited"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "A SELECT, WITH, SHOW, DESCRIBE or EXPLAIN statement" }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, params: &Value, ctx: &ToolContext) -> ToolResponse {
        match required_str(params, "query") {
            Ok(query) => prepare_query(ctx, query),
            Err(failure) => failure,
        }
    }
}

/// Run the safety checks on `query` and return the statement to execute.
///
/// Order: safety verdict, comment stripping, table references (skipped
/// while no schema is loaded), row limit.
pub fn prepare_query(ctx: &ToolContext, query: &str) -> ToolResponse {
    let verdict = ctx.validator.is_safe_query(query);
    if !verdict.is_safe {
        return reject(query, &verdict.reason);
    }

    let sanitized = sanitize_query(query);
    let model = ctx.loader.snapshot();
    if !model.is_empty() {
        let (known, reason) = model.validate_query_tables(&sanitized);
        if !known {
            return reject(query, &reason);
        }
    }

    let prepared = apply_row_limit(&sanitized, ctx.config.sql.max_results);
    info!(target: "query_log", query = %prepared, "SQL query approved");
    ToolResponse::text(prepared)
}

fn reject(query: &str, reason: &str) -> ToolResponse {
    let message = format!("Query rejected: {}", reason);
    warn!(target: "query_log", query = %query, "{}", message);
    ToolResponse::failure(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DataConfig};
    use crate::loader::SchemaLoader;
    use crate::search::KeywordIndex;
    use crate::traits::{Retriever, ToolRegistry};
    use std::fs;
    use std::sync::Arc;

    const SCHEMA: &str = "## Table: customers\n| Column | Type | Key |\n|---|---|---|\n| customer_id | INT | PK |\n\n## Table: orders\n| Column | Type | Key |\n|---|---|---|\n| order_id | INT | PK |\n| customer_id | INT | FK |\n\nFK: customer_id -> customers.customer_id\n";

    fn context(dir: &std::path::Path) -> ToolContext {
        fs::write(dir.join("shop.md"), SCHEMA).unwrap();
        let mut config = Config::default();
        config.data = DataConfig::for_dir(dir);
        config.sql.max_results = 25;
        let loader = Arc::new(SchemaLoader::new(&config.data));
        let retriever: Arc<dyn Retriever> = Arc::new(KeywordIndex::build(&[], 700));
        ToolContext::new(Arc::new(config), loader, retriever)
    }

    #[test]
    fn test_prepare_applies_limit() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = prepare_query(&ctx, "SELECT *  FROM orders -- all\n;");
        assert_eq!(resp, ToolResponse::text("SELECT * FROM orders LIMIT 25"));
    }

    #[test]
    fn test_prepare_ignores_tables_named_in_comments() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = prepare_query(&ctx, "SELECT * FROM orders -- copied from archive");
        assert_eq!(resp, ToolResponse::text("SELECT * FROM orders LIMIT 25"));

        let resp = prepare_query(&ctx, "SELECT * FROM orders /* join payments */");
        assert_eq!(resp, ToolResponse::text("SELECT * FROM orders LIMIT 25"));
    }

    #[test]
    fn test_prepare_keeps_existing_limit() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = prepare_query(&ctx, "select * from customers limit 3");
        assert_eq!(resp, ToolResponse::text("select * from customers limit 3"));
    }

    #[test]
    fn test_prepare_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = prepare_query(&ctx, "DELETE FROM orders");
        assert_eq!(
            resp,
            ToolResponse::failure("Query rejected: Query contains forbidden operation: DELETE")
        );
    }

    #[test]
    fn test_prepare_rejects_unknown_tables() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = prepare_query(&ctx, "SELECT * FROM invoices");
        assert_eq!(resp, ToolResponse::failure("Query rejected: Unknown tables: invoices"));
    }

    #[test]
    fn test_schema_info_lists_references() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = SchemaInfoTool.execute(&json!({"table": "CUSTOMERS"}), &ctx);
        let text = resp.render();
        assert!(text.starts_with("Table: customers\n"));
        assert!(text.contains("  - customer_id (INT) [PK]\n"));
        assert!(text.contains("Referenced by:\n  - orders.customer_id -> customer_id\n"));

        let missing = SchemaInfoTool.execute(&json!({"table": "nope"}), &ctx);
        assert_eq!(missing, ToolResponse::failure("Table not found: nope"));
    }

    #[test]
    fn test_missing_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = ToolRegistry::with_builtins().call("sql_query", &json!({}), &ctx);
        assert_eq!(resp, ToolResponse::failure("Missing required parameter: query"));
    }

    #[test]
    fn test_rag_search_validates_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let resp = RagSearchTool.execute(&json!({"query": "orders", "top_k": 0}), &ctx);
        assert!(!resp.is_success());
        let empty = RagSearchTool.execute(&json!({"query": "orders"}), &ctx);
        assert_eq!(empty, ToolResponse::Sources { hits: vec![] });
        assert_eq!(empty.render(), "No relevant documents found.");
    }

    #[test]
    fn test_render_numbers_sources() {
        let hit = |source: &str, score: f64| SearchHit {
            document_id: source.to_string(),
            title: None,
            source: source.to_string(),
            score,
            snippet: format!("about {}", source),
            tables: vec![],
        };
        let resp = ToolResponse::Sources {
            hits: vec![hit("a.md", 1.0), hit("b.md", 0.25)],
        };
        assert_eq!(
            resp.render(),
            "Result 1 (Score: 1.000):\nSource: a.md\nContent: about a.md\n\n\
             Result 2 (Score: 0.250):\nSource: b.md\nContent: about b.md"
        );
    }

    #[test]
    fn test_serialized_tag() {
        let value = serde_json::to_value(ToolResponse::failure("x")).unwrap();
        assert_eq!(value, json!({"type": "failure", "error": "x"}));
    }
}
