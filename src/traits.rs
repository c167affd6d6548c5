//! Extension seams: document parsing, retrieval, and agent tools.
//!
//! ```text
//! ┌───────────────────────┐     ┌──────────────┐
//! │ SchemaDocumentParser  │────▶│ SchemaLoader │──┐
//! │ (markdown, ...)       │     └──────────────┘  │
//! └───────────────────────┘                       ▼
//! ┌───────────────────────┐               ┌──────────────┐
//! │ Retriever             │──────────────▶│ ToolContext  │──▶ ToolRegistry
//! │ (keyword, vector, ...)│               └──────────────┘    rag_search
//! └───────────────────────┘                       ▲           schema_info
//!                               SqlValidator ─────┘           sql_query
//! ```
//!
//! The language model runtime sits outside this crate. It sees the schema
//! only as rendered text and calls tools through [`ToolRegistry`].

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::loader::SchemaLoader;
use crate::markdown::ParsedDocument;
use crate::search::SearchHit;
use crate::sql_guard::SqlValidator;
use crate::tools::{RagSearchTool, SchemaInfoTool, SqlQueryTool, ToolResponse};

// ═══════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════

/// Turns the text of one schema document into tables and metadata.
///
/// Implementations must not fail: unparsable fragments are skipped. The
/// loader only depends on this trait, so a structural markdown parser can
/// replace [`MarkdownSchemaParser`](crate::markdown::MarkdownSchemaParser)
/// without touching callers.
pub trait SchemaDocumentParser: Send + Sync {
    fn parse(&self, content: &str) -> ParsedDocument;
}

// ═══════════════════════════════════════════════════════════════════════
// Retrieval
// ═══════════════════════════════════════════════════════════════════════

/// Similarity search over schema documents.
///
/// This is the boundary to a vector index. The built-in
/// [`KeywordIndex`](crate::search::KeywordIndex) scores by term overlap.
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` hits, best first. Empty queries are an error.
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Tools
// ═══════════════════════════════════════════════════════════════════════

/// A tool an agent can discover and call.
///
/// `execute` never returns an error: invalid parameters and policy
/// rejections come back as [`ToolResponse::Failure`] so the agent can branch
/// on the outcome.
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"sql_query"`.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema of the parameters object.
    fn parameters_schema(&self) -> Value;

    fn execute(&self, params: &Value, ctx: &ToolContext) -> ToolResponse;
}

/// Everything a tool may read while executing.
///
/// Built once by the caller and shared; tools never mutate the schema.
pub struct ToolContext {
    pub config: Arc<Config>,
    pub loader: Arc<SchemaLoader>,
    pub validator: SqlValidator,
    pub retriever: Arc<dyn Retriever>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, loader: Arc<SchemaLoader>, retriever: Arc<dyn Retriever>) -> Self {
        let validator = SqlValidator::from_config(&config.sql);
        Self {
            config,
            loader,
            validator,
            retriever,
        }
    }
}

/// Name-indexed collection of tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `rag_search`, `schema_info`, and `sql_query`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RagSearchTool));
        registry.register(Box::new(SchemaInfoTool));
        registry.register(Box::new(SqlQueryTool));
        registry
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn tools(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Call a tool by name; unknown names yield a failure response.
    pub fn call(&self, name: &str, params: &Value, ctx: &ToolContext) -> ToolResponse {
        match self.get(name) {
            Some(tool) => tool.execute(params, ctx),
            None => ToolResponse::failure(format!("Unknown tool: {}", name)),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
