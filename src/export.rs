//! JSON export of the schema model.
//!
//! Output is an object with `metadata` and `tables`, the latter keyed by
//! lower-cased table name. Pretty-printed for diffing.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::schema::SchemaModel;

/// Serialize `model`, writing to `output` when given. Returns the JSON.
pub fn export_schema_json(model: &SchemaModel, output: Option<&Path>) -> Result<String> {
    let json = serde_json::to_string_pretty(model)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write schema export: {}", path.display()))?;
        info!(
            tables = model.len(),
            path = %path.display(),
            "Schema exported"
        );
    }

    Ok(json)
}
