//! Loads the schema directory into a [`SchemaModel`].
//!
//! The loader owns the current model behind an `RwLock<Arc<_>>`. Readers
//! take a cheap [`snapshot`](SchemaLoader::snapshot); [`reload`](SchemaLoader::reload)
//! parses into a fresh model and swaps it in, so a reader sees the old
//! model or the new one, never a half-built mix.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::DataConfig;
use crate::connector_fs::scan_schema_dir;
use crate::export;
use crate::markdown::{Metadata, MarkdownSchemaParser};
use crate::models::Table;
use crate::schema::SchemaModel;
use crate::traits::SchemaDocumentParser;

/// Per-file failure. Logged and skipped; never aborts a load.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a schema file as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String, DocumentError> {
    std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Outcome of one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_seen: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub tables: usize,
}

pub struct SchemaLoader {
    config: DataConfig,
    parser: Box<dyn SchemaDocumentParser>,
    model: RwLock<Arc<SchemaModel>>,
}

impl SchemaLoader {
    /// Create a loader with the markdown parser and load immediately.
    pub fn new(config: &DataConfig) -> Self {
        Self::with_parser(config, Box::new(MarkdownSchemaParser))
    }

    pub fn with_parser(config: &DataConfig, parser: Box<dyn SchemaDocumentParser>) -> Self {
        let loader = Self {
            config: config.clone(),
            parser,
            model: RwLock::new(Arc::new(SchemaModel::default())),
        };
        loader.reload();
        loader
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Re-read every schema file and replace the model.
    ///
    /// A missing directory yields an empty model. Unreadable files are
    /// logged and skipped.
    pub fn reload(&self) -> LoadReport {
        let (model, report) = self.build_model();
        info!(
            tables = report.tables,
            files = report.files_loaded,
            failed = report.files_failed,
            "Loaded {} tables",
            report.tables
        );
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(model);
        report
    }

    fn build_model(&self) -> (SchemaModel, LoadReport) {
        let mut model = SchemaModel::default();
        let mut report = LoadReport::default();

        if !self.config.schema_path.exists() {
            warn!(
                path = %self.config.schema_path.display(),
                "Schema path does not exist"
            );
            return (model, report);
        }

        let files = match scan_schema_dir(&self.config) {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Failed to scan schema directory");
                return (model, report);
            }
        };

        for path in files {
            report.files_seen += 1;
            let content = match read_document(&path) {
                Ok(content) => content,
                Err(e) => {
                    error!(error = %e, "Error loading schema file");
                    report.files_failed += 1;
                    continue;
                }
            };

            let parsed = self.parser.parse(&content);
            debug!(
                file = %path.display(),
                tables = parsed.tables.len(),
                "Parsed schema file"
            );
            if let Some(front_matter) = parsed.front_matter {
                model.merge_metadata(front_matter);
            }
            for table in parsed.tables {
                model.insert_table(table);
            }
            report.files_loaded += 1;
        }

        report.tables = model.len();
        (model, report)
    }

    /// The current model. Unaffected by later reloads.
    pub fn snapshot(&self) -> Arc<SchemaModel> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_table(&self, name: &str) -> Option<Table> {
        self.snapshot().get_table(name).cloned()
    }

    /// All tables in name order.
    pub fn get_all_tables(&self) -> Vec<Table> {
        self.snapshot().tables.values().cloned().collect()
    }

    /// Lower-cased table names.
    pub fn get_table_names(&self) -> Vec<String> {
        self.snapshot().table_names()
    }

    pub fn metadata(&self) -> Metadata {
        self.snapshot().metadata.clone()
    }

    pub fn get_schema_summary(&self) -> String {
        self.snapshot().summary()
    }

    pub fn get_context_for_llm(&self) -> String {
        self.snapshot().context_for_llm()
    }

    /// JSON export; also written to `output` when given.
    pub fn export_schema_json(&self, output: Option<&Path>) -> Result<String> {
        export::export_schema_json(&self.snapshot(), output)
    }

    pub fn validate_query_tables(&self, query: &str) -> (bool, String) {
        self.snapshot().validate_query_tables(query)
    }
}
