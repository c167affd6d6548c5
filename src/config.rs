//! TOML configuration parsing.
//!
//! Every section is optional; missing fields fall back to the defaults below.
//! A [`Config`] is an ordinary value handed to whichever component needs it,
//! so tests can build independent instances with [`Config::default`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            file_extensions: default_file_extensions(),
        }
    }
}

impl DataConfig {
    /// Config for a schema directory with the default `.md` filter.
    pub fn for_dir(schema_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: schema_path.into(),
            file_extensions: default_file_extensions(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("./data/schema_docs")
}
fn default_file_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlConfig {
    #[serde(default)]
    pub allow_write: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub connection_string: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            allow_write: false,
            max_results: default_max_results(),
            connection_string: String::new(),
        }
    }
}

fn default_max_results() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.sql.max_results < 1 {
        anyhow::bail!("sql.max_results must be >= 1");
    }

    if config.sql.allow_write {
        anyhow::bail!("SQL write operations are not allowed (sql.allow_write must be false)");
    }

    if config.data.file_extensions.is_empty() {
        anyhow::bail!("data.file_extensions must list at least one extension");
    }
    config.data.file_extensions = config
        .data
        .file_extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect();

    Ok(config)
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}
