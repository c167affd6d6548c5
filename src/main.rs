//! # DB Schema Chat CLI (`dbchat`)
//!
//! Inspect markdown-documented schemas and check SQL against the
//! read-only policy.
//!
//! ## Usage
//!
//! ```bash
//! dbchat --config ./config/dbchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dbchat schema summary` | Table count, columns and keys per table |
//! | `dbchat schema context` | Schema text for a language-model prompt |
//! | `dbchat schema tables` | Loaded table names |
//! | `dbchat schema show <table>` | One table in detail |
//! | `dbchat schema export` | Schema as JSON |
//! | `dbchat sql check "<query>"` | Safety verdict; non-zero exit when rejected |
//! | `dbchat sql sanitize "<query>"` | Strip comments, collapse whitespace |
//! | `dbchat sql prepare "<query>"` | Full `sql_query` pipeline |
//! | `dbchat sql tables "<query>"` | Check referenced tables exist |
//! | `dbchat documents` | Retrieval documents |
//! | `dbchat search "<query>"` | Keyword search over documents |
//! | `dbchat tools list` | Built-in agent tools |
//! | `dbchat tools call <name>` | Call a tool with `--param key=value` |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use db_schema_chat::config::{self, Config};
use db_schema_chat::documents::build_documents;
use db_schema_chat::loader::SchemaLoader;
use db_schema_chat::logging;
use db_schema_chat::markdown::MarkdownSchemaParser;
use db_schema_chat::schema::render_table;
use db_schema_chat::search::KeywordIndex;
use db_schema_chat::sql_guard::{sanitize_query, SqlValidator};
use db_schema_chat::tools::{prepare_query, ToolResponse};
use db_schema_chat::traits::{Retriever, ToolContext, ToolRegistry};

/// DB Schema Chat CLI: schema extraction and SQL safety checks.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "dbchat",
    about = "Schema extraction and read-only SQL validation for database chat assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dbchat.toml")]
    config: PathBuf,

    /// Override `data.schema_path` from the config file.
    #[arg(long, global = true)]
    schema_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the loaded schema.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Validate and normalize SQL.
    Sql {
        #[command(subcommand)]
        action: SqlAction,
    },
    /// List retrieval documents built from the schema files.
    Documents,
    /// Keyword search over schema documents.
    Search {
        query: String,
        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Discover and call agent tools.
    Tools {
        #[command(subcommand)]
        action: ToolAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    Summary,
    Context,
    Tables,
    /// Show one table (case-insensitive).
    Show { table: String },
    /// Print the schema as JSON, or write it to `--output`.
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SqlAction {
    /// Exit non-zero when the query is rejected.
    Check { query: String },
    Sanitize { query: String },
    /// Validate, check tables, sanitize and apply the row limit.
    Prepare { query: String },
    /// Check that every referenced table is loaded.
    Tables { query: String },
}

#[derive(Subcommand)]
enum ToolAction {
    List,
    Call {
        name: String,
        /// Tool parameters as `key=value`. Values that parse as JSON are
        /// passed as JSON, anything else as a string.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))
}

fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };
    if let Some(path) = &cli.schema_path {
        cfg.data.schema_path = path.clone();
    }
    Ok(cfg)
}

fn tool_context(cfg: Config) -> Result<ToolContext> {
    let loader = Arc::new(SchemaLoader::new(&cfg.data));
    let docs = build_documents(&cfg.data, &MarkdownSchemaParser)?;
    let retriever: Arc<dyn Retriever> = Arc::new(KeywordIndex::build(&docs, cfg.chunking.max_tokens));
    Ok(ToolContext::new(Arc::new(cfg), loader, retriever))
}

fn params_object(params: Vec<(String, String)>) -> Value {
    let map: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| {
            let value = serde_json::from_str(&v).unwrap_or(Value::String(v));
            (k, value)
        })
        .collect();
    Value::Object(map)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli)?;
    logging::init(&cfg.logging)?;
    if !cli.config.exists() {
        debug!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Schema { action } => {
            let loader = SchemaLoader::new(&cfg.data);
            match action {
                SchemaAction::Summary => print!("{}", loader.get_schema_summary()),
                SchemaAction::Context => print!("{}", loader.get_context_for_llm()),
                SchemaAction::Tables => {
                    for name in loader.get_table_names() {
                        println!("{}", name);
                    }
                }
                SchemaAction::Show { table } => match loader.get_table(&table) {
                    Some(t) => print!("{}", render_table(&t)),
                    None => bail!("Table not found: {}", table),
                },
                SchemaAction::Export { output } => {
                    let json = loader.export_schema_json(output.as_deref())?;
                    if output.is_none() {
                        println!("{}", json);
                    }
                }
            }
        }
        Commands::Sql { action } => match action {
            SqlAction::Check { query } => {
                let verdict = SqlValidator::from_config(&cfg.sql).is_safe_query(&query);
                if !verdict.is_safe {
                    bail!("Query rejected: {}", verdict.reason);
                }
                println!("{}", verdict.reason);
            }
            SqlAction::Sanitize { query } => println!("{}", sanitize_query(&query)),
            SqlAction::Prepare { query } => {
                let ctx = tool_context(cfg)?;
                match prepare_query(&ctx, &query) {
                    ToolResponse::Failure { error } => bail!(error),
                    resp => println!("{}", resp.render()),
                }
            }
            SqlAction::Tables { query } => {
                let loader = SchemaLoader::new(&cfg.data);
                if loader.get_table_names().is_empty() {
                    warn!("No tables loaded; every reference will be unknown");
                }
                let (ok, reason) = loader.validate_query_tables(&query);
                if !ok {
                    bail!(reason);
                }
                println!("All referenced tables exist");
            }
        },
        Commands::Documents => {
            let docs = build_documents(&cfg.data, &MarkdownSchemaParser)?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!(
                    "{}  title={}  tables=[{}]",
                    doc.id,
                    doc.title.as_deref().unwrap_or("-"),
                    doc.tables.join(", ")
                );
            }
        }
        Commands::Search { query, top_k } => {
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            if top_k == 0 {
                bail!("--top-k must be >= 1");
            }
            let docs = build_documents(&cfg.data, &MarkdownSchemaParser)?;
            let index = KeywordIndex::build(&docs, cfg.chunking.max_tokens);
            let hits = index.search(&query, top_k)?;
            println!("{}", ToolResponse::Sources { hits }.render());
        }
        Commands::Tools { action } => {
            let registry = ToolRegistry::with_builtins();
            match action {
                ToolAction::List => {
                    for tool in registry.tools() {
                        println!("{}  {}", tool.name(), tool.description());
                    }
                }
                ToolAction::Call { name, params } => {
                    let ctx = tool_context(cfg)?;
                    match registry.call(&name, &params_object(params), &ctx) {
                        ToolResponse::Failure { error } => bail!(error),
                        resp => println!("{}", resp.render()),
                    }
                }
            }
        }
    }

    Ok(())
}
