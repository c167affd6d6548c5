//! # DB Schema Chat
//!
//! The schema and safety core of a chat-with-your-database assistant.
//!
//! Database schemas are documented as markdown files. This crate extracts
//! tables, columns, keys and relationships from them, renders the schema as
//! text for a language model, indexes the documents for retrieval, and
//! gates every model-generated SQL statement through a read-only validator
//! before it can reach a database.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ schema_docs/   │──▶│  markdown    │──▶│ SchemaLoader │──▶ summary / context / JSON
//! │ *.md           │   │  parser      │   │ (Arc swap)   │
//! └────────────────┘   └──────────────┘   └──────┬───────┘
//!         │                                       │
//!         ▼                                       ▼
//! ┌────────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ documents +    │──▶│ KeywordIndex │──▶│ ToolRegistry │◀── agent
//! │ chunk          │   │ (Retriever)  │   │ rag_search   │
//! └────────────────┘   └──────────────┘   │ schema_info  │
//!                                         │ sql_query ───┼──▶ sql_guard
//!                                         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dbchat schema summary
//! dbchat sql check "SELECT * FROM users"
//! dbchat sql prepare "select * from orders -- latest"
//! dbchat search "customer email"
//! dbchat tools call schema_info --param table=orders
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`models`] | Column, table, relationship and chunk types |
//! | [`markdown`] | Markdown schema parser |
//! | [`connector_fs`] | Schema directory scan |
//! | [`schema`] | Schema model, rendering and table-reference checks |
//! | [`loader`] | Loading and reloading the schema model |
//! | [`export`] | JSON export |
//! | [`sql_guard`] | Read-only SQL validation and sanitization |
//! | [`documents`] | Retrieval documents built from schema files |
//! | [`chunk`] | Paragraph chunking |
//! | [`search`] | Keyword retrieval |
//! | [`traits`] | Parser, retriever and tool seams |
//! | [`tools`] | Built-in agent tools |

pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod documents;
pub mod export;
pub mod loader;
pub mod logging;
pub mod markdown;
pub mod models;
pub mod schema;
pub mod search;
pub mod sql_guard;
pub mod tools;
pub mod traits;
