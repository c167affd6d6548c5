//! Markdown schema parser.
//!
//! Turns loosely formatted schema documentation into [`Table`]s. Parsing is
//! two-phase: the document is first split into sections at level 1–3
//! headings, then each section that names a table is scanned line by line
//! for a pipe table, a prose description, and `FK:` relationship lines.
//!
//! ```text
//! ---
//! database: shop            <- YAML front matter (optional, best-effort)
//! ---
//! ## Table: orders          <- table heading ("orders", "orders table" also work)
//! Customer orders.          <- description
//! | Column | Type     | Key | Description |
//! |--------|----------|-----|-------------|   <- header + separator, skipped
//! | id     | INT NOT NULL | PK | Order id |  <- column rows (outer pipes optional)
//! FK: customer_id -> customers.id           <- relationship
//! ```
//!
//! The parser never fails: anything it cannot interpret is skipped. A
//! section only becomes a table when at least one column row parses.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

use crate::models::{Column, Relationship, Table};
use crate::traits::SchemaDocumentParser;

/// Front-matter key/value pairs.
pub type Metadata = Map<String, Value>;

/// Header restatements rejected as column names.
const HEADER_WORDS: &[&str] = &["column", "name", "field"];

/// Everything extracted from one markdown document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// `None` when the document has no front matter or it did not parse.
    pub front_matter: Option<Metadata>,
    /// Text of the first level-1 heading.
    pub title: Option<String>,
    /// Identifier following a `Database:`, `DB:` or `Schema:` label.
    pub database: Option<String>,
    /// Tables in source order.
    pub tables: Vec<Table>,
}

/// Regex/line-scan implementation of [`SchemaDocumentParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownSchemaParser;

impl SchemaDocumentParser for MarkdownSchemaParser {
    fn parse(&self, content: &str) -> ParsedDocument {
        parse_markdown(content)
    }
}

fn table_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[Tt]able:?\s+)?(\w+)(?:\s+[Tt]able)?$").expect("valid table heading regex")
    })
}

fn relationship_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"FK:\s*(\w+)\s*->\s*(\w+)\.(\w+)").expect("valid relationship regex")
    })
}

fn not_null_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)NOT NULL").expect("valid NOT NULL regex"))
}

fn primary_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:PK|PRIMARY)\b").expect("valid primary key regex"))
}

fn foreign_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:FK|FOREIGN)\b").expect("valid foreign key regex"))
}

fn database_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:Database|DB|Schema):[ \t]*(\w+)").expect("valid database regex")
    })
}

/// Parse one markdown document.
pub fn parse_markdown(content: &str) -> ParsedDocument {
    let (block, body) = split_front_matter(content);
    let front_matter = block.and_then(parse_front_matter);

    let tables = split_sections(body)
        .into_iter()
        .filter_map(|section| section.into_table())
        .collect();

    ParsedDocument {
        front_matter,
        title: extract_title(body),
        database: database_re()
            .captures(content)
            .map(|c| c[1].to_string()),
        tables,
    }
}

// ─── Front matter ───────────────────────────────────────────────────

/// Split a leading `---` block from the rest of the document.
///
/// Returns the block text (without delimiters) and the remaining body.
/// Without a closing delimiter the whole document is body.
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let mut lines = content.split_inclusive('\n');
    let first = match lines.next() {
        Some(line) => line,
        None => return (None, content),
    };
    if first.trim_end() != "---" {
        return (None, content);
    }

    let block_start = first.len();
    let mut offset = block_start;
    for line in lines {
        if line.trim_end() == "---" {
            let block = &content[block_start..offset];
            let rest = &content[offset + line.len()..];
            return (Some(block), rest);
        }
        offset += line.len();
    }
    (None, content)
}

/// Parse the block as YAML. Anything other than a mapping, or YAML that
/// does not load, yields `None`.
fn parse_front_matter(block: &str) -> Option<Metadata> {
    match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "skipping unparsable front matter");
            None
        }
    }
}

// ─── Sections ───────────────────────────────────────────────────────

/// Heading text for a level 1–3 ATX heading, `None` otherwise.
fn heading_text(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 3 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(&[' ', '\t'][..]) {
        return None;
    }
    Some(rest.trim())
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Outer pipes are optional, so `id | INT | PK` is a row too.
fn is_pipe_row(line: &str) -> bool {
    line.contains('|')
}

fn is_separator_row(line: &str) -> bool {
    line.contains('-')
        && line
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn is_dash_cell(cell: &str) -> bool {
    cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
}

/// The body of one table heading.
struct Section<'a> {
    name: String,
    lines: Vec<&'a str>,
}

fn split_sections(body: &str) -> Vec<Section<'_>> {
    let mut sections = Vec::new();
    let mut current: Option<Section> = None;

    for line in body.lines() {
        if let Some(text) = heading_text(line) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            if let Some(caps) = table_heading_re().captures(text) {
                current = Some(Section {
                    name: caps[1].to_string(),
                    lines: Vec::new(),
                });
            }
            continue;
        }
        if let Some(section) = current.as_mut() {
            section.lines.push(line);
        }
    }
    if let Some(done) = current {
        sections.push(done);
    }
    sections
}

impl Section<'_> {
    fn into_table(self) -> Option<Table> {
        let columns = extract_columns(&self.lines);
        if columns.is_empty() {
            return None;
        }
        Some(Table {
            description: extract_description(&self.lines),
            relationships: extract_relationships(&self.lines),
            name: self.name,
            columns,
        })
    }
}

// ─── Section contents ───────────────────────────────────────────────

fn extract_columns(lines: &[&str]) -> Vec<Column> {
    let mut columns = Vec::new();
    let mut header_seen = false;

    for line in lines {
        let trimmed = line.trim();
        if !is_pipe_row(trimmed) {
            if header_seen {
                break;
            }
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }
        if is_separator_row(trimmed) {
            continue;
        }

        let cells: Vec<&str> = trimmed
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        if let Some(column) = parse_column_row(&cells) {
            columns.push(column);
        }
    }
    columns
}

/// Build a column from the non-empty cells of one row.
fn parse_column_row(cells: &[&str]) -> Option<Column> {
    if cells.len() < 2 {
        return None;
    }
    let name = cells[0];
    let raw_type = cells[1];

    let lowered = name.to_lowercase();
    if HEADER_WORDS.contains(&lowered.as_str()) {
        return None;
    }
    if is_dash_cell(name) || is_dash_cell(raw_type) {
        return None;
    }

    let mut column = Column::new(name, raw_type);

    if not_null_re().is_match(raw_type) {
        column.nullable = false;
        let stripped = not_null_re().replace_all(raw_type, "");
        column.data_type = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    }

    if let Some(third) = cells.get(2) {
        let key_info = third.to_uppercase();
        column.is_primary_key = primary_marker_re().is_match(&key_info);
        column.is_foreign_key = foreign_marker_re().is_match(&key_info);

        column.description = if column.is_primary_key || column.is_foreign_key {
            cells.get(3).map(|d| d.to_string()).unwrap_or_default()
        } else {
            third.to_string()
        };
    }

    Some(column)
}

fn extract_description(lines: &[&str]) -> String {
    lines
        .iter()
        .take_while(|line| !is_pipe_row(line))
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !is_heading(line))
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_relationships(lines: &[&str]) -> Vec<Relationship> {
    lines
        .iter()
        .filter(|line| !is_pipe_row(line))
        .flat_map(|line| relationship_re().captures_iter(line))
        .map(|caps| Relationship {
            column: caps[1].to_string(),
            references_table: caps[2].to_string(),
            references_column: caps[3].to_string(),
        })
        .collect()
}

fn extract_title(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let rest = line.strip_prefix('#')?;
        if !rest.starts_with(&[' ', '\t'][..]) {
            return None;
        }
        let title = rest.trim();
        (!title.is_empty()).then(|| title.to_string())
    })
}
