//! Read-only SQL safety validation and query normalization.
//!
//! [`SqlValidator::is_safe_query`] is the gate every model-proposed query
//! passes before it may reach an executor. The checks run in a fixed order:
//!
//! 1. Write operations enabled in config → reject unconditionally.
//! 2. Comments are stripped, then the whole upper-cased text is scanned for
//!    [`FORBIDDEN_KEYWORDS`] as whole words. Covering the full text (not only
//!    the first statement) is what catches `SELECT ...; DROP TABLE x`.
//!    The scan runs twice: once over the tokenizer's view of the comments
//!    and once over a lexical strip where `/* */` does not nest. A keyword
//!    found by either is a rejection, so `SELECT 1 /* /* */; DROP ...` is
//!    caught whichever way the target database reads it.
//! 3. Text the tokenizer rejects, or with no statement tokens at all →
//!    reject as unparsable.
//! 4. The first token must be one of [`ALLOWED_LEADING_KEYWORDS`].
//!
//! Bad input never produces an error, only a rejecting [`SqlVerdict`].
//!
//! Lexing uses the `sqlparser` tokenizer with the generic dialect, so
//! comment markers inside string literals are left alone. Comments are cut
//! out of the query text by source position, which keeps literals
//! byte-for-byte intact.

use regex::Regex;
use serde::Serialize;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Location, Token, TokenWithLocation, Tokenizer, TokenizerError, Whitespace};
use std::borrow::Cow;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::SqlConfig;

/// Keywords that indicate a write, DDL, or procedural operation.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "REPLACE", "MERGE",
    "CALL", "EXEC", "EXECUTE",
];

/// Statement types a read-only query may start with.
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN"];

pub const SAFE_REASON: &str = "Query is safe";
pub const WRITES_ENABLED_REASON: &str = "Write operations are disabled for security";
pub const PARSE_FAILURE_REASON: &str = "Unable to parse SQL query";
pub const LEADING_KEYWORD_REASON: &str =
    "Query must start with SELECT, WITH, SHOW, DESCRIBE, or EXPLAIN";

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlVerdict {
    pub is_safe: bool,
    pub reason: String,
}

impl SqlVerdict {
    fn safe() -> Self {
        Self {
            is_safe: true,
            reason: SAFE_REASON.to_string(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reason: reason.into(),
        }
    }

    fn forbidden(keyword: &str) -> Self {
        Self::reject(format!("Query contains forbidden operation: {}", keyword))
    }

    pub fn into_tuple(self) -> (bool, String) {
        (self.is_safe, self.reason)
    }
}

/// Read-only query gate.
///
/// Stateless apart from the write-operations flag, which must be `false`
/// in any correct deployment; when it is `true` every query is refused.
#[derive(Debug, Clone, Default)]
pub struct SqlValidator {
    allow_write: bool,
}

impl SqlValidator {
    pub fn new(allow_write: bool) -> Self {
        Self { allow_write }
    }

    pub fn from_config(config: &SqlConfig) -> Self {
        Self::new(config.allow_write)
    }

    /// Decide whether `query` is a read-only statement safe to run.
    pub fn is_safe_query(&self, query: &str) -> SqlVerdict {
        if self.allow_write {
            return SqlVerdict::reject(WRITES_ENABLED_REASON);
        }

        let lexical = lexical_strip(query).to_uppercase();
        let tokens = match tokenize(query) {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!(error = %err, "SQL tokenization failed");
                return match find_forbidden_keyword(&lexical) {
                    Some(keyword) => SqlVerdict::forbidden(keyword),
                    None => SqlVerdict::reject(PARSE_FAILURE_REASON),
                };
            }
        };

        let stripped = remove_comments(query, &tokens).to_uppercase();
        let keyword =
            find_forbidden_keyword(&stripped).or_else(|| find_forbidden_keyword(&lexical));
        if let Some(keyword) = keyword {
            return SqlVerdict::forbidden(keyword);
        }

        let first = tokens.iter().map(|t| &t.token).find(|t| is_significant(t));
        match first {
            None => SqlVerdict::reject(PARSE_FAILURE_REASON),
            Some(Token::Word(word))
                if word.quote_style.is_none()
                    && ALLOWED_LEADING_KEYWORDS.contains(&word.value.to_uppercase().as_str()) =>
            {
                SqlVerdict::safe()
            }
            Some(_) => SqlVerdict::reject(LEADING_KEYWORD_REASON),
        }
    }

    /// See [`sanitize_query`].
    pub fn sanitize_query(&self, query: &str) -> String {
        sanitize_query(query)
    }
}

fn forbidden_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FORBIDDEN_KEYWORDS
            .iter()
            .map(|kw| {
                let re = Regex::new(&format!(r"\b{}\b", kw)).expect("valid keyword regex");
                (*kw, re)
            })
            .collect()
    })
}

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLIMIT\b").expect("valid LIMIT regex"))
}

fn lexical_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/|--[^\n]*").expect("valid comment regex"))
}

/// Strip comments without tokenizing. Block comments do not nest and end
/// at the first `*/`, which is how MySQL and SQLite read them.
fn lexical_strip(query: &str) -> Cow<'_, str> {
    lexical_comment_re().replace_all(query, " ")
}

/// First denylisted keyword (in [`FORBIDDEN_KEYWORDS`] order) present as a
/// whole word in already upper-cased text.
fn find_forbidden_keyword(upper: &str) -> Option<&'static str> {
    forbidden_patterns()
        .iter()
        .find(|(_, re)| re.is_match(upper))
        .map(|(kw, _)| *kw)
}

fn tokenize(query: &str) -> Result<Vec<TokenWithLocation>, TokenizerError> {
    let dialect = GenericDialect {};
    Tokenizer::new(&dialect, query).tokenize_with_location()
}

fn is_comment(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::SingleLineComment { .. })
            | Token::Whitespace(Whitespace::MultiLineComment(_))
    )
}

fn is_significant(token: &Token) -> bool {
    !matches!(token, Token::Whitespace(_) | Token::EOF)
}

/// Maps tokenizer locations (1-based line and character column) to byte
/// offsets in the source text.
struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    fn offset(&self, location: &Location) -> usize {
        let line = (location.line.max(1) - 1) as usize;
        let start = match self.line_starts.get(line) {
            Some(start) => *start,
            None => return self.text.len(),
        };
        let column = (location.column.max(1) - 1) as usize;
        self.text[start..]
            .char_indices()
            .nth(column)
            .map(|(i, _)| start + i)
            .unwrap_or(self.text.len())
    }
}

/// Cut comment tokens out of `query`. A comment spanning a line break is
/// replaced by a newline, any other by a space, so adjacent tokens never fuse.
fn remove_comments(query: &str, tokens: &[TokenWithLocation]) -> String {
    let index = LineIndex::new(query);
    let mut out = String::with_capacity(query.len());
    let mut cursor = 0;

    for (i, tok) in tokens.iter().enumerate() {
        if !is_comment(&tok.token) {
            continue;
        }
        let start = index.offset(&tok.location).max(cursor);
        let end = tokens
            .get(i + 1)
            .map(|next| index.offset(&next.location))
            .unwrap_or(query.len())
            .max(start);

        out.push_str(&query[cursor..start]);
        out.push_str(if query[start..end].contains('\n') { "\n" } else { " " });
        cursor = end;
    }
    out.push_str(&query[cursor..]);
    out
}

/// Remove SQL comments, leaving everything else (including literals) as written.
pub fn strip_comments(query: &str) -> Result<String, TokenizerError> {
    let tokens = tokenize(query)?;
    Ok(remove_comments(query, &tokens))
}

/// Strip comments and collapse whitespace runs to single spaces.
///
/// A normalization step only; [`SqlValidator::is_safe_query`] is the safety
/// gate. Text the tokenizer rejects falls back to a purely lexical strip.
pub fn sanitize_query(query: &str) -> String {
    let stripped = strip_comments(query).unwrap_or_else(|err| {
        debug!(error = %err, "falling back to lexical comment strip");
        lexical_strip(query).into_owned()
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Append `LIMIT max_rows` unless the query already has a LIMIT clause.
pub fn apply_row_limit(query: &str, max_rows: usize) -> String {
    if limit_re().is_match(query) {
        return query.to_string();
    }
    let base = query.trim_end().trim_end_matches(';').trim_end();
    format!("{} LIMIT {}", base, max_rows)
}
