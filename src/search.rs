//! In-memory keyword retrieval over schema document chunks.
//!
//! Scoring pipeline:
//!
//! 1. Score every chunk: Σ over query terms of `tf × ln(1 + N / df)`.
//! 2. Drop chunks scoring 0, then min-max normalize the rest into `[0, 1]`
//!    (a single candidate, or all-equal scores, normalize to 1.0).
//! 3. Group by document, keeping each document's best chunk.
//! 4. Sort by score descending, then document id ascending, and truncate.
//!
//! The [`Retriever`] trait is the seam where a vector index plugs in.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::chunk::chunk_document;
use crate::documents::SchemaDocument;
use crate::models::Chunk;
use crate::traits::Retriever;

/// Maximum snippet length in bytes.
const SNIPPET_LEN: usize = 240;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document_id: String,
    pub title: Option<String>,
    pub source: String,
    pub score: f64,
    pub snippet: String,
    pub tables: Vec<String>,
}

struct IndexedChunk {
    chunk: Chunk,
    terms: HashMap<String, usize>,
}

struct DocumentInfo {
    title: Option<String>,
    source: String,
    tables: Vec<String>,
}

/// Term-frequency index built once from a document set.
pub struct KeywordIndex {
    chunks: Vec<IndexedChunk>,
    doc_freq: HashMap<String, usize>,
    documents: HashMap<String, DocumentInfo>,
}

impl KeywordIndex {
    pub fn build(documents: &[SchemaDocument], max_tokens: usize) -> Self {
        let mut chunks = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut infos = HashMap::new();

        for doc in documents {
            for chunk in chunk_document(doc, max_tokens) {
                let mut terms: HashMap<String, usize> = HashMap::new();
                for term in tokenize(&chunk.text) {
                    *terms.entry(term).or_default() += 1;
                }
                for term in terms.keys() {
                    *doc_freq.entry(term.clone()).or_default() += 1;
                }
                chunks.push(IndexedChunk { chunk, terms });
            }
            infos.insert(
                doc.id.clone(),
                DocumentInfo {
                    title: doc.title.clone(),
                    source: doc.path.display().to_string(),
                    tables: doc.tables.clone(),
                },
            );
        }

        debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Built keyword index"
        );
        Self {
            chunks,
            doc_freq,
            documents: infos,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn raw_score(&self, chunk: &IndexedChunk, query_terms: &HashSet<String>) -> f64 {
        let n = self.chunks.len() as f64;
        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *chunk.terms.get(term)? as f64;
                let df = self.doc_freq.get(term).copied().unwrap_or(1) as f64;
                Some(tf * (1.0 + n / df).ln())
            })
            .sum()
    }
}

impl Retriever for KeywordIndex {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            bail!("Search query must not be empty");
        }
        let query_terms: HashSet<String> = tokenize(query).collect();

        let candidates: Vec<(&IndexedChunk, f64)> = self
            .chunks
            .iter()
            .map(|c| (c, self.raw_score(c, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Best chunk per document; BTreeMap keeps ties ordered by id.
        let mut best: BTreeMap<&str, (&IndexedChunk, f64)> = BTreeMap::new();
        for (chunk, score) in normalize_scores(&candidates) {
            let entry = best
                .entry(chunk.chunk.document_id.as_str())
                .or_insert((chunk, score));
            if score > entry.1 {
                *entry = (chunk, score);
            }
        }

        let mut hits: Vec<SearchHit> = best
            .into_iter()
            .map(|(doc_id, (chunk, score))| {
                let info = self.documents.get(doc_id);
                SearchHit {
                    document_id: doc_id.to_string(),
                    title: info.and_then(|i| i.title.clone()),
                    source: info.map(|i| i.source.clone()).unwrap_or_default(),
                    score,
                    snippet: snippet(&chunk.chunk.text),
                    tables: info.map(|i| i.tables.clone()).unwrap_or_default(),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        hits.truncate(top_k);

        debug!(
            target: "query_log",
            query = %query,
            hits = hits.len(),
            "Schema search"
        );
        Ok(hits)
    }
}

/// Lower-cased runs of alphanumerics and underscores.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn normalize_scores<'a>(candidates: &[(&'a IndexedChunk, f64)]) -> Vec<(&'a IndexedChunk, f64)> {
    let min = candidates.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let max = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|&(c, s)| {
            let norm = if (max - min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - min) / (max - min)
            };
            (c, norm)
        })
        .collect()
}

fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut end = SNIPPET_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Metadata;
    use chrono::Utc;
    use std::path::PathBuf;

    fn doc(id: &str, text: &str, tables: &[&str]) -> SchemaDocument {
        SchemaDocument {
            id: id.to_string(),
            file_name: id.to_string(),
            path: PathBuf::from("/schemas").join(id),
            title: Some(id.trim_end_matches(".md").to_string()),
            database: None,
            tables: tables.iter().map(|t| t.to_string()).collect(),
            updated_at: Utc::now(),
            metadata: Metadata::new(),
            text: text.to_string(),
        }
    }

    fn index() -> KeywordIndex {
        KeywordIndex::build(
            &[
                doc("orders.md", "## Table: orders\nCustomer orders with totals.", &["orders"]),
                doc("users.md", "## Table: users\nRegistered customer accounts.", &["users"]),
                doc("audit.md", "## Table: audit_log\nChange history.", &["audit_log"]),
            ],
            700,
        )
    }

    #[test]
    fn test_empty_query_is_error() {
        assert!(index().search("   ", 5).is_err());
    }

    #[test]
    fn test_best_match_first() {
        let hits = index().search("orders totals", 5).unwrap();
        assert_eq!(hits[0].document_id, "orders.md");
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[0].tables, vec!["orders"]);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    }

    #[test]
    fn test_ties_sorted_by_id() {
        let hits = index().search("customer", 5).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["orders.md", "users.md"]);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_top_k_truncates() {
        let hits = index().search("table", 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(index().search("inventory", 5).unwrap().is_empty());
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "ü".repeat(200);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert!(s.len() <= SNIPPET_LEN + 3);
    }
}
