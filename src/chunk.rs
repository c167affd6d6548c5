//! Paragraph-boundary chunker for schema documents.
//!
//! Paragraphs (separated by blank lines) are packed greedily into chunks of
//! at most `max_tokens * 4` bytes. A paragraph larger than that is cut at
//! line breaks, then at spaces, then at the nearest char boundary.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::documents::SchemaDocument;
use crate::models::Chunk;

/// Rough bytes-per-token ratio used to size chunks.
const CHARS_PER_TOKEN: usize = 4;

pub fn chunk_document(doc: &SchemaDocument, max_tokens: usize) -> Vec<Chunk> {
    chunk_text(&doc.id, &doc.text, max_tokens)
}

/// Split `text` into chunks with indices `0..n`. Never returns an empty vec.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let limit = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut pieces: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !buf.is_empty() && buf.len() + 2 + para.len() > limit {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.len() > limit {
            if !buf.is_empty() {
                pieces.push(std::mem::take(&mut buf));
            }
            pieces.extend(split_oversized(para, limit));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }
    if !buf.is_empty() {
        pieces.push(buf);
    }
    if pieces.is_empty() {
        pieces.push(text.trim().to_string());
    }

    pieces
        .iter()
        .enumerate()
        .map(|(index, piece)| make_chunk(document_id, index, piece))
        .collect()
}

fn split_oversized(para: &str, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = para;
    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let head = &rest[..cut];
        let at = head
            .rfind('\n')
            .or_else(|| head.rfind(' '))
            .filter(|&pos| pos > 0)
            .map(|pos| pos + 1)
            .unwrap_or(cut);
        let at = if at == 0 { rest.chars().next().map_or(1, char::len_utf8) } else { at };

        let piece = rest[..at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = &rest[at..];
    }
    let tail = rest.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

fn make_chunk(document_id: &str, index: usize, text: &str) -> Chunk {
    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
