//! Overlapping-window text chunker.
//!
//! Splits normalized document text into windows of at most
//! `chunk_size` characters, stepping back `overlap` characters between
//! consecutive windows. Cut points prefer natural breakpoints (sentence,
//! paragraph, word) over hard cuts at the size limit.
//!
//! Whitespace-only windows are discarded; surviving chunks are numbered
//! contiguously from zero and tagged with the 1-based page containing
//! their start offset.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::models::ChunkPiece;

/// Breakpoints tried in order of preference when a window must be cut
/// before the end of the text.
const BREAKPOINTS: [&str; 5] = [". ", ".\n", "\n\n", "\n", " "];

/// Split `text` into overlapping chunks.
///
/// `page_offsets` holds the byte offset at which each page starts
/// (ascending, first entry 0). An empty slice means page numbers are
/// unknown and chunks carry `page_number: None`.
///
/// Fails with [`Error::Configuration`] when `overlap >= chunk_size`,
/// which would make the window never advance.
pub fn split_text(
    text: &str,
    page_offsets: &[usize],
    chunking: &ChunkingConfig,
) -> Result<Vec<ChunkPiece>> {
    let chunk_size = chunking.chunk_size;
    let overlap = chunking.overlap;

    if chunk_size == 0 {
        return Err(Error::Configuration("chunk_size must be > 0".into()));
    }
    if overlap >= chunk_size {
        return Err(Error::Configuration(format!(
            "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let len = text.len();
    let mut pieces = Vec::new();
    let mut index: i64 = 0;
    let mut start = 0usize;

    while start < len {
        let mut end = floor_char_boundary(text, (start + chunk_size).min(len));
        if end <= start {
            // chunk_size is smaller than the next character; take it whole.
            end = ceil_char_boundary(text, start + 1);
        }

        // Prefer a natural breakpoint unless the window already reaches
        // the end of the text.
        if end < len {
            if let Some(cut) = natural_break(&text[start..end]) {
                end = start + cut;
            }
        }

        let piece = &text[start..end];
        if !piece.trim().is_empty() {
            pieces.push(ChunkPiece {
                index,
                text: piece.to_string(),
                offset: start,
                page_number: page_for(page_offsets, start),
            });
            index += 1;
        }

        if end >= len {
            break;
        }

        // Step back by the overlap, but always advance.
        let step = ceil_char_boundary(text, end.saturating_sub(overlap));
        start = if step > start { step } else { end };
    }

    Ok(pieces)
}

/// Rightmost preferred breakpoint within a window, as an exclusive byte
/// offset relative to the window start. Returns `None` when no breakpoint
/// would leave a non-empty chunk.
fn natural_break(window: &str) -> Option<usize> {
    for sep in BREAKPOINTS {
        if let Some(pos) = window.rfind(sep) {
            if pos > 0 {
                return Some(pos + sep.len());
            }
        }
    }
    None
}

/// 1-based page containing `offset`, given ascending page start offsets.
fn page_for(page_offsets: &[usize], offset: usize) -> Option<i64> {
    if page_offsets.is_empty() {
        return None;
    }
    let page = page_offsets.iter().take_while(|&&p| p <= offset).count();
    Some(page.max(1) as i64)
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && i < text.len() && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
