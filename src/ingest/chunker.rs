//! Overlapping text chunker
//!
//! Splits extracted text into bounded-length chunks with a configured
//! overlap so context is not lost across chunk boundaries. Offsets and
//! lengths are counted in characters, not bytes, so slicing never lands
//! inside a multi-byte codepoint.

/// A chunk of text with its character offset into the source
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    /// Character offset of the chunk start within the source text
    pub start: usize,
    pub text: String,
}

/// Split `text` into chunks of at most `chunk_size` characters, where each
/// chunk after the first starts `overlap` characters before the previous
/// chunk's end.
///
/// Invariant: concatenating the first chunk with every later chunk minus its
/// leading `overlap` characters reconstructs the input exactly.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkSpan> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // An overlap >= chunk_size would never advance
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every character, so char positions map to valid slices
    let byte_offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = byte_offsets.len();
    let byte_at = |char_idx: usize| -> usize {
        if char_idx >= total_chars {
            text.len()
        } else {
            byte_offsets[char_idx]
        }
    };

    let mut spans = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total_chars);
        spans.push(ChunkSpan {
            start,
            text: text[byte_at(start)..byte_at(end)].to_string(),
        });

        if end == total_chars {
            break;
        }
        start = end - overlap;
    }

    spans
}

/// Reconstruct the original text from chunk spans produced by [`chunk_text`]
/// with the same `overlap`. Used to verify the partition invariant.
pub fn reconstruct(spans: &[ChunkSpan], overlap: usize) -> String {
    let mut out = String::new();
    for (i, span) in spans.iter().enumerate() {
        if i == 0 {
            out.push_str(&span.text);
        } else {
            out.extend(span.text.chars().skip(overlap));
        }
    }
    out
}
