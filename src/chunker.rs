//! Text chunking
//!
//! Splits text into overlapping chunks for embedding, using a recursive
//! separator hierarchy: paragraph boundary, then line boundary, then word
//! boundary, then single characters. Every chunk is an exact contiguous
//! substring of the input, so re-ingestion of identical text is byte-for-byte
//! reproducible and the original text can be reconstructed from the chunks
//! minus their overlaps.

use tracing::debug;

use crate::config::ChunkingConfig;
use crate::errors::{EngineError, Result};

/// Separator hierarchy, coarsest first. Past the last level the splitter
/// falls back to single characters.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A chunk of the input text with its position
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk content, an exact substring of the input
    pub content: String,
    /// Zero-based index of this chunk in the document
    pub index: i32,
    /// Start position in the original text, in characters
    pub start_char: usize,
    /// End position (exclusive) in the original text, in characters
    pub end_char: usize,
}

/// Split text into chunks of at most `chunk_size` characters where
/// consecutive chunks share up to `chunk_overlap` characters of context.
///
/// Identical input and parameters always produce an identical chunk sequence.
/// Empty input yields no chunks; no produced chunk is empty.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    if config.chunk_size == 0 {
        return Err(EngineError::invalid_argument("chunk_size must be positive"));
    }
    if config.chunk_overlap >= config.chunk_size {
        return Err(EngineError::invalid_argument(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    // Piece end offsets from the recursive split. Consecutive bounds are at
    // most chunk_size apart, which guarantees the merge below always advances.
    let mut bounds = Vec::new();
    collect_bounds(&chars, 0, chars.len(), 0, config.chunk_size, &mut bounds);

    let chunks = merge_pieces(&chars, &bounds, config);

    debug!(
        input_chars = chars.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Text chunked"
    );

    Ok(chunks)
}

/// Recursively record piece end offsets for `chars[start..end)` so that every
/// piece is at most `max_len` characters. Separators stay attached to the
/// piece they terminate, which keeps pieces contiguous in the original text.
fn collect_bounds(
    chars: &[char],
    start: usize,
    end: usize,
    level: usize,
    max_len: usize,
    bounds: &mut Vec<usize>,
) {
    if end - start <= max_len {
        bounds.push(end);
        return;
    }
    if level >= SEPARATORS.len() {
        // Character fallback: every position is a legal cut
        bounds.extend(start + 1..=end);
        return;
    }

    let sep: Vec<char> = SEPARATORS[level].chars().collect();
    let mut piece_start = start;
    let mut i = start;
    while i + sep.len() <= end {
        if chars[i..i + sep.len()] == sep[..] {
            let piece_end = i + sep.len();
            collect_bounds(chars, piece_start, piece_end, level + 1, max_len, bounds);
            piece_start = piece_end;
            i = piece_end;
        } else {
            i += 1;
        }
    }
    if piece_start < end {
        collect_bounds(chars, piece_start, end, level + 1, max_len, bounds);
    }
}

/// Greedily merge pieces into chunks of at most `chunk_size` characters, then
/// step each new chunk back to the latest piece bound within `chunk_overlap`
/// characters of the previous chunk's end.
fn merge_pieces(chars: &[char], bounds: &[usize], config: &ChunkingConfig) -> Vec<TextChunk> {
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0i32;

    loop {
        let limit = start + config.chunk_size;
        let past_start = bounds.partition_point(|&b| b <= start);
        let within_limit = bounds.partition_point(|&b| b <= limit);
        // At least one bound lies in (start, limit] because consecutive
        // bounds are at most chunk_size apart; the fallback keeps the loop
        // total regardless.
        let end = if within_limit > past_start {
            bounds[within_limit - 1]
        } else {
            bounds[past_start]
        };

        chunks.push(TextChunk {
            content: chars[start..end].iter().collect(),
            index,
            start_char: start,
            end_char: end,
        });
        index += 1;

        if end == total {
            break;
        }

        // Earliest bound giving at most chunk_overlap characters of overlap;
        // if none falls strictly inside the chunk, continue without overlap.
        let want = end.saturating_sub(config.chunk_overlap);
        let candidate = bounds.partition_point(|&b| b < want);
        start = match bounds.get(candidate) {
            Some(&b) if b > start && b < end => b,
            _ => end,
        };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Reassemble the original text from chunks minus their overlaps.
    fn reconstruct(chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.start_char);
            out.extend(chunk.content.chars().skip(skip));
            covered = chunk.end_char;
        }
        out
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text("", &config(100, 20)).unwrap().is_empty());
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = split_text("hello world", &config(100, 20)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].index, 0);
        assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, 11));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(split_text("x", &config(0, 0)).is_err());
        assert!(split_text("x", &config(10, 10)).is_err());
        assert!(split_text("x", &config(10, 20)).is_err());
    }

    #[test]
    fn chunks_respect_size_and_are_never_empty() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let chunks = split_text(&text, &config(120, 30)).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.content.is_empty());
            assert!(chunk.content.chars().count() <= 120);
        }
    }

    #[test]
    fn consecutive_chunks_overlap_at_most_configured_amount() {
        let text = "word ".repeat(500);
        let chunks = split_text(&text, &config(100, 25)).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char >= pair[0].end_char.saturating_sub(25));
            assert!(pair[1].start_char <= pair[0].end_char);
            assert!(pair[1].start_char > pair[0].start_char);
        }
    }

    #[test]
    fn reconstruction_of_plain_text() {
        let text = "abcdefghij".repeat(250);
        let chunks = split_text(&text, &config(1000, 200)).unwrap();
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn reconstruction_with_separator_hierarchy() {
        let text = format!(
            "{}\n\n{}\n{}\n\n{}",
            "First paragraph sentence. ".repeat(20),
            "Second block line one here. ".repeat(15),
            "Second block line two follows. ".repeat(15),
            "Closing paragraph words. ".repeat(25),
        );
        let chunks = split_text(&text, &config(300, 60)).unwrap();
        assert!(chunks.len() > 2);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "deterministic splitting input\n\nsecond paragraph here ".repeat(30);
        let cfg = config(200, 50);
        assert_eq!(split_text(&text, &cfg).unwrap(), split_text(&text, &cfg).unwrap());
    }

    #[test]
    fn separator_free_text_gets_exact_overlap() {
        let text: String = "a".repeat(2500);
        let chunks = split_text(&text, &config(1000, 200)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, 1000));
        assert_eq!((chunks[1].start_char, chunks[1].end_char), (800, 1800));
        assert_eq!((chunks[2].start_char, chunks[2].end_char), (1600, 2500));
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn multibyte_text_is_split_on_character_boundaries() {
        let text = "héllo wörld ünïcode ".repeat(50);
        let chunks = split_text(&text, &config(60, 10)).unwrap();
        assert_eq!(reconstruct(&chunks), text);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 60);
        }
    }
}
