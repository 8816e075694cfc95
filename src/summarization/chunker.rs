//! # Transcript Chunking
//!
//! Summarization models accept bounded inputs, so the transcript snapshot
//! is split into contiguous pieces of at most `chunk_size` characters
//! before dispatch. Unlike audio windowing, chunking needs no overlap: it
//! runs once over a static string, and each piece is summarized
//! independently.

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1800;

/// Split `text` into contiguous chunks of at most `chunk_size` characters.
///
/// Chunks preserve order and concatenate back to the exact input. Splits
/// land on `char` boundaries, so multi-byte text never produces an invalid
/// slice. An empty input produces no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<&str> {
    assert!(chunk_size > 0, "chunk_size must be positive");

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == chunk_size {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_produces_no_chunks() {
        assert!(chunk_text("", 1800).is_empty());
    }

    #[test]
    fn test_short_input_is_one_chunk() {
        assert_eq!(chunk_text("hello world", 1800), vec!["hello world"]);
    }

    #[test]
    fn test_chunk_count_is_ceiling_of_length() {
        // 4000 chars at 1800 per chunk: ceil(4000 / 1800) = 3
        let text = "a".repeat(4000);
        let chunks = chunk_text(&text, 1800);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 1800);
        assert_eq!(chunks[1].chars().count(), 1800);
        assert_eq!(chunks[2].chars().count(), 400);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_chunk() {
        let text = "b".repeat(3600);
        let chunks = chunk_text(&text, 1800);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() == 1800));
    }

    #[test]
    fn test_concatenation_reconstructs_input() {
        let text = "la réunion a commencé à neuf heures ".repeat(120);
        let chunks = chunk_text(&text, 1800);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1800));
    }

    #[test]
    fn test_multibyte_boundaries_are_respected() {
        // é is 2 bytes; splitting at byte offsets would panic
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks[0], "ééé");
        assert_eq!(chunks[3], "é");
    }
}
