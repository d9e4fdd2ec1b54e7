//! Overlapping character-window text chunker.
//!
//! Splits extracted document text into chunks of at most `chunk_size`
//! characters, with consecutive chunks sharing exactly `chunk_overlap`
//! characters. Chunk boundaries prefer natural breakpoints — paragraph
//! break, then sentence ending, then whitespace — before falling back to a
//! hard cut at the size limit.
//!
//! Chunks are exact substrings of the input: stripping the leading overlap
//! from every chunk after the first and concatenating reconstructs the
//! original text.

use crate::config::ChunkingConfig;

/// Split text into overlapping chunks. Deterministic: same input and config
/// always produce the same sequence. Empty input produces no chunks.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let size = config.chunk_size;
    let overlap = config.chunk_overlap;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + size).min(total);
        let end = if hard_end < total {
            // The floor keeps every non-final chunk longer than the overlap,
            // so the window always advances.
            find_breakpoint(&chars, start + overlap + 1, hard_end)
        } else {
            hard_end
        };

        chunks.push(chars[start..end].iter().collect());

        if end >= total {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Find the best cut position in `(floor, hard_end]`, scanning backward.
///
/// Preference order: position just after a paragraph break (`\n\n`), then
/// after a sentence ending (`.`/`!`/`?` followed by whitespace), then after
/// any whitespace. Falls back to `hard_end` when the window has no natural
/// breakpoint.
fn find_breakpoint(chars: &[char], floor: usize, hard_end: usize) -> usize {
    debug_assert!(floor <= hard_end);

    for i in (floor..=hard_end).rev() {
        if i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
    }

    for i in (floor..=hard_end).rev() {
        if i >= 2 && matches!(chars[i - 2], '.' | '!' | '?') && chars[i - 1].is_whitespace() {
            return i;
        }
    }

    for i in (floor..=hard_end).rev() {
        if i >= 1 && chars[i - 1].is_whitespace() {
            return i;
        }
    }

    hard_end
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

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", &config(1000, 200));
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_text("", &config(1000, 200)).is_empty());
    }

    #[test]
    fn test_no_chunk_exceeds_size() {
        let text = "word ".repeat(500);
        let chunks = chunk_text(&text, &config(100, 20));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_share_exact_overlap() {
        let text = "alpha beta gamma delta ".repeat(40);
        let overlap = 15;
        let chunks = chunk_text(&text, &config(80, overlap));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - overlap..].iter().collect();
            let head: String = next[..overlap].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_coverage_reconstructs_input() {
        let text = "First paragraph about login.\n\nSecond paragraph about sessions. \
                    It has two sentences.\n\nThird paragraph, quite a bit longer, talks \
                    about password reset flows and lockout policies at length."
            .repeat(5);
        let overlap = 25;
        let chunks = chunk_text(&text, &config(120, overlap));

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(chunk);
            } else {
                rebuilt.extend(chunk.chars().skip(overlap));
            }
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_deterministic() {
        let text = "Some requirement text. ".repeat(60);
        let cfg = config(90, 10);
        assert_eq!(chunk_text(&text, &cfg), chunk_text(&text, &cfg));
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = format!("{}\n\n{}", "a".repeat(50), "b".repeat(100));
        let chunks = chunk_text(&text, &config(80, 10));
        // The first cut lands just after the paragraph break, not mid-run.
        assert!(chunks[0].ends_with("\n\n"));
    }

    #[test]
    fn test_prefers_sentence_over_whitespace() {
        let text = format!("Sentence one ends here. {}", "word ".repeat(40));
        let chunks = chunk_text(&text, &config(60, 5));
        assert!(chunks[0].ends_with(". "));
    }

    #[test]
    fn test_hard_cut_without_breakpoints() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, &config(100, 10));
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn test_multibyte_text_respects_char_bounds() {
        let text = "日本語のテキストです。".repeat(30);
        let chunks = chunk_text(&text, &config(50, 8));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
        // Reconstruction still holds for non-ASCII input.
        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(chunk);
            } else {
                rebuilt.extend(chunk.chars().skip(8));
            }
        }
        assert_eq!(rebuilt, text);
    }
}
