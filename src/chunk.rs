//! Greedy word-accumulation text chunker.
//!
//! Long inputs are split into budget-bounded runs of whole words before
//! synthesis, because the model's token context tops out at 510 phoneme
//! tokens.  The default budget of 500 characters keeps a chunk's phoneme
//! sequence comfortably inside that limit for English text.
//!
//! Each word is charged its character count plus one for the trailing
//! separator.  A word is never split: a single word longer than the whole
//! budget is emitted alone as an oversized chunk.

/// Maximum characters per text chunk before splitting.
pub const DEFAULT_CHUNK_BUDGET: usize = 500;

/// Split `text` into whole-word chunks whose charged length stays within
/// `budget`.
///
/// The charged length of a chunk is the sum over its words of
/// `word_chars + 1`.  The budget check only fires once the accumulator
/// holds at least one word, so an oversized word still gets a chunk of
/// its own rather than being truncated.
///
/// Whitespace runs collapse; words inside a chunk are re-joined with
/// single spaces.  Empty (or all-whitespace) input yields no chunks.
/// This function cannot fail.
pub fn chunk_text(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut length = 0usize;

    for word in text.split_whitespace() {
        let contribution = word.chars().count() + 1;
        if length + contribution > budget && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            length = 0;
        }
        current.push(word);
        length += contribution;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", 500).is_empty());
        assert!(chunk_text("   \n\t  ", 500).is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        assert_eq!(chunk_text("Hello world", 500), vec!["Hello world"]);
    }

    #[test]
    fn test_fixed_vectors() {
        // "a" charges 2; adding "b" would charge 4 > 3, so every word closes
        // the previous chunk.
        assert_eq!(chunk_text("a b c", 3), vec!["a", "b", "c"]);
        // Budget 4 fits exactly two one-char words (2 + 2).
        assert_eq!(chunk_text("a b c", 4), vec!["a b", "c"]);
    }

    #[test]
    fn test_no_word_is_split() {
        let text = "the quick brown fox jumps over the lazy dog";
        let words: Vec<&str> = text.split_whitespace().collect();
        let chunks = chunk_text(text, 12);

        let rejoined: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.split_whitespace())
            .collect();
        assert_eq!(rejoined, words, "chunking must preserve the word sequence");
    }

    #[test]
    fn test_budget_respected_when_words_fit() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let budget = 16;
        let chunks = chunk_text(text, budget);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            // Joined length is charged length minus the final separator.
            assert!(
                chunk.chars().count() <= budget,
                "chunk {:?} exceeds budget {}",
                chunk,
                budget
            );
        }
    }

    #[test]
    fn test_oversized_word_stands_alone() {
        let chunks = chunk_text("hi supercalifragilistic yo", 10);
        assert_eq!(chunks, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn test_oversized_word_only() {
        // Never truncated, never split, even when it is the whole input.
        assert_eq!(chunk_text("abcdef", 3), vec!["abcdef"]);
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(chunk_text("  a \n\n b\t c  ", 500), vec!["a b c"]);
    }

    #[test]
    fn test_char_budget_not_byte_budget() {
        // 12 chars charged (6 + 6) fits the budget; the byte count (14) would not.
        assert_eq!(chunk_text("héllo wörld", 12), vec!["héllo wörld"]);
        assert_eq!(chunk_text("héllo wörld", 11), vec!["héllo", "wörld"]);
    }

    #[test]
    fn test_long_text_many_chunks() {
        let text = "word ".repeat(300);
        let chunks = chunk_text(&text, DEFAULT_CHUNK_BUDGET);
        // 300 words × 5 charged chars = 1500 → at least three chunks.
        assert!(chunks.len() >= 3);
        let total: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(total, 300);
    }
}
