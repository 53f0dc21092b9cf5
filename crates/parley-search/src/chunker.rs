// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recursive character splitter.
//!
//! Text is split on the first separator of the strategy's list that occurs
//! in it. Pieces still longer than the chunk size are split again with the
//! remaining separators; the empty separator splits into characters. Small
//! pieces are then merged back up to the chunk size, carrying `chunk_overlap`
//! characters of context from one chunk into the next. Separators stay
//! attached to the piece they end, so merged text reads as the original.
//!
//! All lengths are in characters, not bytes.

use parley_config::model::{ChunkingConfig, ChunkingStrategy};

/// One piece of a split document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    /// False when the document was kept whole.
    pub is_chunk: bool,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    fn whole(text: &str) -> Self {
        Self {
            content: text.to_string(),
            is_chunk: false,
            chunk_index: 0,
            total_chunks: 1,
        }
    }
}

pub fn separators(strategy: ChunkingStrategy) -> &'static [&'static str] {
    match strategy {
        ChunkingStrategy::Sentences => &[". ", "! ", "? ", "\n", " ", ""],
        ChunkingStrategy::Paragraphs => &["\n\n", "\n", " ", ""],
        ChunkingStrategy::Fixed => &[" ", ""],
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits `text` into chunks according to `options`.
///
/// Empty input, a non-positive chunk size, or input that already fits in one
/// chunk yields a single non-chunk.
pub fn chunk_text(text: &str, options: &ChunkingConfig) -> Vec<Chunk> {
    if options.chunk_size <= 0 || text.trim().is_empty() {
        return vec![Chunk::whole(text)];
    }
    let size = options.chunk_size as usize;
    if char_len(text) <= size {
        return vec![Chunk::whole(text)];
    }
    let overlap = options.chunk_overlap.clamp(0, options.chunk_size - 1) as usize;

    let splitter = Splitter { size, overlap };
    let mut pieces: Vec<String> = splitter
        .split(text, separators(options.strategy))
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let min_len = (options.min_chunk_size.max(0.0) * size as f64) as usize;
    if pieces.len() > 1 && pieces.last().is_some_and(|p| char_len(p) < min_len) {
        if let Some(tail) = pieces.pop() {
            if let Some(prev) = pieces.last_mut() {
                prev.push(' ');
                prev.push_str(&tail);
            }
        }
    }

    if pieces.len() <= 1 {
        return vec![Chunk::whole(text)];
    }

    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk {
            content,
            is_chunk: true,
            chunk_index: i,
            total_chunks: total,
        })
        .collect()
}

struct Splitter {
    size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[][..]),
        };

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut out = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) <= self.size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                out.extend(self.merge(&small));
                small.clear();
            }
            if rest.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split(piece, rest));
            }
        }
        if !small.is_empty() {
            out.extend(self.merge(&small));
        }
        out
    }

    /// Packs pieces into chunks of at most `size` characters, re-using up to
    /// `overlap` trailing characters of each chunk at the start of the next.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.size && !window.is_empty() {
                out.push(window.iter().copied().collect::<String>());
                while let Some(front) = window.front() {
                    if total <= self.overlap && total + len <= self.size {
                        break;
                    }
                    total -= char_len(front);
                    window.pop_front();
                }
            }
            window.push_back(piece);
            total += len;
        }
        if !window.is_empty() {
            out.push(window.iter().copied().collect::<String>());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn options(size: i64, overlap: i64, strategy: ChunkingStrategy) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            min_chunk_size: 0.0,
            strategy,
        }
    }

    #[test]
    fn boundary_inputs_stay_whole() {
        let opts = options(100, 10, ChunkingStrategy::Sentences);
        assert_eq!(chunk_text("", &opts), vec![Chunk::whole("")]);
        assert_eq!(chunk_text("short text", &opts), vec![Chunk::whole("short text")]);

        let long = "word ".repeat(100);
        for size in [0, -5] {
            let chunks = chunk_text(&long, &options(size, 0, ChunkingStrategy::Fixed));
            assert_eq!(chunks.len(), 1);
            assert!(!chunks[0].is_chunk);
        }
    }

    #[test]
    fn sentences_split_on_sentence_boundaries() {
        let text = "The deploy is on Friday. Alice owns the rollback plan. \
                    Bob will watch the dashboards. Carol writes the notes.";
        let chunks = chunk_text(text, &options(60, 0, ChunkingStrategy::Sentences));
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.is_chunk && c.total_chunks == chunks.len()));
        assert_eq!(chunks[0].content, "The deploy is on Friday. Alice owns the rollback plan.");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert!(c.content.chars().count() <= 60);
        }
    }

    #[test]
    fn paragraphs_prefer_blank_lines() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = chunk_text(&text, &options(40, 0, ChunkingStrategy::Paragraphs));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a".repeat(30));
        assert_eq!(chunks[1].content, "b".repeat(30));
    }

    #[test]
    fn overlap_repeats_trailing_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk_text(text, &options(20, 10, ChunkingStrategy::Fixed));
        assert!(chunks.len() > 2);
        // Some words of each chunk reappear at the start of the next.
        for pair in chunks.windows(2) {
            let last_word = pair[0].content.split(' ').next_back().unwrap();
            assert!(pair[1].content.contains(last_word));
        }
    }

    #[test]
    fn tiny_tail_merges_into_previous_chunk() {
        let text = format!("{}. {}. x.", "a".repeat(40), "b".repeat(40));
        let mut opts = options(42, 0, ChunkingStrategy::Sentences);
        opts.min_chunk_size = 0.25;
        let chunks = chunk_text(&text, &opts);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].content.ends_with("x."));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "z".repeat(250);
        let chunks = chunk_text(&text, &options(100, 0, ChunkingStrategy::Sentences));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].content.len(), 50);
    }

    proptest! {
        #[test]
        fn chunks_respect_size_and_cover_words(
            words in proptest::collection::vec("[a-z]{1,12}", 1..200),
            size in 20i64..200,
            overlap in 0i64..50,
        ) {
            let text = words.join(" ");
            let chunks = chunk_text(&text, &options(size, overlap, ChunkingStrategy::Fixed));
            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                if chunk.is_chunk {
                    prop_assert!(chunk.content.chars().count() <= size as usize);
                }
            }
            let joined: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
            for word in &words {
                prop_assert!(joined.contains(word.as_str()));
            }
        }
    }
}
