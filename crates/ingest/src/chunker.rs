use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::{Chunk, ChunkPlan};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Upper bound on a section, in characters
    pub max_chunk_chars: usize,
    /// How far back from the bound a natural break is searched for
    pub boundary_lookback_chars: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 20_000,
            boundary_lookback_chars: 4_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Word,
    Hard,
}

pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into ordered sections of at most `max_chunk_chars` characters.
    ///
    /// Cuts land on the last paragraph break inside the lookback window, then the
    /// last sentence boundary, then the last whitespace, and only then at the bound
    /// itself. Concatenating the chunks reproduces `text` exactly.
    pub fn plan(&self, text: &str) -> ChunkPlan {
        let max = self.config.max_chunk_chars.max(1);
        let lookback = self.config.boundary_lookback_chars.min(max);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let rest = &text[start..];

            // Byte length of the first `max` chars; None means the rest fits.
            let Some((limit, _)) = rest.char_indices().nth(max) else {
                chunks.push(Chunk::new(chunks.len(), rest.to_string(), start));
                break;
            };

            let floor = rest
                .char_indices()
                .nth(max - lookback)
                .map(|(i, _)| i)
                .unwrap_or(0);

            let (cut, boundary) = find_cut(rest, limit, floor);
            debug!(
                chunk = chunks.len(),
                start,
                len = cut,
                boundary = ?boundary,
                "Planned chunk"
            );

            chunks.push(Chunk::new(chunks.len(), rest[..cut].to_string(), start));
            start += cut;
        }

        ChunkPlan::new(chunks)
    }
}

/// Best cut position in `rest[..limit]`, at or after byte `floor` and never zero.
///
/// Word and hard cuts land on grapheme boundaries of `rest`, so a base letter
/// keeps its combining marks. A single grapheme wider than the whole window is
/// split at `limit`, since the bound always wins.
fn find_cut(rest: &str, limit: usize, floor: usize) -> (usize, Boundary) {
    let window = &rest[..limit];

    if let Some(i) = window[floor..].rfind("\n\n") {
        return (floor + i + 2, Boundary::Paragraph);
    }

    let sentence = window
        .split_sentence_bound_indices()
        .map(|(i, _)| i)
        .filter(|&i| i > 0 && i >= floor)
        .last();
    if let Some(i) = sentence {
        return (i, Boundary::Sentence);
    }

    let graphemes = || {
        rest.grapheme_indices(true)
            .map(|(i, g)| (i, i + g.len(), g))
            .take_while(|&(_, end, _)| end <= limit)
    };

    let word = graphemes()
        .filter(|&(i, _, g)| i >= floor && g.starts_with(char::is_whitespace))
        .last();
    if let Some((_, end, _)) = word {
        return (end, Boundary::Word);
    }

    match graphemes().last() {
        Some((_, end, _)) => (end, Boundary::Hard),
        None => (limit, Boundary::Hard),
    }
}
