use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub offset: (usize, usize), // [start, end) byte positions in the normalized source
}

impl Chunk {
    pub fn new(index: usize, text: String, start: usize) -> Self {
        let end = start + text.len();
        Self {
            index,
            text,
            offset: (start, end),
        }
    }

    /// Length in characters, the unit chunk bounds are expressed in
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered, non-overlapping sections covering one document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Whole document as one section. Empty text gives an empty plan.
    pub fn single(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self::new(vec![Chunk::new(0, text.to_string(), 0)])
    }

    pub fn total(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn needs_chunking(&self) -> bool {
        self.chunks.len() > 1
    }

    pub fn reconstruct(&self) -> String {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Checks ordinals and offsets are contiguous and the plan covers `source` exactly.
    pub fn covers(&self, source: &str) -> bool {
        let mut expected_start = 0;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if chunk.index != i || chunk.offset.0 != expected_start {
                return false;
            }
            if source.get(chunk.offset.0..chunk.offset.1) != Some(chunk.text.as_str()) {
                return false;
            }
            expected_start = chunk.offset.1;
        }
        expected_start == source.len()
    }
}
