pub mod chunk;
pub mod chunker;
pub mod normalizer;
pub mod reader;

pub use chunk::{Chunk, ChunkPlan};
pub use chunker::{ChunkPlanner, PlannerConfig};
pub use normalizer::TextNormalizer;
pub use reader::{ExtractedDocument, FileReader};

/// Plan `text` into sections of at most `max_chunk_chars` characters
pub fn plan(text: &str, max_chunk_chars: usize) -> ChunkPlan {
    let planner = ChunkPlanner::new(PlannerConfig {
        max_chunk_chars,
        ..PlannerConfig::default()
    });
    planner.plan(text)
}

/// Normalize document text with a one-off normalizer
pub fn normalize_text(raw: &str) -> String {
    TextNormalizer::new().normalize(raw)
}
