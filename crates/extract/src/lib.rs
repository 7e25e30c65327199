pub mod error;
pub mod llm;
pub mod prompt;
pub mod schema;

pub use error::AnalysisFailure;
pub use llm::{ApiKey, ChatCompletionsClient, OllamaClient, TextBackend};
pub use prompt::SectionInfo;
pub use schema::AnalysisKind;

use ingest::Chunk;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One request/response exchange with the generative-text backend, per section
/// or for the final combining pass.
#[derive(Clone)]
pub struct AnalysisClient {
    backend: Arc<dyn TextBackend>,
    timeout: Duration,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn TextBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Analyze one chunk. `total` is the number of chunks in the plan; when it is
    /// more than one the prompt tells the backend it is only seeing a section.
    pub async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        total: usize,
        kind: AnalysisKind,
        question: Option<&str>,
    ) -> Result<String, AnalysisFailure> {
        let section = (total > 1).then_some(SectionInfo {
            number: chunk.index + 1,
            total,
        });
        let prompt = prompt::build_analysis_prompt(kind, question, &chunk.text, section);

        debug!(
            chunk = chunk.index,
            total,
            kind = %kind,
            prompt_chars = prompt.len(),
            "Analyzing chunk"
        );
        self.call(&prompt).await
    }

    /// Combine earlier partial outputs into one result.
    pub async fn synthesize(
        &self,
        kind: AnalysisKind,
        question: Option<&str>,
        prior_context: &str,
        sections: usize,
    ) -> Result<String, AnalysisFailure> {
        let prompt = prompt::build_synthesis_prompt(kind, question, prior_context, sections);

        debug!(kind = %kind, sections, prompt_chars = prompt.len(), "Synthesizing");
        self.call(&prompt).await
    }

    async fn call(&self, prompt: &str) -> Result<String, AnalysisFailure> {
        let text = tokio::time::timeout(self.timeout, self.backend.generate(prompt))
            .await
            .map_err(|_| AnalysisFailure::timeout(self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(AnalysisFailure::EmptyResponse);
        }
        Ok(text.to_string())
    }
}
