use extract::{AnalysisClient, AnalysisKind};
use tracing::{info, warn};

use crate::progress::ProgressEmitter;
use crate::request::{AnalysisResult, PartialResult, PipelineError};
use crate::retry::RetryPolicy;

/// Join successful partial outputs in section order, each under a header.
pub fn concatenate(partials: &[PartialResult], total: usize) -> String {
    partials
        .iter()
        .filter_map(|p| {
            p.text()
                .map(|text| format!("=== Section {} of {} ===\n{}", p.index + 1, total, text))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Combines ordered partial results into the final answer.
pub struct Reducer {
    client: AnalysisClient,
    retry: RetryPolicy,
}

impl Reducer {
    pub fn new(client: AnalysisClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub async fn reduce(
        &self,
        partials: &[PartialResult],
        kind: AnalysisKind,
        question: Option<&str>,
        progress: &ProgressEmitter,
    ) -> Result<AnalysisResult, PipelineError> {
        let total = partials.len();
        let failed_sections: Vec<usize> = partials
            .iter()
            .filter(|p| !p.is_success())
            .map(|p| p.index + 1)
            .collect();
        let succeeded = total - failed_sections.len();

        let result = |text: String| AnalysisResult {
            text,
            kind,
            chunk_count: total,
            failed_chunks: failed_sections.len(),
            failed_sections: failed_sections.clone(),
        };

        if total == 0 {
            return Ok(result(String::new()));
        }

        if succeeded == 0 {
            let last = partials
                .iter()
                .rev()
                .find_map(|p| p.outcome.as_ref().err())
                .cloned()
                .ok_or_else(|| PipelineError::Planner("failed chunk without failure".to_string()))?;
            return Err(PipelineError::AllChunksFailed {
                failed: total,
                last,
            });
        }

        if total == 1 {
            let text = partials[0].text().unwrap_or_default().to_string();
            return Ok(result(text));
        }

        let combined = concatenate(partials, total);
        progress.combining(total);

        let client = &self.client;
        let context = combined.as_str();
        let synthesis = self
            .retry
            .retry("synthesis", move || {
                client.synthesize(kind, question, context, succeeded)
            })
            .await;

        let text = match synthesis {
            Ok(text) => text,
            Err(e) if e.is_auth() => return Err(PipelineError::AuthFailure(e)),
            Err(e) if kind.is_extraction() => {
                warn!(
                    kind = %kind,
                    failure = e.kind(),
                    "Synthesis failed, returning concatenated extractions"
                );
                combined
            }
            Err(e) => return Err(PipelineError::SynthesisFailed(e)),
        };

        info!(
            kind = %kind,
            sections = total,
            failed = failed_sections.len(),
            "Combined section results"
        );
        Ok(result(text))
    }
}
