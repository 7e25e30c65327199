use extract::{AnalysisFailure, AnalysisKind};
use serde::Serialize;

use crate::progress::ProgressSender;

/// One call into the pipeline. Constructed through [`AnalysisRequest::new`],
/// which rejects empty documents and custom analyses without a question.
#[derive(Debug)]
pub struct AnalysisRequest {
    text: String,
    kind: AnalysisKind,
    question: Option<String>,
    progress: Option<ProgressSender>,
}

impl AnalysisRequest {
    pub fn new(
        text: impl Into<String>,
        kind: AnalysisKind,
        question: Option<String>,
    ) -> Result<Self, PipelineError> {
        let text = text.into();
        if text.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "document text is empty".to_string(),
            ));
        }

        let question = question
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        let question = if kind.requires_question() {
            if question.is_none() {
                return Err(PipelineError::InvalidRequest(
                    "a question is required for custom analysis".to_string(),
                ));
            }
            question
        } else {
            None
        };

        Ok(Self {
            text,
            kind,
            question,
            progress: None,
        })
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    pub(crate) fn take_progress(&mut self) -> Option<ProgressSender> {
        self.progress.take()
    }
}

/// Output of analyzing one chunk. Failures stay in the list, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    pub index: usize,
    pub outcome: Result<String, AnalysisFailure>,
}

impl PartialResult {
    pub fn text(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub kind: AnalysisKind,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    /// 1-based section numbers that could not be analyzed
    pub failed_sections: Vec<usize>,
}

impl AnalysisResult {
    pub fn is_partial(&self) -> bool {
        self.failed_chunks > 0
    }

    /// Note for the caller when some sections are missing from the result
    pub fn warning(&self) -> Option<String> {
        if !self.is_partial() {
            return None;
        }
        let sections: Vec<String> = self.failed_sections.iter().map(|s| s.to_string()).collect();
        Some(format!(
            "{} of {} sections could not be analyzed (sections {}); the result may be incomplete",
            self.failed_chunks,
            self.chunk_count,
            sections.join(", ")
        ))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    AuthFailure(AnalysisFailure),
    #[error("{}", all_failed_message(.failed, .last))]
    AllChunksFailed { failed: usize, last: AnalysisFailure },
    #[error("could not combine section results: {0}")]
    SynthesisFailed(AnalysisFailure),
    #[error("internal error while splitting the document: {0}")]
    Planner(String),
}

fn all_failed_message(failed: &usize, last: &AnalysisFailure) -> String {
    if *failed == 1 {
        last.to_string()
    } else {
        format!("none of the {} document sections could be analyzed: {}", failed, last)
    }
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid-request",
            PipelineError::AuthFailure(_) => "auth-failure",
            PipelineError::AllChunksFailed { .. } => "all-chunks-failed",
            PipelineError::SynthesisFailed(_) => "synthesis-failed",
            PipelineError::Planner(_) => "planner-error",
        }
    }
}
