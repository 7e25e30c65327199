pub mod config;
pub mod progress;
pub mod reduce;
pub mod request;
pub mod retry;

pub use config::{ConfigError, PipelineConfig, RetryConfig};
pub use progress::{ProgressEmitter, ProgressEvent, ProgressSender};
pub use reduce::Reducer;
pub use request::{AnalysisRequest, AnalysisResult, PartialResult, PipelineError};
pub use retry::RetryPolicy;

use extract::{AnalysisClient, TextBackend};
use ingest::{ChunkPlan, ChunkPlanner, TextNormalizer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    NoChunkingNeeded,
    Chunking,
    Reducing,
    Done,
    Failed,
}

/// Entry point for document analysis: plans the text, analyzes each section in
/// order with retries, then reduces the partial results into one answer.
pub struct DocumentAnalyzer {
    client: AnalysisClient,
    normalizer: TextNormalizer,
    planner: ChunkPlanner,
    retry: RetryPolicy,
    reducer: Reducer,
    large_document_threshold: usize,
}

impl DocumentAnalyzer {
    pub fn new(backend: Arc<dyn TextBackend>, config: &PipelineConfig) -> Self {
        let client = AnalysisClient::new(backend, config.request_timeout());
        let retry = RetryPolicy::from_config(&config.retry);

        Self {
            reducer: Reducer::new(client.clone(), retry.clone()),
            client,
            normalizer: TextNormalizer::new(),
            planner: ChunkPlanner::new(config.planner()),
            retry,
            large_document_threshold: config.large_document_threshold,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.client.backend_name()
    }

    /// Plan already-normalized text. Documents at or below the large-document
    /// threshold are sent whole.
    pub fn plan(&self, text: &str) -> ChunkPlan {
        if text.chars().count() <= self.large_document_threshold {
            ChunkPlan::single(text)
        } else {
            self.planner.plan(text)
        }
    }

    pub async fn analyze_document(
        &self,
        mut request: AnalysisRequest,
    ) -> Result<AnalysisResult, PipelineError> {
        let started = Instant::now();
        let kind = request.kind();
        let sink = request.take_progress();

        let outcome = self.run(&request, sink).await;

        match &outcome {
            Ok(result) => info!(
                state = ?PipelineState::Done,
                kind = %kind,
                chunks = result.chunk_count,
                failed_chunks = result.failed_chunks,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Document analysis finished"
            ),
            Err(e) => warn!(
                state = ?PipelineState::Failed,
                kind = %kind,
                failure = e.kind(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Document analysis failed"
            ),
        }
        outcome
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        sink: Option<ProgressSender>,
    ) -> Result<AnalysisResult, PipelineError> {
        let kind = request.kind();
        let question = request.question();

        debug!(state = ?PipelineState::Planning, raw_chars = request.text().len(), "Planning");
        let text = self.normalizer.normalize(request.text());
        let plan = self.plan(&text);

        if !plan.covers(&text) {
            return Err(PipelineError::Planner(format!(
                "{} chunks do not cover {} bytes of text",
                plan.total(),
                text.len()
            )));
        }

        if plan.is_empty() {
            info!(kind = %kind, "Document is empty after normalization");
            return self
                .reducer
                .reduce(&[], kind, question, &ProgressEmitter::disabled())
                .await;
        }

        let total = plan.total();
        let progress = if plan.needs_chunking() {
            ProgressEmitter::new(sink)
        } else {
            ProgressEmitter::disabled()
        };

        let state = if plan.needs_chunking() {
            PipelineState::Chunking
        } else {
            PipelineState::NoChunkingNeeded
        };
        info!(
            state = ?state,
            kind = %kind,
            chars = text.chars().count(),
            chunks = total,
            "Planned document analysis"
        );
        progress.preparing(total);

        let mut partials = Vec::with_capacity(total);
        for chunk in &plan.chunks {
            let client = &self.client;
            let operation = format!("chunk {} of {}", chunk.index + 1, total);
            let outcome = self
                .retry
                .retry(&operation, move || {
                    client.analyze_chunk(chunk, total, kind, question)
                })
                .await;

            if let Err(e) = &outcome {
                if e.is_auth() {
                    warn!(chunk = chunk.index, "Authentication failed, skipping remaining chunks");
                    return Err(PipelineError::AuthFailure(e.clone()));
                }
                warn!(chunk = chunk.index, failure = e.kind(), "Chunk analysis failed");
            }

            partials.push(PartialResult {
                index: chunk.index,
                outcome,
            });
            progress.section_done(chunk.index + 1, total);
        }

        debug!(state = ?PipelineState::Reducing, chunks = total, "Reducing");
        self.reducer.reduce(&partials, kind, question, &progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::{AnalysisFailure, AnalysisKind};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    type Script = Box<dyn Fn(Option<usize>, usize) -> Result<String, AnalysisFailure> + Send + Sync>;

    /// Replies according to `script(section, attempt)`; `section` is None for
    /// whole-document and synthesis prompts, `attempt` counts identical prompts.
    struct ScriptedBackend {
        prompts: Mutex<Vec<String>>,
        script: Script,
    }

    impl ScriptedBackend {
        fn new(
            script: impl Fn(Option<usize>, usize) -> Result<String, AnalysisFailure> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                script: Box::new(script),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        fn synthesis_prompt(&self) -> Option<String> {
            self.prompts()
                .into_iter()
                .find(|p| p.contains("PARTIAL RESULTS"))
        }
    }

    fn section_of(prompt: &str) -> Option<usize> {
        let rest = prompt.split("NOTE: This is section ").nth(1)?;
        rest.split(' ').next()?.parse().ok()
    }

    #[async_trait]
    impl TextBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, AnalysisFailure> {
            let attempt = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt.to_string());
                prompts.iter().filter(|p| p.as_str() == prompt).count()
            };
            if prompt.contains("PARTIAL RESULTS") {
                return (self.script)(None, attempt).map(|_| "combined result".to_string());
            }
            (self.script)(section_of(prompt), attempt)
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
            ..PipelineConfig::default()
        }
    }

    /// 90 paragraphs of 1000 chars; plans into five sections at the default bound.
    fn large_document() -> String {
        (0..90)
            .map(|i| {
                let head = format!("Paragraph {:02} deadline ", i);
                format!("{}{}\n\n", head, "w".repeat(998 - head.len()))
            })
            .collect()
    }

    fn section_reply(section: Option<usize>) -> Result<String, AnalysisFailure> {
        Ok(match section {
            Some(n) => format!("deadline from section {}", n),
            None => "whole document reply".to_string(),
        })
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_short_document_single_call_without_progress() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());
        let (tx, rx) = mpsc::unbounded_channel();

        let text = "Move-in begins Monday at 8am. ".repeat(17);
        let request = AnalysisRequest::new(&text[..500], AnalysisKind::Summarize, None)
            .unwrap()
            .with_progress(tx);

        let result = analyzer.analyze_document(request).await.unwrap();

        assert_eq!(result.text, "whole document reply");
        assert_eq!(result.chunk_count, 1);
        assert_eq!(backend.prompts().len(), 1);
        assert!(drain(rx).is_empty());
    }

    #[tokio::test]
    async fn test_large_extraction_reports_progress_and_combines() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());
        let (tx, rx) = mpsc::unbounded_channel();

        let request = AnalysisRequest::new(large_document(), AnalysisKind::ExtractDeadlines, None)
            .unwrap()
            .with_progress(tx);

        let result = analyzer.analyze_document(request).await.unwrap();

        assert_eq!(result.text, "combined result");
        assert_eq!(result.chunk_count, 5);
        assert_eq!(result.failed_chunks, 0);

        let events = drain(rx);
        let stages: Vec<&str> = events.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec![
                "Preparing analysis",
                "Analyzing section 1 of 5",
                "Analyzing section 2 of 5",
                "Analyzing section 3 of 5",
                "Analyzing section 4 of 5",
                "Analyzing section 5 of 5",
                "Combining results",
            ]
        );
        assert!(events.iter().all(|e| e.total == 5 && e.current <= e.total));
        assert!(events.windows(2).all(|w| w[0].current <= w[1].current));

        let synthesis = backend.synthesis_prompt().unwrap();
        for n in 1..=5 {
            assert!(synthesis.contains(&format!("deadline from section {}", n)));
        }
        assert_eq!(backend.prompts().len(), 6);
    }

    #[tokio::test]
    async fn test_rate_limited_chunk_recovers() {
        let backend = ScriptedBackend::new(|section, attempt| {
            if section == Some(3) && attempt <= 2 {
                return Err(AnalysisFailure::RateLimited("status 429".into()));
            }
            section_reply(section)
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::ExtractDeadlines, None).unwrap();
        let result = analyzer.analyze_document(request).await.unwrap();

        assert!(!result.is_partial());
        assert!(result.warning().is_none());
        assert!(backend.synthesis_prompt().unwrap().contains("deadline from section 3"));
        assert_eq!(backend.prompts().len(), 8);
    }

    #[tokio::test]
    async fn test_partial_failure_is_counted() {
        let backend = ScriptedBackend::new(|section, _| match section {
            Some(2) | Some(4) => Err(AnalysisFailure::BackendError("status 500".into())),
            other => section_reply(other),
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());
        let (tx, rx) = mpsc::unbounded_channel();

        let request = AnalysisRequest::new(large_document(), AnalysisKind::Summarize, None)
            .unwrap()
            .with_progress(tx);
        let result = analyzer.analyze_document(request).await.unwrap();

        assert_eq!(result.failed_chunks, 2);
        assert_eq!(result.failed_sections, vec![2, 4]);
        assert!(result.warning().is_some());

        // Failed sections still report progress.
        let events = drain(rx);
        let ticks: Vec<(usize, &str)> = events.iter().map(|e| (e.current, e.stage.as_str())).collect();
        assert_eq!(
            ticks,
            vec![
                (0, "Preparing analysis"),
                (1, "Analyzing section 1 of 5"),
                (2, "Analyzing section 2 of 5"),
                (3, "Analyzing section 3 of 5"),
                (4, "Analyzing section 4 of 5"),
                (5, "Analyzing section 5 of 5"),
                (5, "Combining results"),
            ]
        );
        assert!(events.iter().all(|e| e.total == 5));

        let synthesis = backend.synthesis_prompt().unwrap();
        assert!(synthesis.contains("deadline from section 1"));
        assert!(!synthesis.contains("deadline from section 2"));
        assert!(synthesis.contains("3 sections"));
    }

    #[tokio::test]
    async fn test_all_chunks_failing_is_terminal() {
        let backend = ScriptedBackend::new(|_, _| Err(AnalysisFailure::BackendError("status 500".into())));
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::ExtractRequirements, None).unwrap();
        let err = analyzer.analyze_document(request).await.unwrap_err();

        assert!(matches!(err, PipelineError::AllChunksFailed { failed: 5, .. }));
        assert!(backend.synthesis_prompt().is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_short_circuits() {
        let backend = ScriptedBackend::new(|section, _| match section {
            Some(2) => Err(AnalysisFailure::AuthFailure("status 401".into())),
            other => section_reply(other),
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::Summarize, None).unwrap();
        let err = analyzer.analyze_document(request).await.unwrap_err();

        assert_eq!(err.kind(), "auth-failure");
        assert_eq!(backend.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_extraction_falls_back_when_synthesis_fails() {
        let backend = ScriptedBackend::new(|section, _| match section {
            None => Err(AnalysisFailure::BackendError("status 500".into())),
            other => section_reply(other),
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::ExtractDeadlines, None).unwrap();
        let result = analyzer.analyze_document(request).await.unwrap();

        assert!(result.text.starts_with("=== Section 1 of 5 ===\ndeadline from section 1"));
        assert!(result.text.contains("deadline from section 5"));
    }

    #[tokio::test]
    async fn test_auth_failure_during_synthesis_is_surfaced() {
        let backend = ScriptedBackend::new(|section, _| match section {
            None => Err(AnalysisFailure::AuthFailure("status 401".into())),
            other => section_reply(other),
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::ExtractDeadlines, None).unwrap();
        let err = analyzer.analyze_document(request).await.unwrap_err();

        assert_eq!(err.kind(), "auth-failure");
        assert!(matches!(err, PipelineError::AuthFailure(_)));
        // Five sections plus a single synthesis attempt; auth is never retried.
        assert_eq!(backend.prompts().len(), 6);
    }

    #[tokio::test]
    async fn test_summary_synthesis_failure_is_terminal() {
        let backend = ScriptedBackend::new(|section, _| match section {
            None => Err(AnalysisFailure::BackendError("status 500".into())),
            other => section_reply(other),
        });
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(large_document(), AnalysisKind::Summarize, None).unwrap();
        let err = analyzer.analyze_document(request).await.unwrap_err();

        assert!(matches!(err, PipelineError::SynthesisFailed(_)));
    }

    #[tokio::test]
    async fn test_custom_without_question_never_reaches_backend() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let _analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let err = AnalysisRequest::new(large_document(), AnalysisKind::Custom, None).unwrap_err();

        assert_eq!(err.kind(), "invalid-request");
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_custom_question_reaches_every_prompt() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(
            large_document(),
            AnalysisKind::Custom,
            Some("When does freight arrive?".into()),
        )
        .unwrap();
        analyzer.analyze_document(request).await.unwrap();

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 6);
        assert!(prompts.iter().all(|p| p.contains("QUESTION: When does freight arrive?")));
    }

    #[tokio::test]
    async fn test_whitespace_document_is_empty_success() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let analyzer = DocumentAnalyzer::new(backend.clone(), &test_config());

        let request = AnalysisRequest::new(" \r\n\u{000C} ", AnalysisKind::Summarize, None).unwrap();
        let result = analyzer.analyze_document(request).await.unwrap();

        assert_eq!(result.text, "");
        assert_eq!(result.chunk_count, 0);
        assert!(backend.prompts().is_empty());
    }

    #[test]
    fn test_threshold_decides_chunking() {
        let backend = ScriptedBackend::new(|section, _| section_reply(section));
        let config = PipelineConfig {
            large_document_threshold: 100,
            max_chunk_chars: 40,
            ..test_config()
        };
        let analyzer = DocumentAnalyzer::new(backend, &config);

        assert_eq!(analyzer.plan(&"a ".repeat(50)).total(), 1);
        assert!(analyzer.plan(&"a ".repeat(51)).total() > 1);
    }
}
