mod config;
mod metrics;

use analyze::{AnalysisRequest, AnalysisResult, DocumentAnalyzer, PipelineError, ProgressEvent};
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use extract::AnalysisKind;
use ingest::ExtractedDocument;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::UnboundedReceiverStream};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::{AppConfig, BackendProvider};
use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};

struct AppState {
    analyzer: Arc<DocumentAnalyzer>,
    metrics: Arc<Metrics>,
}

impl AppState {
    fn new(analyzer: DocumentAnalyzer) -> Arc<Self> {
        Arc::new(Self {
            analyzer: Arc::new(analyzer),
            metrics: Metrics::new(),
        })
    }

    /// Run one analysis under its own request span, recording metrics
    async fn run_analysis(
        &self,
        request_id: Uuid,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, PipelineError> {
        let span = info_span!("analysis", %request_id, kind = %request.kind());
        let timer = TimedOperation::start();

        let outcome = self
            .analyzer
            .analyze_document(request)
            .instrument(span)
            .await;

        match &outcome {
            Ok(result) => {
                self.metrics
                    .record_success(timer.elapsed(), result.chunk_count, result.failed_chunks)
            }
            Err(_) => self.metrics.record_failure(timer.elapsed()),
        }
        outcome
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    backend: String,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(alias = "documentText")]
    document_text: String,
    #[serde(alias = "analysisType")]
    analysis_type: AnalysisKind,
    #[serde(default, alias = "customQuery")]
    custom_query: Option<String>,
}

/// One record from the upstream extraction service. The text travels in the
/// body; the server never opens caller-supplied paths.
#[derive(Deserialize)]
struct AnalyzeFileRequest {
    #[serde(flatten)]
    document: ExtractedDocument,
    #[serde(alias = "analysisType")]
    analysis_type: AnalysisKind,
    #[serde(default, alias = "customQuery")]
    custom_query: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    request_id: Uuid,
    result: String,
    analysis_type: AnalysisKind,
    chunk_count: usize,
    failed_chunks: usize,
    failed_sections: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl AnalyzeResponse {
    fn new(request_id: Uuid, result: AnalysisResult) -> Self {
        Self {
            request_id,
            warning: result.warning(),
            result: result.text,
            analysis_type: result.kind,
            chunk_count: result.chunk_count,
            failed_chunks: result.failed_chunks,
            failed_sections: result.failed_sections,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: String,
}

struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            PipelineError::AllChunksFailed { .. } | PipelineError::SynthesisFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            PipelineError::Planner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: e.to_string(),
                kind: e.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.server.json_logs);

    if config.backend.provider == BackendProvider::ChatCompletions && config.backend.api_key.is_none() {
        warn!("No API key configured; analysis requests will fail authentication");
    }

    let analyzer = DocumentAnalyzer::new(config.build_backend(), &config.pipeline);
    let app = build_router(AppState::new(analyzer));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .context(format!("Failed to bind {}", config.server.bind_addr))?;

    info!(
        addr = %config.server.bind_addr,
        backend = ?config.backend.provider,
        model = %config.backend.model,
        "Document analysis server listening"
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_document))
        .route("/analyze/stream", post(analyze_document_stream))
        .route("/analyze/file", post(analyze_file))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.analyzer.backend_name().to_string(),
    })
}

async fn analyze_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = AnalysisRequest::new(req.document_text, req.analysis_type, req.custom_query)?;
    let request_id = Uuid::new_v4();

    let result = state.run_analysis(request_id, request).await?;
    Ok(Json(AnalyzeResponse::new(request_id, result)))
}

async fn analyze_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeFileRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let document = req.document;
    if let Some(error) = document.error {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error,
                kind: "unreadable-document".to_string(),
            },
        });
    }

    let request = AnalysisRequest::new(document.text, req.analysis_type, req.custom_query)?;
    let request_id = Uuid::new_v4();
    info!(%request_id, file = %document.filename, "Analyzing extracted document");

    let result = state.run_analysis(request_id, request).await?;
    Ok(Json(AnalyzeResponse::new(request_id, result)))
}

/// Same as `/analyze`, but streams `progress` events before the terminal
/// `result` or `error` event.
async fn analyze_document_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = AnalysisRequest::new(req.document_text, req.analysis_type, req.custom_query)?;
    let request_id = Uuid::new_v4();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let request = request.with_progress(progress_tx);

    tokio::spawn(async move {
        let progress_events = event_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                if let Ok(event) = Event::default().event("progress").json_data(&progress) {
                    let _ = progress_events.send(event);
                }
            }
        });

        let outcome = state.run_analysis(request_id, request).await;
        // The analyzer has dropped its sender; drain what is left.
        let _ = forwarder.await;

        let event = match outcome {
            Ok(result) => Event::default()
                .event("result")
                .json_data(AnalyzeResponse::new(request_id, result)),
            Err(e) => Event::default()
                .event("error")
                .json_data(ApiError::from(e).body),
        };
        if let Ok(event) = event {
            let _ = event_tx.send(event);
        }
    });

    let stream = UnboundedReceiverStream::new(event_rx).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
