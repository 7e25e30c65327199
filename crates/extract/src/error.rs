use std::time::Duration;

/// Classified outcome of a failed backend exchange.
///
/// Classification happens where the failure is produced (HTTP status, transport
/// error, blank completion) so retry policy never inspects message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisFailure {
    #[error("authentication with the analysis service failed: {0}")]
    AuthFailure(String),
    #[error("analysis service rate limit reached: {0}")]
    RateLimited(String),
    #[error("network error reaching the analysis service: {0}")]
    TransientNetwork(String),
    #[error("analysis service error: {0}")]
    BackendError(String),
    #[error("analysis service returned an empty response")]
    EmptyResponse,
}

impl AnalysisFailure {
    pub fn timeout(after: Duration) -> Self {
        AnalysisFailure::TransientNetwork(format!(
            "request timed out after {}s",
            after.as_secs_f32()
        ))
    }

    /// Stable tag used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisFailure::AuthFailure(_) => "auth-failure",
            AnalysisFailure::RateLimited(_) => "rate-limited",
            AnalysisFailure::TransientNetwork(_) => "transient-network",
            AnalysisFailure::BackendError(_) => "backend-error",
            AnalysisFailure::EmptyResponse => "empty-response",
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AnalysisFailure::AuthFailure(_))
    }
}

/// Map a non-success HTTP status from the backend to a failure class.
pub fn classify_status(status: u16, body: &str) -> AnalysisFailure {
    let detail = if body.trim().is_empty() {
        format!("status {}", status)
    } else {
        format!("status {}: {}", status, truncate(body.trim(), 200))
    };

    match status {
        401 | 403 => AnalysisFailure::AuthFailure(detail),
        429 => AnalysisFailure::RateLimited(detail),
        408 | 502 | 503 | 504 => AnalysisFailure::TransientNetwork(detail),
        _ => AnalysisFailure::BackendError(detail),
    }
}

/// Map a transport-level error from reqwest.
pub fn classify_transport(err: &reqwest::Error) -> AnalysisFailure {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AnalysisFailure::TransientNetwork(err.to_string())
    } else if err.is_decode() || err.is_body() {
        AnalysisFailure::BackendError(format!("unreadable response: {}", err))
    } else if let Some(status) = err.status() {
        classify_status(status.as_u16(), "")
    } else {
        AnalysisFailure::TransientNetwork(err.to_string())
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
