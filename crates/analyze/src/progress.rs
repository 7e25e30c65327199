use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub stage: String,
}

pub type ProgressSender = UnboundedSender<ProgressEvent>;

/// Pass-through reporter for multi-section analyses.
///
/// Sends never block. A dropped receiver means the caller stopped listening;
/// the analysis carries on regardless.
pub struct ProgressEmitter {
    sink: Option<ProgressSender>,
}

impl ProgressEmitter {
    pub fn new(sink: Option<ProgressSender>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn emit(&self, current: usize, total: usize, stage: impl Into<String>) {
        let Some(sink) = &self.sink else {
            return;
        };
        debug_assert!(current <= total, "progress {} exceeds total {}", current, total);

        let event = ProgressEvent {
            current,
            total,
            stage: stage.into(),
        };
        debug!(current, total, stage = %event.stage, "Progress");
        let _ = sink.send(event);
    }

    pub fn preparing(&self, total: usize) {
        self.emit(0, total, "Preparing analysis");
    }

    pub fn section_done(&self, number: usize, total: usize) {
        self.emit(number, total, format!("Analyzing section {} of {}", number, total));
    }

    pub fn combining(&self, total: usize) {
        self.emit(total, total, "Combining results");
    }
}
