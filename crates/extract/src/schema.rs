use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    ExtractDeadlines,
    ExtractRequirements,
    Summarize,
    Custom,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::ExtractDeadlines,
        AnalysisKind::ExtractRequirements,
        AnalysisKind::Summarize,
        AnalysisKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::ExtractDeadlines => "extract_deadlines",
            AnalysisKind::ExtractRequirements => "extract_requirements",
            AnalysisKind::Summarize => "summarize",
            AnalysisKind::Custom => "custom",
        }
    }

    /// Extraction kinds list items; partial outputs can be concatenated.
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            AnalysisKind::ExtractDeadlines | AnalysisKind::ExtractRequirements
        )
    }

    pub fn requires_question(&self) -> bool {
        matches!(self, AnalysisKind::Custom)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
