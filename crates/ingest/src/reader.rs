use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Output of the upstream extraction step: one uploaded file as plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractedDocument {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// Load already-extracted text. Failures are recorded on the document
    /// instead of aborting, so a batch of uploads can be triaged.
    pub async fn load_document(path: &Path) -> ExtractedDocument {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match Self::read_file(path).await {
            Ok(text) => ExtractedDocument {
                filename,
                text,
                error: None,
            },
            Err(e) => {
                warn!(file = %filename, error = %e, "Could not load document text");
                ExtractedDocument {
                    filename,
                    text: String::new(),
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }
}
