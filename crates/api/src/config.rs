use analyze::PipelineConfig;
use anyhow::{Context, Result};
use extract::{ApiKey, ChatCompletionsClient, OllamaClient, TextBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "ANALYZER_CONFIG";
pub const API_KEY_ENV: &str = "ANALYZER_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub json_logs: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    ChatCompletions, // Hosted API, needs the organization's key
    Ollama,          // Local model for development
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: BackendProvider,
    pub base_url: String,
    pub model: String,
    /// Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            json_logs: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::ChatCompletions,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the JSON file named by `ANALYZER_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&raw).context(format!("Failed to parse config file: {:?}", path))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.backend.api_key = Some(ApiKey::new(key));
        }
        if let Some(addr) = lookup("ANALYZER_BIND") {
            self.server.bind_addr = addr;
        }
        if let Some(url) = lookup("ANALYZER_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = lookup("ANALYZER_MODEL") {
            self.backend.model = model;
        }
        if let Some(json) = lookup("ANALYZER_JSON_LOGS") {
            self.server.json_logs = matches!(json.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .context("Invalid pipeline configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        self.pipeline.request_timeout()
    }

    pub fn build_backend(&self) -> Arc<dyn TextBackend> {
        let timeout = self.request_timeout();
        match self.backend.provider {
            BackendProvider::ChatCompletions => Arc::new(ChatCompletionsClient::new(
                self.backend.base_url.clone(),
                self.backend.model.clone(),
                self.backend.api_key.clone(),
                timeout,
            )),
            BackendProvider::Ollama => Arc::new(OllamaClient::new(
                self.backend.base_url.clone(),
                self.backend.model.clone(),
                timeout,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.backend.provider, BackendProvider::ChatCompletions);
        assert_eq!(config.pipeline.large_document_threshold, 40_000);
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn test_partial_json() {
        let config: AppConfig = serde_json::from_str(
            r#"{"backend": {"provider": "ollama", "base_url": "http://gpu-box:11434", "model": "llama3"},
                "pipeline": {"max_chunk_chars": 12000}}"#,
        )
        .unwrap();

        assert_eq!(config.backend.provider, BackendProvider::Ollama);
        assert_eq!(config.pipeline.max_chunk_chars, 12000);
        assert_eq!(config.pipeline.retry.max_attempts, 3);
        assert_eq!(config.build_backend().name(), "ollama");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (API_KEY_ENV, "sk-tenant-42"),
            ("ANALYZER_BIND", "127.0.0.1:8080"),
            ("ANALYZER_JSON_LOGS", "true"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.backend.api_key.as_ref().unwrap().expose(), "sk-tenant-42");
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert!(config.server.json_logs);
        assert_eq!(config.build_backend().name(), "chat-completions");
    }

    #[test]
    fn test_blank_key_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|name| (name == API_KEY_ENV).then(|| "   ".to_string()));
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some(ApiKey::new("sk-secret"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let config: AppConfig =
            serde_json::from_str(r#"{"pipeline": {"request_timeout_secs": 0}}"#).unwrap();

        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("request_timeout_secs"));
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_file_errors() {
        let err = AppConfig::from_file(Path::new("/nonexistent/analyzer.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
