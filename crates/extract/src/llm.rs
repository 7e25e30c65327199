use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AnalysisFailure, classify_status, classify_transport};

/// A remote generative-text capability: one prompt in, one completion out.
#[async_trait]
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> Result<String, AnalysisFailure>;
}

/// Tenant API key handed in by the credential store. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Hosted backend speaking the OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    base_url: String,
    model: String,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(base_url: String, model: String, api_key: Option<ApiKey>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: build_http_client(timeout),
        }
    }
}

#[async_trait]
impl TextBackend for ChatCompletionsClient {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn generate(&self, prompt: &str) -> Result<String, AnalysisFailure> {
        let key = match &self.api_key {
            Some(key) if !key.is_blank() => key,
            _ => {
                return Err(AnalysisFailure::AuthFailure(
                    "no API key configured for this organization".to_string(),
                ));
            }
        };

        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(&e))?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Local Ollama backend, for development without a tenant key.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: build_http_client(timeout),
        }
    }
}

#[async_trait]
impl TextBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, AnalysisFailure> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(&e))?;

        Ok(ollama_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_redacted() {
        let key = ApiKey::new("sk-live-123");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
        assert_eq!(key.expose(), "sk-live-123");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let client = ChatCompletionsClient::new(
            "http://127.0.0.1:9".to_string(),
            "gpt-4o-mini".to_string(),
            Some(ApiKey::new("  ")),
            Duration::from_secs(1),
        );

        let err = client.generate("hello").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_chat_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"May 1 - booth form"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("May 1 - booth form")
        );

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OllamaClient::new(
            "http://localhost:11434/".to_string(),
            "llama3".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
