//! HTTP backend for OpenAI-compatible chat completion endpoints
//!
//! One pooled `reqwest::Client` is built per process and reused for every
//! request (TLS session resumption, connection reuse across chunks).
//!
//! Failure classification:
//! - timeouts, connection errors, 408, 429 and 5xx are `Transient`
//! - every other non-success status (401, 403, 400, 404, 422, ...) is `Fatal`

use super::client::{ModelBackend, Prompt};
use crate::config::PipelineConfig;
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Build the shared HTTP client
///
/// - per-request timeout from config
/// - idle connections sized for parallel chunk analysis
/// - keepalive so long papers don't renegotiate TLS between chunks
pub fn build_http_client(timeout: Duration, max_idle: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(max_idle)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
}

/// Chat-completions backend (`POST {api_url}` with a bearer key)
pub struct ChatCompletionsBackend {
    client: Client,
    api_url: String,
    api_key: String,
    model_id: String,
    max_tokens: u32,
}

impl ChatCompletionsBackend {
    pub fn new(client: Client, config: &PipelineConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Build the backend together with its own pooled client
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ModelError> {
        let client = build_http_client(config.request_timeout, config.max_concurrency)
            .map_err(|e| ModelError::Fatal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(client, config))
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.text,
            }],
            temperature: prompt.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ModelBackend for ChatCompletionsBackend {
    async fn generate(&self, prompt: &Prompt) -> Result<String, ModelError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transient(format!("Failed to parse response: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn classify_transport_error(err: reqwest::Error) -> ModelError {
    if err.is_builder() {
        ModelError::Fatal(format!("Invalid request: {}", err))
    } else {
        // timeouts, refused connections, resets, DNS hiccups
        ModelError::Transient(format!("HTTP request failed: {}", err))
    }
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("API error ({}): {}", status, body);
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ModelError::Transient(message)
    } else {
        ModelError::Fatal(message)
    }
}

// API request/response types

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::GATEWAY_TIMEOUT, "").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());

        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!classify_status(StatusCode::FORBIDDEN, "").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "").is_transient());
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(5000);
        let err = classify_status(StatusCode::BAD_REQUEST, &body);
        assert!(err.to_string().len() < 700);
    }

    #[test]
    fn test_request_body_shape() {
        let config = PipelineConfig {
            api_key: "sk-test".into(),
            ..Default::default()
        };
        let backend = ChatCompletionsBackend::from_config(&config).unwrap();
        let prompt = Prompt::new("summarize", 0.2);

        let json = serde_json::to_value(backend.request_body(&prompt)).unwrap();
        assert_eq!(json["model"], config.model_id.as_str());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "summarize");
        assert_eq!(json["max_tokens"], 16384);
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_response_parsing_tolerates_null_content() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = PipelineConfig {
            api_key: "sk-test".into(),
            api_url: "http://127.0.0.1:9/v1/chat/completions".into(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let backend = ChatCompletionsBackend::from_config(&config).unwrap();
        let err = backend.generate(&Prompt::new("hi", 0.4)).await.unwrap_err();
        assert!(err.is_transient(), "got {:?}", err);
    }
}
