//! HTTP client for an OpenAI-compatible chat-completions endpoint

use super::models::{ChatCompletionRequest, ModelResponse};
use crate::config::Settings;
use crate::error::{ProcessError, Result};
use crate::metrics::METRICS;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Instant;
use tracing::{debug, warn};

/// Chat completion client. One POST per call; no retries.
pub struct ChatClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
}

impl ChatClient {
    /// Create a new client from settings
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ProcessError::Request(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.api_url.clone(),
            api_key: SecretString::new(settings.api_key.expose_secret().clone()),
        })
    }

    /// Send one request and return its status and body uninterpreted
    pub async fn send(&self, request: &ChatCompletionRequest) -> Result<ModelResponse> {
        let start = Instant::now();
        debug!(model = %request.model, endpoint = %self.endpoint, "Calling chat completions API");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                METRICS.record_request(&request.model, "error", start.elapsed());
                warn!(model = %request.model, error = %e, "Chat completions request failed");
                ProcessError::from(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        METRICS.record_request(&request.model, &status.to_string(), start.elapsed());
        debug!(
            model = %request.model,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completions API responded"
        );

        Ok(ModelResponse {
            model: request.model.clone(),
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::models::{ChatMessage, ContentPart};
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new(
            "llama-3.2-11b-vision-preview",
            vec![ChatMessage {
                role: "user".to_string(),
                content: vec![ContentPart::Text {
                    text: "hello".to_string(),
                }],
            }],
            1000,
        )
    }

    #[tokio::test]
    async fn test_send_sets_auth_and_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai/v1/chat/completions")
            .match_header("authorization", "Bearer gsk_test")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "model": "llama-3.2-11b-vision-preview",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hello"}]}],
                "max_tokens": 1000
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"hi"}}]}"#)
            .create_async()
            .await;

        let mut settings = Settings::new("gsk_test");
        settings.api_url = format!("{}/openai/v1/chat/completions", server.url());
        let client = ChatClient::new(&settings).unwrap();

        let response = client.send(&request()).await.unwrap();
        mock.assert_async().await;
        assert!(response.is_success());
        assert_eq!(response.answer().unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let mut settings = Settings::new("gsk_test");
        settings.api_url = server.url();
        let client = ChatClient::new(&settings).unwrap();

        let response = client.send(&request()).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "overloaded");
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut settings = Settings::new("gsk_test");
        settings.api_url = format!("http://{}/v1/chat/completions", addr);
        let client = ChatClient::new(&settings).unwrap();

        let err = client.send(&request()).await.unwrap_err();
        assert!(matches!(err, ProcessError::Request(_)));
    }
}
