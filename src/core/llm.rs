use crate::config::LLMConfig;
use crate::core::error::UpstreamError;
use crate::core::types::Role;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Language-model backend the gateway forwards assembled prompts to
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct LLMClient {
    client: Client,
    api_key: String,
    config: LLMConfig,
}

impl LLMClient {
    pub fn new(api_key: String, config: LLMConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status().as_u16();
        if let Some(err) = UpstreamError::from_status(status) {
            // Body may echo request details; only its size is logged
            let body_len = response.text().await.map(|b| b.len()).unwrap_or_default();
            tracing::warn!(
                "[LLMClient] API returned error status {} ({} byte body)",
                status,
                body_len
            );
            return Err(err);
        }

        let chat_response = response.json::<ChatResponse>().await.map_err(|e| {
            tracing::warn!("[LLMClient] Failed to decode response body: {}", e);
            UpstreamError::EmptyResponse
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(UpstreamError::EmptyResponse)
    }
}

#[async_trait]
impl Upstream for LLMClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        const BASE_DELAY_MS: u64 = 500;

        let mut attempt = 0;
        loop {
            match self.attempt(&request).await {
                Err(UpstreamError::Unavailable(status)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = BASE_DELAY_MS * 2_u64.pow(attempt - 1);
                    tracing::warn!(
                        "[LLMClient] Upstream unavailable ({}), retrying (attempt {}/{}) after {}ms",
                        status,
                        attempt + 1,
                        self.config.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, max_retries: u32) -> LLMClient {
        let config = LLMConfig {
            base_url: server.uri(),
            timeout_ms: 2_000,
            max_retries,
            ..LLMConfig::default()
        };
        LLMClient::new("test-key".to_string(), config).unwrap()
    }

    fn messages() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(Role::System, "be nice"),
            ChatMessage::new(Role::User, "hello"),
        ]
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server, 0).complete(messages()).await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server, 0).complete(messages()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key sk-123"))
            .mount(&server)
            .await;

        let err = client_for(&server, 2).complete(messages()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Authentication(401)));
        assert!(!err.to_string().contains("sk-123"));
    }

    #[tokio::test]
    async fn test_blank_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "   "}}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, 0).complete(messages()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_unavailable_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "recovered"}}]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server, 1).complete(messages()).await.unwrap();
        assert_eq!(reply, "recovered");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let config = LLMConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_ms: 2_000,
            max_retries: 0,
            ..LLMConfig::default()
        };
        let client = LLMClient::new("k".to_string(), config).unwrap();
        let err = client.complete(messages()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::ConnectionRefused));
    }
}
