use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4-0125-preview";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rate limited by the model provider")]
    RateLimited,
    #[error("model provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: OPENAI_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
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

/// OpenAI-compatible chat completions client. Transient failures are
/// retried by the transport according to [`LlmConfig::retry`].
pub struct OpenAiChat {
    client: ClientWithMiddleware,
    config: LlmConfig,
}

impl OpenAiChat {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = config
            .retry
            .client(Client::builder().timeout(config.timeout).build()?);
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    #[instrument(name = "llm_complete", skip(self, prompt), fields(model = %self.config.model))]
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!(chars = content.len(), "Model responded");
        Ok(content)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    const REPLY: &str = r#"{"choices": [{"message": {"role": "assistant", "content": "  Gloom \n"}}]}"#;

    fn chat_for(server: &Server, max_attempts: u32) -> OpenAiChat {
        let mut config = LlmConfig::new("sk-test");
        config.endpoint = server.url();
        config.model = "gpt-test".to_string();
        config.retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        OpenAiChat::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = Server::new_async().await;
        let chat = chat_for(&server, 1);

        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-test",
                "messages": [{"role": "user", "content": "Which DAO?"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPLY)
            .create_async()
            .await;

        assert_eq!(chat.complete("Which DAO?").await.unwrap(), "Gloom");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let chat = chat_for(&server, 3);

        let unavailable = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPLY)
            .expect(1)
            .create_async()
            .await;

        assert_eq!(chat.complete("hi").await.unwrap(), "Gloom");
        unavailable.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_after_last_attempt() {
        let mut server = Server::new_async().await;
        let chat = chat_for(&server, 2);

        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let err = chat.complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let chat = chat_for(&server, 3);

        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .expect(1)
            .create_async()
            .await;

        match chat.complete("hi").await.unwrap_err() {
            LlmError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let mut server = Server::new_async().await;
        let chat = chat_for(&server, 1);

        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        assert!(matches!(
            chat.complete("hi").await,
            Err(LlmError::EmptyResponse)
        ));
    }
}
