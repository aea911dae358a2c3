//! OpenAI-compatible chat completions client with retry logic

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::processing::RateLimiter;
use crate::types::DocumentAnalysis;

use super::llm::GenerativeTextProvider;

/// Chat completions client with automatic retry
///
/// The caller's permit covers the first attempt of a call. Each retry waits
/// for a permit of its own from the attached [`RateLimiter`], and HTTP 429 is
/// returned at once instead of being retried.
pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
    max_retries: u32,
    rate_limiter: Option<RateLimiter>,
}

/// Failure of a single attempt
enum AttemptError {
    /// The provider is throttling us; retrying would make it worse
    Throttled(Error),
    Failed(Error),
}

impl From<Error> for AttemptError {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
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
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            config: config.clone(),
            rate_limiter: None,
        })
    }

    /// Gate retries on `limiter`
    ///
    /// Without a limiter, retries are disabled.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, AttemptError>>,
    {
        let max_retries = match self.rate_limiter {
            Some(_) => self.max_retries,
            None => 0,
        };
        let mut attempt = 0;

        loop {
            let e = match operation().await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Throttled(e)) => {
                    tracing::warn!("Provider throttled the request, not retrying");
                    return Err(e);
                }
                Err(AttemptError::Failed(e)) => e,
            };

            if attempt >= max_retries {
                return Err(e);
            }

            let delay = Duration::from_secs(2u64.pow(attempt));
            tracing::warn!(
                "Request failed (attempt {}/{}): {}, retrying in {:?}",
                attempt + 1,
                max_retries + 1,
                e,
                delay
            );
            sleep(delay).await;
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire().await;
            }
            attempt += 1;
        }
    }

    /// Send one chat completion and return the assistant's text
    async fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let url = self.endpoint("chat/completions");
        let url = url.as_str();

        self.retry_request(|| async move {
            let mut messages = Vec::with_capacity(2);
            if let Some(system) = system {
                messages.push(ChatMessage {
                    role: "system",
                    content: system,
                });
            }
            messages.push(ChatMessage {
                role: "user",
                content: prompt,
            });

            let request = ChatRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
            };

            let response = self
                .authorize(self.client.post(url))
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::llm(format!("Completion request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AttemptError::Throttled(Error::llm(
                    "rate limit exceeded, wait a moment and try again",
                )));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::llm(format!(
                    "Completion failed: HTTP {} - {}",
                    status, body
                ))
                .into());
            }

            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::llm(format!("Failed to parse completion response: {}", e)))?;

            chat.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| Error::llm("Completion response has no content").into())
        })
        .await
    }
}

#[async_trait]
impl GenerativeTextProvider for OpenAiClient {
    async fn analyze(&self, text: &str) -> Result<DocumentAnalysis> {
        let prompt = PromptBuilder::build_analysis_prompt(text);

        tracing::info!("Analyzing document with model: {}", self.config.model);

        let completion = self
            .chat(Some(PromptBuilder::ANALYSIS_SYSTEM), &prompt)
            .await?;

        DocumentAnalysis::from_completion(&completion)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(None, prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.endpoint("models");

        match self.authorize(self.client.get(&url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
