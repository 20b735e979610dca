//! OpenAI-compatible description generator
//!
//! Sends one chat completion per image with the title in a Korean prompt and
//! the image URL as an `image_url` content part.

use async_trait::async_trait;
use memebox_common::config::OpenAiConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{rate_limiter, CollaboratorError, DescriptionGenerator, DirectRateLimiter};

const USER_AGENT: &str = concat!("memebox/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiDescriptionGenerator {
    client: reqwest::Client,
    config: OpenAiConfig,
    rate_limiter: DirectRateLimiter,
}

impl OpenAiDescriptionGenerator {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("HTTP client: {}", e)))?;
        let rate_limiter = rate_limiter(config.requests_per_second);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, image_url: &str, title: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt(title) },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }]
        })
    }
}

fn prompt(title: &str) -> String {
    format!("이 밈/짤방에 대해 재미있고 위트있게 설명해주세요. 제목: {}", title)
}

fn extract_reply(response: ChatCompletionResponse) -> Result<String, CollaboratorError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| CollaboratorError::GenerationFailed("empty completion".to_string()))
}

#[async_trait]
impl DescriptionGenerator for OpenAiDescriptionGenerator {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn generate(&self, image_url: &str, title: &str) -> Result<String, CollaboratorError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| CollaboratorError::Unavailable("OpenAI API key not configured".to_string()))?;

        self.rate_limiter.until_ready().await;

        debug!(title, model = %self.config.model, "Requesting meme description");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&self.request_body(image_url, title))
            .send()
            .await
            .map_err(|e| CollaboratorError::GenerationFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::GenerationFailed(format!(
                "API error {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::GenerationFailed(format!("parse error: {}", e)))?;

        extract_reply(completion)
    }

    fn is_available(&self) -> bool {
        self.api_key().is_some()
    }
}
