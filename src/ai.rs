// src/ai.rs
//! Chat-completion backend used by the answer resolver.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

const COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response was malformed: {0}")]
    Malformed(String),
}

/// The one capability the resolver needs from an LLM provider.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError>;
}

pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AiClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait]
impl CompletionBackend for AiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let url = format!("{}{}", self.base_url, COMPLETIONS_ENDPOINT);

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        trace!("calling completion backend: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let text = text.trim();

        if text.is_empty() {
            return Err(BackendError::Malformed("empty completion".to_string()));
        }
        Ok(text.to_string())
    }
}
