//! Command synthesis: one round trip to the text generator per chat request.
//!
//! Each call is a single attempt. Failures are reported to the caller as they
//! happen; nothing here retries or backs off.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::llm::{self, ResolvedProvider};
use crate::settings::LlmProviderConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const BODY_PREVIEW_CHARS: usize = 300;

/// Source of raw completion text.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, instructions: &str, user_message: &str) -> Result<String, AppError>;
}

/// Generator backed by an HTTP chat-completion API.
pub struct HttpGenerator {
    client: reqwest::Client,
    provider: ResolvedProvider,
    temperature: f32,
    timeout_secs: u64,
}

impl HttpGenerator {
    /// # Errors
    /// `ProviderUnavailable` without an API key, `Config` if the HTTP client
    /// cannot be built.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, AppError> {
        let provider = ResolvedProvider::from_config(config)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(config.timeout_secs)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config {
                message: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            provider,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.provider.model
    }

    fn map_send_error(&self, e: &reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::ProviderTimeout {
                seconds: self.timeout_secs,
            }
        } else if e.is_connect() {
            AppError::ProviderUnavailable {
                message: format!("Failed to connect to {}: {e}", self.provider.url),
            }
        } else {
            AppError::ProviderError {
                message: format!("Request to {} failed: {e}", self.provider.url),
            }
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn complete(&self, instructions: &str, user_message: &str) -> Result<String, AppError> {
        tracing::debug!(model = %self.provider.model, url = %self.provider.url, "Calling text generator");

        let response = llm::build_request(
            &self.client,
            &self.provider,
            instructions,
            user_message,
            self.temperature,
        )
        .send()
        .await
        .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(&e))?;

        if !status.is_success() {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            return Err(AppError::ProviderError {
                message: format!("API error ({status}): {preview}"),
            });
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| AppError::ProviderError {
            message: format!("Failed to parse provider response: {e}"),
        })?;
        llm::parse_response(self.provider.provider, &json)
    }
}

/// Send `user_message` with `instructions` as the system message and return
/// the completion trimmed of surrounding whitespace.
pub async fn synthesize(
    generator: &dyn Generator,
    user_message: &str,
    instructions: &str,
) -> Result<String, AppError> {
    match generator.complete(instructions, user_message).await {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "Text generator call failed");
            Err(e)
        }
    }
}
