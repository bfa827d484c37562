//! LLM provider abstraction — builds chat-completion requests and extracts the
//! completion text for both OpenAI-compatible and Anthropic APIs.

use serde_json::Value;

use crate::error::AppError;
use crate::settings::{LlmProvider, LlmProviderConfig};

const MAX_TOKENS: u32 = 2048;

/// Resolved provider details ready for making an API call.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub provider: LlmProvider,
}

impl ResolvedProvider {
    /// Resolve a provider config into concrete URL / key / model values.
    ///
    /// # Errors
    /// Returns `ProviderUnavailable` if the API key is missing.
    pub fn from_config(config: &LlmProviderConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::ProviderUnavailable {
                message: "No API key configured for the text-generation provider".to_string(),
            })?
            .to_string();

        match config.provider {
            LlmProvider::Anthropic => Ok(Self {
                url: "https://api.anthropic.com/v1/messages".to_string(),
                api_key,
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
                provider: LlmProvider::Anthropic,
            }),
            LlmProvider::OpenAiCompatible => {
                let base = config
                    .base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com/v1");
                let base = base.trim_end_matches('/');
                Ok(Self {
                    url: format!("{base}/chat/completions"),
                    api_key,
                    model: config
                        .model
                        .clone()
                        .unwrap_or_else(|| "gpt-4o-mini".to_string()),
                    provider: LlmProvider::OpenAiCompatible,
                })
            }
        }
    }
}

/// Build the HTTP request for one system + user exchange.
pub fn build_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    user_message: &str,
    temperature: f32,
) -> reqwest::RequestBuilder {
    match provider.provider {
        LlmProvider::Anthropic => {
            build_anthropic_request(client, provider, system_prompt, user_message, temperature)
        }
        LlmProvider::OpenAiCompatible => {
            build_openai_request(client, provider, system_prompt, user_message, temperature)
        }
    }
}

/// Pull the completion text out of the provider's response JSON.
///
/// # Errors
/// Returns `ProviderError` when the response carries no text.
pub fn parse_response(provider: LlmProvider, json: &Value) -> Result<String, AppError> {
    let text = match provider {
        LlmProvider::Anthropic => parse_anthropic_response(json),
        LlmProvider::OpenAiCompatible => parse_openai_response(json),
    };
    text.ok_or_else(|| AppError::ProviderError {
        message: "Provider response contained no completion text".to_string(),
    })
}

// ── Anthropic ────────────────────────────────────────────────────

fn build_anthropic_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    user_message: &str,
    temperature: f32,
) -> reqwest::RequestBuilder {
    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": MAX_TOKENS,
        "temperature": temperature,
        "system": system_prompt,
        "messages": [
            { "role": "user", "content": user_message },
        ],
    });

    client
        .post(&provider.url)
        .header("x-api-key", &provider.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_anthropic_response(json: &Value) -> Option<String> {
    let blocks = json.get("content").and_then(Value::as_array)?;
    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join(""))
    }
}

// ── OpenAI-compatible ────────────────────────────────────────────

fn build_openai_request(
    client: &reqwest::Client,
    provider: &ResolvedProvider,
    system_prompt: &str,
    user_message: &str,
    temperature: f32,
) -> reqwest::RequestBuilder {
    let body = serde_json::json!({
        "model": provider.model,
        "max_tokens": MAX_TOKENS,
        "temperature": temperature,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_message },
        ],
    });

    client
        .post(&provider.url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .header("content-type", "application/json")
        .json(&body)
}

fn parse_openai_response(json: &Value) -> Option<String> {
    json.get("choices")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
