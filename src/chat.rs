//! The `/chat` pipeline: check the message, ask the generator, normalize.

use serde_json::Value;

use crate::error::AppError;
use crate::normalize::normalize;
use crate::schema::Normalized;
use crate::state::AppState;
use crate::synth::synthesize;

/// Pull a required, non-blank string field out of a request body.
pub fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str, AppError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::client_input(format!("No {field} provided")))
}

/// Turn one user message into a command.
///
/// Input and credential problems are rejected before the generator is
/// called. Generator failures propagate; unusable generator output does not,
/// it becomes a fallback command.
pub async fn respond(state: &AppState, message: &str) -> Result<Normalized, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::client_input("No message provided"));
    }
    let generator = state.generator().ok_or_else(|| AppError::ProviderUnavailable {
        message: "No API key configured for the text-generation provider".to_string(),
    })?;

    let raw = synthesize(generator, message, state.context().instructions()).await?;
    let command = normalize(&raw, state.schema());
    tracing::info!(operation = command.operation(), fallback = command.is_fallback(), "Chat request answered");
    Ok(command)
}
