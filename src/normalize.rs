//! Response normalization: generator text in, command out.
//!
//! [`normalize`] never fails. Text that is not a JSON object, or an object
//! that breaks the [`SchemaConfig`], comes back as a [`FallbackCommand`]
//! carrying the text exactly as received.

use serde_json::Value;

use crate::schema::{FallbackCommand, Normalized, SchemaConfig};

const FENCE: &str = "```";

/// Remove a markdown code fence wrapped around the whole text.
///
/// Only applies when the (trimmed) text starts with a fence. The opening
/// fence may carry a language tag such as `json`; the closing fence is
/// removed when present.
pub fn strip_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let (_tag, body) = rest.split_at(tag_len);
    let body = body.trim_end();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Turn raw generator output into a command for the visualizer.
pub fn normalize(raw: &str, schema: &SchemaConfig) -> Normalized {
    let text = strip_fences(raw);

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, raw = %raw, "Generator output is not valid JSON, returning fallback");
            return Normalized::Fallback(FallbackCommand::parse_failure(raw));
        }
    };

    match schema.validate(value) {
        Ok(command) => Normalized::Valid(command),
        Err(violation) => {
            tracing::warn!(%violation, raw = %raw, "Generator output violates the command schema, returning fallback");
            Normalized::Fallback(FallbackCommand::schema_violation(raw, &violation))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use crate::schema::{SchemaPreset, FALLBACK_OPERATION, PARSE_FAILURE_EXPLANATION};
    use serde_json::json;

    fn rotation() -> Value {
        json!({
            "operation": "mat_mul",
            "inputs": { "matrix": [[0, -1], [1, 0]] },
            "visualization_config": { "show_grid": true, "comment": "rotation" },
            "explanation": "Drag the red vector and watch its image rotate."
        })
    }

    fn valid(normalized: Normalized) -> Value {
        match normalized {
            Normalized::Valid(cmd) => serde_json::to_value(cmd).unwrap(),
            Normalized::Fallback(fb) => panic!("unexpected fallback: {fb:?}"),
        }
    }

    #[test]
    fn test_strip_fences_variants() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```JSON\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_fences("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_fences("```"), "");
    }

    #[test]
    fn test_unfenced_text_with_inner_fence_is_untouched() {
        let text = "Here you go:\n```json\n{}\n```";
        assert_eq!(strip_fences(text), text);
    }

    #[test]
    fn test_valid_object_is_returned_field_for_field() {
        let schema = SchemaConfig::default();
        let raw = rotation().to_string();
        assert_eq!(valid(normalize(&raw, &schema)), rotation());
    }

    #[test]
    fn test_null_optional_fields_are_dropped() {
        let raw = json!({
            "operation": "vector_add",
            "inputs": null,
            "visualization_config": { "show_grid": true, "comment": null },
            "lean": null,
            "explanation": "Place the second vector at the tip of the first."
        })
        .to_string();
        assert_eq!(
            valid(normalize(&raw, &SchemaConfig::default())),
            json!({
                "operation": "vector_add",
                "visualization_config": { "show_grid": true },
                "explanation": "Place the second vector at the tip of the first."
            })
        );
    }

    #[test]
    fn test_fenced_and_unfenced_normalize_identically() {
        let schema = SchemaConfig::default();
        let inner = serde_json::to_string_pretty(&rotation()).unwrap();
        for wrapped in [
            format!("```json\n{inner}\n```"),
            format!("```\n{inner}\n```"),
            format!("\n```json\n{inner}\n```\n"),
        ] {
            assert_eq!(normalize(&wrapped, &schema), normalize(&inner, &schema));
        }
    }

    #[test]
    fn test_invalid_json_yields_fallback_with_original_text() {
        let schema = SchemaConfig::default();
        for raw in [
            "Sure! Here is a rotation matrix.",
            "```json\n{\"operation\": \"mat_mul\",\n```",
            "{'operation': 'eigen'}",
            "",
        ] {
            match normalize(raw, &schema) {
                Normalized::Fallback(fb) => {
                    assert_eq!(fb.operation, FALLBACK_OPERATION);
                    assert_eq!(fb.explanation, PARSE_FAILURE_EXPLANATION);
                    assert_eq!(fb.raw_content, raw);
                }
                Normalized::Valid(cmd) => panic!("expected fallback, got {cmd:?}"),
            }
        }
    }

    #[test]
    fn test_schema_violation_yields_fallback_shape() {
        let schema = SchemaConfig::default();
        let raw = "```json\n{\"operation\": \"draw_cat\", \"explanation\": \"meow\"}\n```";
        match normalize(raw, &schema) {
            Normalized::Fallback(fb) => {
                assert_eq!(fb.operation, FALLBACK_OPERATION);
                assert!(fb.explanation.contains("draw_cat"));
                assert_eq!(fb.raw_content, raw);
            }
            Normalized::Valid(cmd) => panic!("expected fallback, got {cmd:?}"),
        }
    }

    #[test]
    fn test_json_scalar_is_a_schema_violation_not_a_parse_failure() {
        let normalized = normalize("42", &SchemaConfig::default());
        assert!(normalized.is_fallback());
        assert_ne!(normalized.explanation(), PARSE_FAILURE_EXPLANATION);
    }

    #[test]
    fn test_lean_payload_follows_deployment() {
        let raw = json!({
            "operation": "lean_intro",
            "inputs": { "topic": "lean_intro" },
            "visualization_config": { "comment": "" },
            "lean": {
                "statement_cn": "Lean 是一个交互式定理证明器",
                "statement_informal": "",
                "lean_code": "",
                "hint": ""
            },
            "explanation": "Open the Lean panel and run the first example."
        })
        .to_string();

        let proof = normalize(&raw, &SchemaConfig::preset(SchemaPreset::Proof));
        assert_eq!(proof.operation(), "lean_intro");
        assert!(!proof.is_fallback());

        let visual = normalize(&raw, &SchemaConfig::default());
        assert!(visual.is_fallback());
    }

    #[test]
    fn test_generator_may_choose_other() {
        let raw = r#"{"operation": "other", "explanation": "Try asking about a matrix."}"#;
        let normalized = normalize(raw, &SchemaConfig::default());
        assert!(!normalized.is_fallback());
        assert_eq!(normalized.operation(), "other");
    }
}
