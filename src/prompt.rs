//! Renders the instruction template sent as the system message.
//!
//! The template describes the command contract of the active
//! [`SchemaConfig`] and leaves [`REFERENCE_PLACEHOLDER`] for the context
//! assembler to fill with reference documents.

use schemars::schema_for;
use serde_json::Value;

use crate::schema::{LeanContent, SchemaConfig, VisualizationConfig, FALLBACK_OPERATION};

/// Marker replaced by the concatenated reference documents.
pub const REFERENCE_PLACEHOLDER: &str = "{reference_material}";

pub const DEFAULT_LANGUAGE: &str = "Simplified Chinese";

fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Build the instruction template for `schema`, asking for explanations in `language`.
pub fn render_template(schema: &SchemaConfig, language: &str) -> String {
    let mut lines = Vec::new();
    lines.push(
        "You are the command agent of an interactive linear-algebra visualizer.".to_string(),
    );
    lines.push(
        "Translate the user's request into exactly one command object for the visualizer."
            .to_string(),
    );
    lines.push(String::new());

    lines.push("## Output format".to_string());
    lines.push("- Reply with a single JSON object and nothing else.".to_string());
    lines.push(
        "- Do not wrap the object in markdown code fences and do not add commentary.".to_string(),
    );
    lines.push(String::new());

    lines.push("## Operations".to_string());
    lines.push("`operation` must be one of:".to_string());
    for op in &schema.operations {
        lines.push(format!("- `{}`: {}", op.name, op.description));
        if !op.inputs.is_empty() {
            lines.push(format!("  inputs: {{ {} }}", op.inputs));
        }
    }
    lines.push(format!(
        "If nothing fits, use `{FALLBACK_OPERATION}` and answer in the explanation."
    ));
    lines.push(String::new());

    lines.push("## Fields".to_string());
    lines.push("- `operation` (string, required)".to_string());
    lines.push("- `inputs` (object): keys depend on the operation, see above.".to_string());
    lines.push(format!(
        "- `visualization_config` (object) with this JSON schema:\n{}",
        pretty(&schema_value::<VisualizationConfig>())
    ));
    if schema.allow_lean {
        lines.push(format!(
            "- `lean` (object, only for proof exercises) with this JSON schema:\n{}",
            pretty(&schema_value::<LeanContent>())
        ));
        lines.push(
            "  `lean_code` must be Lean 4 with Mathlib imports; leave proofs as `sorry`."
                .to_string(),
        );
    } else {
        lines.push("- Never include a `lean` field.".to_string());
    }
    lines.push(format!("- `explanation` (string, required), written in {language}."));
    lines.push(String::new());

    lines.push("## Explanation".to_string());
    lines.push(
        "The explanation must tell the user at least one concrete thing to do with the \
         visualization, such as dragging a vector, changing an entry of the matrix, or \
         toggling the grid. Describing what is shown is not enough."
            .to_string(),
    );
    lines.push(String::new());

    lines.push("## Example".to_string());
    lines.push(pretty(&serde_json::json!({
        "operation": "mat_mul",
        "inputs": { "matrix": [[0, -1], [1, 0]] },
        "visualization_config": {
            "show_grid": true,
            "show_unit_vectors": true,
            "animate": true,
            "comment": "90 degree rotation"
        },
        "explanation": "This matrix rotates the plane by 90 degrees. Drag the red vector and watch its image turn with it."
    })));
    lines.push(String::new());

    lines.push("## Reference material".to_string());
    lines.push(REFERENCE_PLACEHOLDER.to_string());

    lines.join("\n")
}
