//! The command contract shared by the normalizer and the visualizer.
//!
//! The set of valid operations is not compiled in: it comes from a
//! [`SchemaConfig`], either one of the [`SchemaPreset`]s or a custom list
//! loaded from settings. Nested records keep any keys they do not know about
//! so that a valid generator object survives normalization field-for-field.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Operation tag of every fallback command. Always accepted by validation.
pub const FALLBACK_OPERATION: &str = "other";

/// Explanation carried by the fallback produced for unparseable output.
pub const PARSE_FAILURE_EXPLANATION: &str = "Model output failed to parse as JSON.";

// ── Command ──────────────────────────────────────────────────────

/// Display switches for the visualizer canvas. Every member is optional on
/// the wire; the visualizer treats a missing switch as `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-export", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-export", ts(export))]
pub struct VisualizationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_grid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_unit_vectors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animate: Option<bool>,
    /// Short caption shown next to the canvas. May be empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    #[schemars(skip)]
    #[cfg_attr(feature = "ts-export", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Proof-exercise payload, only permitted when [`SchemaConfig::allow_lean`] is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-export", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-export", ts(export))]
pub struct LeanContent {
    /// The statement in the explanation language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_cn: Option<String>,
    /// The statement in symbolic notation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_informal: Option<String>,
    /// Lean 4 proof skeleton.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lean_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(flatten)]
    #[schemars(skip)]
    #[cfg_attr(feature = "ts-export", ts(skip))]
    pub extra: Map<String, Value>,
}

/// A validated command, ready to send to the visualizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-export", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-export", ts(export))]
pub struct Command {
    pub operation: String,
    /// Operation-specific inputs (vectors, matrices, topic strings).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts-export", ts(type = "Record<string, unknown> | null"))]
    pub inputs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization_config: Option<VisualizationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lean: Option<LeanContent>,
    pub explanation: String,
    #[serde(flatten)]
    #[schemars(skip)]
    #[cfg_attr(feature = "ts-export", ts(skip))]
    pub extra: Map<String, Value>,
}

/// Degrade-path command for generator output that could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-export", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-export", ts(export))]
pub struct FallbackCommand {
    pub operation: String,
    pub explanation: String,
    /// The generator text exactly as it was received, before fence stripping.
    pub raw_content: String,
}

impl FallbackCommand {
    pub fn parse_failure(raw: &str) -> Self {
        Self {
            operation: FALLBACK_OPERATION.to_string(),
            explanation: PARSE_FAILURE_EXPLANATION.to_string(),
            raw_content: raw.to_string(),
        }
    }

    pub fn schema_violation(raw: &str, violation: &SchemaViolation) -> Self {
        Self {
            operation: FALLBACK_OPERATION.to_string(),
            explanation: format!("Model output did not match the command schema: {violation}"),
            raw_content: raw.to_string(),
        }
    }
}

/// What the normalizer hands back for every generator completion.
/// Serialized untagged: the wire form is the bare command object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Normalized {
    Valid(Command),
    Fallback(FallbackCommand),
}

impl Normalized {
    pub fn operation(&self) -> &str {
        match self {
            Normalized::Valid(cmd) => &cmd.operation,
            Normalized::Fallback(fb) => &fb.operation,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Normalized::Valid(cmd) => &cmd.explanation,
            Normalized::Fallback(fb) => &fb.explanation,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback(_))
    }
}

// ── Schema configuration ─────────────────────────────────────────

/// One entry of the operation catalog offered to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    /// Human-readable description of the expected `inputs` keys.
    #[serde(default)]
    pub inputs: String,
}

impl OperationSpec {
    fn new(name: &str, description: &str, inputs: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            inputs: inputs.to_string(),
        }
    }
}

/// Built-in operation catalogs, one per observed deployment of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPreset {
    /// Plane visualizations only.
    Visualization,
    /// Visualizations with `mat_mul` presented as an SVD walkthrough.
    Svd,
    /// Visualizations plus Lean exercises.
    Proof,
}

/// The operation set and optional-field permissions of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub operations: Vec<OperationSpec>,
    #[serde(default)]
    pub allow_lean: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self::preset(SchemaPreset::Visualization)
    }
}

const MATRIX_INPUT: &str = r#""matrix": [[a, b], [c, d]]"#;

fn visualization_operations(mat_mul: OperationSpec) -> Vec<OperationSpec> {
    vec![
        OperationSpec::new(
            "vector_add",
            "Animate the sum of two vectors placed tip to tail.",
            r#""vectors": [[x1, y1], [x2, y2]]"#,
        ),
        OperationSpec::new(
            "lin_comb",
            "Show a linear combination a*v1 + b*v2 with adjustable coefficients.",
            r#""vectors": [[x1, y1], [x2, y2]], "coefficients": [a, b]"#,
        ),
        mat_mul,
        OperationSpec::new(
            "eigen",
            "Show the eigenvectors of a 2x2 matrix and how the transformation scales them.",
            MATRIX_INPUT,
        ),
        OperationSpec::new(
            "custom_matrix",
            "Load a user-specified matrix into the free-form transformation playground.",
            MATRIX_INPUT,
        ),
        OperationSpec::new(
            FALLBACK_OPERATION,
            "The request matches no visualization; answer in the explanation only.",
            "{}",
        ),
    ]
}

impl SchemaConfig {
    pub fn preset(preset: SchemaPreset) -> Self {
        let plain_mat_mul = OperationSpec::new(
            "mat_mul",
            "Apply a 2x2 matrix as a linear transformation of the plane and of optional vectors.",
            r#""matrix": [[a, b], [c, d]], "vectors": [[x, y], ...] (optional)"#,
        );
        match preset {
            SchemaPreset::Visualization => Self {
                operations: visualization_operations(plain_mat_mul),
                allow_lean: false,
            },
            SchemaPreset::Svd => Self {
                operations: visualization_operations(OperationSpec::new(
                    "mat_mul",
                    "Demonstrate the matrix as the three stages of its singular value \
                     decomposition: rotate by V^T, stretch by the singular values, rotate by U.",
                    MATRIX_INPUT,
                )),
                allow_lean: false,
            },
            SchemaPreset::Proof => {
                let mut operations = visualization_operations(plain_mat_mul);
                operations.extend([
                    OperationSpec::new(
                        "lean_intro",
                        "Introduce the Lean theorem prover and what a formal proof is.",
                        r#""topic": "lean_intro""#,
                    ),
                    OperationSpec::new(
                        "lean_statement",
                        "Pose a Lean exercise: fill `lean` with the statement and a proof \
                         skeleton that ends in `sorry`.",
                        r#""topic": string, "difficulty": "easy" | "medium" | "hard""#,
                    ),
                    OperationSpec::new(
                        "math_problem",
                        "Pose a linear-algebra problem in natural language without Lean code.",
                        r#""topic": string, "context": string"#,
                    ),
                ]);
                Self {
                    operations,
                    allow_lean: true,
                }
            }
        }
    }

    /// Whether `operation` is a member of this deployment's operation set.
    pub fn permits(&self, operation: &str) -> bool {
        operation == FALLBACK_OPERATION || self.operations.iter().any(|op| op.name == operation)
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }

    /// Check a parsed generator object against this schema.
    pub fn validate(&self, value: Value) -> Result<Command, SchemaViolation> {
        if !value.is_object() {
            return Err(SchemaViolation::NotAnObject);
        }
        let command: Command =
            serde_json::from_value(value).map_err(|e| SchemaViolation::Shape(e.to_string()))?;

        if !self.permits(&command.operation) {
            return Err(SchemaViolation::UnknownOperation(command.operation));
        }
        if command.explanation.trim().is_empty() {
            return Err(SchemaViolation::EmptyExplanation);
        }
        if command.lean.is_some() && !self.allow_lean {
            return Err(SchemaViolation::LeanNotPermitted);
        }
        Ok(command)
    }
}

/// Why a well-formed JSON value was rejected as a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("top-level value is not an object")]
    NotAnObject,
    #[error("{0}")]
    Shape(String),
    #[error("unknown operation \"{0}\"")]
    UnknownOperation(String),
    #[error("explanation is empty")]
    EmptyExplanation,
    #[error("the lean field is not enabled for this deployment")]
    LeanNotPermitted,
}
