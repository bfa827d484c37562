use std::sync::Arc;

use crate::context::{self, PromptContext};
use crate::error::AppError;
use crate::prompt;
use crate::schema::SchemaConfig;
use crate::settings::{AppSettings, LlmConfigInfo};
use crate::synth::{Generator, HttpGenerator};

// ── Application State ──────────────────────────────────────────────

/// State shared by every request handler. Built once at startup and never
/// mutated afterwards, so handlers read it without locking.
pub struct AppState {
    schema: SchemaConfig,
    context: Arc<PromptContext>,
    /// `None` when no provider credential is configured.
    generator: Option<Arc<dyn Generator>>,
}

impl AppState {
    pub fn new(
        schema: SchemaConfig,
        context: PromptContext,
        generator: Option<Arc<dyn Generator>>,
    ) -> Self {
        Self {
            schema,
            context: Arc::new(context),
            generator,
        }
    }

    /// Resolve the schema, assemble the instruction context, and connect the
    /// generator. A missing credential is not an error: `/chat` is disabled
    /// and everything else keeps working.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, AppError> {
        let schema = settings.schema.resolve();
        let context = build_context(settings, &schema)?;

        let generator: Option<Arc<dyn Generator>> = match HttpGenerator::from_config(&settings.llm) {
            Ok(generator) => {
                tracing::info!(llm = ?LlmConfigInfo::from_config(&settings.llm), model = generator.model(), "Text generator configured");
                Some(Arc::new(generator))
            }
            Err(AppError::ProviderUnavailable { message }) => {
                tracing::warn!(%message, "Text generator not configured, /chat will answer 500");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(schema, context, generator))
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn context(&self) -> &PromptContext {
        &self.context
    }

    pub fn generator(&self) -> Option<&dyn Generator> {
        self.generator.as_deref()
    }
}

/// Render (or read) the template and fold in the reference documents.
pub fn build_context(settings: &AppSettings, schema: &SchemaConfig) -> Result<PromptContext, AppError> {
    let template = match &settings.context.template_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("cannot read template {}: {e}", path.display()),
        })?,
        None => prompt::render_template(schema, &settings.context.language),
    };
    Ok(context::assemble(
        &template,
        settings.context.docs_dir.as_deref(),
        &settings.context.extensions,
    ))
}
