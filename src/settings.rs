use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::DEFAULT_EXTENSIONS;
use crate::error::AppError;
use crate::prompt::DEFAULT_LANGUAGE;
use crate::schema::{SchemaConfig, SchemaPreset};

// ── LLM provider types ──────────────────────────────────────────

/// Which chat-completion API the generator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, clap::ValueEnum)]
pub enum LlmProvider {
    OpenAiCompatible,
    Anthropic,
}

/// Full configuration for the chosen LLM provider.
///
/// The `api_key` field is never written to the settings file. It comes from
/// the environment or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL for OpenAI-compatible providers (ignored for Anthropic).
    pub base_url: Option<String>,
    /// Model override. None = use provider default.
    pub model: Option<String>,
    pub temperature: f32,
    /// Upper bound on one provider round trip, in seconds.
    pub timeout_secs: u64,
}

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAiCompatible,
            api_key: None,
            base_url: None,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmProviderConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// Redacted view of the LLM config, safe to log (no raw API key).
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfigInfo {
    pub provider: LlmProvider,
    pub has_api_key: bool,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl LlmConfigInfo {
    #[must_use]
    pub fn from_config(config: &LlmProviderConfig) -> Self {
        Self {
            provider: config.provider,
            has_api_key: config.has_api_key(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ── Other sections ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Where the instruction context comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Directory of reference documents folded into the instructions.
    pub docs_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
    /// Replaces the rendered template when set.
    pub template_path: Option<PathBuf>,
    /// Language the generator writes explanations in.
    pub language: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            docs_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            template_path: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Either a preset name (`"proof"`) or a full operation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    Preset(SchemaPreset),
    Custom(SchemaConfig),
}

impl Default for SchemaSource {
    fn default() -> Self {
        SchemaSource::Preset(SchemaPreset::Visualization)
    }
}

impl SchemaSource {
    pub fn resolve(&self) -> SchemaConfig {
        match self {
            SchemaSource::Preset(preset) => SchemaConfig::preset(*preset),
            SchemaSource::Custom(config) => config.clone(),
        }
    }
}

// ── App settings ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: u32,
    pub server: ServerSettings,
    pub llm: LlmProviderConfig,
    pub context: ContextSettings,
    pub schema: SchemaSource,
}

const SETTINGS_VERSION: u32 = 1;

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            server: ServerSettings::default(),
            llm: LlmProviderConfig::default(),
            context: ContextSettings::default(),
            schema: SchemaSource::default(),
        }
    }
}

/// Load settings from a JSON file. Missing sections take their defaults.
pub fn load_settings(path: &Path) -> Result<AppSettings, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        message: format!("cannot read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&text).map_err(|e| AppError::Config {
        message: format!("invalid settings in {}: {e}", path.display()),
    })
}

/// Write settings as pretty JSON. The API key is never written.
pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}

// ── Command-line overrides ───────────────────────────────────────

/// Settings flags shared by the server and the CLI tool.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SettingsArgs {
    /// JSON settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Provider API key
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true, value_enum)]
    pub provider: Option<LlmProvider>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Provider timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Reference document directory
    #[arg(long, global = true)]
    pub docs_dir: Option<PathBuf>,

    /// Operation catalog preset
    #[arg(long, global = true, value_enum)]
    pub schema: Option<SchemaPreset>,

    /// Explanation language
    #[arg(long, global = true)]
    pub language: Option<String>,
}

impl SettingsArgs {
    /// Load the settings file (or defaults) and apply command-line overrides.
    pub fn load(&self) -> Result<AppSettings, AppError> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => AppSettings::default(),
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut AppSettings) {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            settings.llm.api_key = Some(key.clone());
        }
        if let Some(provider) = self.provider {
            settings.llm.provider = provider;
        }
        if let Some(model) = &self.model {
            settings.llm.model = Some(model.clone());
        }
        if let Some(base_url) = &self.base_url {
            settings.llm.base_url = Some(base_url.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            settings.llm.timeout_secs = timeout;
        }
        if let Some(dir) = &self.docs_dir {
            settings.context.docs_dir = Some(dir.clone());
        }
        if let Some(preset) = self.schema {
            settings.schema = SchemaSource::Preset(preset);
        }
        if let Some(language) = &self.language {
            settings.context.language = language.clone();
        }
    }
}
