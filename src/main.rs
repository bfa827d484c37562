use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use linalg_agent::api;
use linalg_agent::error::AppError;
use linalg_agent::settings::{AppSettings, SettingsArgs};
use linalg_agent::state::AppState;

#[derive(Parser)]
#[command(name = "linalg-agent", about = "Linear algebra tutor backend", version)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut settings: AppSettings = cli.settings.load()?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let state = AppState::from_settings(&settings)?;
    let addr = tokio::net::lookup_host((settings.server.host.as_str(), settings.server.port))
        .await?
        .next()
        .ok_or_else(|| AppError::Config {
            message: format!("cannot resolve host {}", settings.server.host),
        })?;

    tracing::info!(
        %addr,
        operations = ?state.schema().operation_names(),
        allow_lean = state.schema().allow_lean,
        documents = state.context().documents().len(),
        provider_configured = state.generator().is_some(),
        "Starting linalg-agent"
    );

    api::serve(Arc::new(state), addr).await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "linalg-agent stopped");
            ExitCode::FAILURE
        }
    }
}
