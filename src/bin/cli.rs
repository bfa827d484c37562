use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;

use linalg_agent::chat;
use linalg_agent::eigen::{self, EigenResult};
use linalg_agent::error::AppError;
use linalg_agent::normalize::normalize;
use linalg_agent::settings::{save_settings, SettingsArgs};
use linalg_agent::state::{build_context, AppState};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "linalg-agent-cli", about = "linalg-agent headless CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the assembled generator instructions
    Prompt,
    /// Normalize raw generator output from FILE (or stdin)
    Normalize { file: Option<PathBuf> },
    /// Eigendecomposition of a matrix given as JSON, e.g. "[[0,-1],[1,0]]"
    Eigen { matrix: String },
    /// Send one message through the full chat pipeline
    Chat { message: String },
    /// Write the effective settings (without the API key) to PATH
    InitSettings { path: PathBuf },
}

// ── Output ───────────────────────────────────────────────────────

fn print_output<T: Serialize>(message: &str, data: &T, raw_json: bool) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(data)?;
    if !raw_json {
        println!("{message}");
    }
    println!("{json}");
    Ok(())
}

fn describe_eigen(result: &EigenResult) -> String {
    result
        .eigenvalues
        .iter()
        .map(|value| {
            if value.im() == 0.0 {
                format!("λ = {}", value.re())
            } else {
                format!("λ = {} {:+}i", value.re(), value.im())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_input(file: Option<&PathBuf>) -> Result<String, AppError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = cli.settings.load()?;
    let raw = cli.json;

    match cli.command {
        Commands::Prompt => {
            let context = build_context(&settings, &settings.schema.resolve())?;
            if raw {
                let json = serde_json::json!({
                    "instructions": context.instructions(),
                    "documents": context.documents(),
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("{}", context.instructions());
            }
        }
        Commands::Normalize { file } => {
            let text = read_input(file.as_ref())?;
            let command = normalize(&text, &settings.schema.resolve());
            let message = if command.is_fallback() {
                format!("fallback: {}", command.explanation())
            } else {
                format!("operation: {}", command.operation())
            };
            print_output(&message, &command, raw)?;
        }
        Commands::Eigen { matrix } => {
            let rows: Vec<Vec<f64>> = serde_json::from_str(&matrix)
                .map_err(|e| AppError::invalid_matrix(format!("matrix must be a grid of numbers: {e}")))?;
            let result = eigen::decompose(&rows)?;
            print_output(&describe_eigen(&result), &result, raw)?;
        }
        Commands::Chat { message } => {
            let state = AppState::from_settings(&settings)?;
            let command = chat::respond(&state, &message).await?;
            print_output(&format!("operation: {}", command.operation()), &command, raw)?;
        }
        Commands::InitSettings { path } => {
            save_settings(&path, &settings)?;
            println!("Wrote settings to {}", path.display());
        }
    }
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
