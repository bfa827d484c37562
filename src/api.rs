use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat;
use crate::eigen;
use crate::error::AppError;
use crate::proof;
use crate::state::AppState;

pub const LIVENESS_MESSAGE: &str = "Neuro-Symbolic Linear Algebra Backend is Running!";

// ── Response types ───────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErr {
    error: String,
    code: &'static str,
}

fn ok_json<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

fn err_json(e: &AppError) -> Response {
    let body = ApiErr {
        error: e.to_string(),
        code: e.code(),
    };
    (e.status(), Json(body)).into_response()
}

/// Unwrap a JSON body, turning axum's plain-text rejection into our error body.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::client_input(rejection.body_text()))
}

fn respond<T: Serialize>(result: Result<T, AppError>) -> Response {
    match result {
        Ok(data) => ok_json(data),
        Err(e) => err_json(&e),
    }
}

// ── Handlers ─────────────────────────────────────────────────────

async fn get_root() -> &'static str {
    LIVENESS_MESSAGE
}

async fn post_chat(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(e) => return err_json(&e),
    };
    let message = match chat::required_str(&body, "message") {
        Ok(message) => message,
        Err(e) => return err_json(&e),
    };
    respond(chat::respond(&state, message).await)
}

/// Absent, `null`, or empty `matrix` is a client error. Anything else that
/// is not a square numeric grid is an `InvalidMatrix`.
fn matrix_from_body(body: &Value) -> Result<Vec<Vec<f64>>, AppError> {
    let missing = match body.get("matrix") {
        None | Some(Value::Null) => true,
        Some(Value::Array(rows)) => rows.is_empty(),
        Some(_) => false,
    };
    if missing {
        return Err(AppError::client_input("No matrix provided"));
    }
    let raw = body.get("matrix").cloned().unwrap_or(Value::Null);
    serde_json::from_value(raw)
        .map_err(|e| AppError::invalid_matrix(format!("matrix must be a grid of numbers: {e}")))
}

async fn post_eigen(body: Result<Json<Value>, JsonRejection>) -> Response {
    let result = json_body(body)
        .and_then(|body| matrix_from_body(&body))
        .and_then(|rows| eigen::decompose(&rows));
    if let Err(e) = &result {
        tracing::warn!(code = e.code(), error = %e, "Eigendecomposition request rejected");
    }
    respond(result)
}

// The proof stubs answer 200 whatever arrives; an unreadable body reads as `{}`.
async fn post_formalize(body: Result<Json<Value>, JsonRejection>) -> Response {
    let body = json_body(body).unwrap_or_default();
    let problem = body.get("problem").and_then(Value::as_str).unwrap_or_default();
    ok_json(proof::formalize(problem))
}

async fn post_verify(body: Result<Json<Value>, JsonRejection>) -> Response {
    let body = json_body(body).unwrap_or_default();
    let code = body.get("code").and_then(Value::as_str).unwrap_or_default();
    ok_json(proof::verify(code))
}

// ── Server startup ───────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/chat", post(post_chat))
        .route("/api/eigen", post(post_eigen))
        .route("/api/formalize", post(post_formalize))
        .route("/api/verify", post(post_verify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| AppError::Io {
        message: format!("Failed to bind {addr}: {e}"),
    })?;
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| AppError::Io {
            message: format!("HTTP server error: {e}"),
        })
}
