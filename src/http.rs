//! HTTP API over `TranslationService`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::TranslateError;
use crate::service::TranslationService;
use crate::translate::{DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

impl IntoResponse for TranslateError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_source")]
    pub source_lang: String,
    #[serde(default = "default_target")]
    pub target_lang: String,
}

fn default_source() -> String {
    DEFAULT_SOURCE_LANG.to_string()
}

fn default_target() -> String {
    DEFAULT_TARGET_LANG.to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateReply {
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub time_ms: f64,
}

pub fn router(service: Arc<TranslationService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/translate", post(translate))
        .route("/metrics", get(metrics))
        .route("/reload", post(reload))
        .with_state(service)
}

async fn health(State(service): State<Arc<TranslationService>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "initialized": service.is_initialized(),
    }))
}

async fn translate(
    State(service): State<Arc<TranslationService>>,
    body: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateReply>, Response> {
    let Json(body) = body.map_err(|rejection| {
        error_response(StatusCode::BAD_REQUEST, rejection.body_text()).into_response()
    })?;

    let text = match body.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return Err(
                error_response(StatusCode::BAD_REQUEST, "No text provided").into_response(),
            )
        }
    };

    let request = service.request(text, body.source_lang.clone(), body.target_lang.clone());
    let outcome = service
        .translate_async_with_timeout(request, service.http_ready_timeout())
        .await
        .map_err(|e| {
            warn!(error = %e, status = e.status_code(), "translate request failed");
            e.into_response()
        })?;

    Ok(Json(TranslateReply {
        translated_text: outcome.translated_text,
        source_lang: body.source_lang,
        target_lang: body.target_lang,
        time_ms: outcome.elapsed_ms,
    }))
}

async fn metrics(State(service): State<Arc<TranslationService>>) -> Json<serde_json::Value> {
    Json(json!({
        "phase": service.state().phase,
        "cache": service.cache().stats(),
        "latency": service.metrics().summary(),
    }))
}

async fn reload(State(service): State<Arc<TranslationService>>) -> Result<ApiError, Response> {
    let phase = service.reload().map_err(IntoResponse::into_response)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "phase": phase }))))
}

/// Serve until Ctrl-C, SIGTERM or a programmatic shutdown, then release
/// the model.
pub async fn serve(service: Arc<TranslationService>, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "http server listening");

    let signal = service.shutdown_signal().clone();
    let app = router(Arc::clone(&service));
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = os_signal() => info!("termination signal received"),
                _ = signal.requested() => {}
            }
        })
        .await;

    service.shutdown();
    info!("http server stopped");
    result
}

async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
