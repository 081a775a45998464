//! Error taxonomy shared by the core, the model seam and the boundaries.
//! Readiness and validation kinds survive verbatim up to the caller;
//! everything unexpected inside the pipeline collapses into `Translation`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to callers of the translation service.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Caller fault: empty or oversized text. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model artifacts missing or initialization failed.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Model did not become ready within the bound.
    #[error("model not ready after {}s", .0.as_secs_f64())]
    ModelTimeout(Duration),

    /// Unexpected failure while running the pipeline; keeps the cause.
    #[error("translation failed: {0}")]
    Translation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Shutdown was requested; this instance accepts no new work.
    #[error("service is shutting down")]
    ServiceUnavailable,
}

impl TranslateError {
    /// Wrap any error as a pipeline failure.
    pub fn translation<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TranslateError::Translation(cause.into())
    }

    /// HTTP status the boundary answers with for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            TranslateError::InvalidInput(_) => 400,
            TranslateError::ModelLoad(_)
            | TranslateError::ModelTimeout(_)
            | TranslateError::ServiceUnavailable => 503,
            TranslateError::Translation(_) => 500,
        }
    }

    /// Whether a later request against this instance may succeed: a slow
    /// load can finish, a failed one can be reloaded.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslateError::ModelTimeout(_) | TranslateError::ModelLoad(_)
        )
    }
}

/// Errors reported by a model backend.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("required model artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("model initialization failed: {0}")]
    Init(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Text carried by a caught panic, if it was a string.
pub(crate) fn panic_payload(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
