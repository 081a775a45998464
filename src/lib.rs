//! indictrans-serve: serving core for a slow-loading Indic translation model.
//! Background model lifecycle, LRU result cache, segment pipeline, and
//! blocking/async/HTTP/CLI entry points.

pub mod cancellation;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod service;
pub mod translate;

pub use config::ServiceConfig;
pub use error::{ConfigError, ModelError, TranslateError};
pub use lifecycle::{ModelLifecycle, ModelPhase};
pub use model::{ModelLoader, TranslationModel};
pub use service::{ServiceState, TranslationService};
pub use translate::{TranslationConfig, TranslationOutcome, TranslationRequest};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Logs go to stderr so CLI output stays clean.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("indictrans_serve=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
