// Shared fixtures for integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indictrans_serve::model::{StubLoader, StubModel};
use indictrans_serve::{ServiceConfig, TranslationService};

/// Small, fast config: no warm-up, short readiness bounds.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        cache_size: 32,
        load_timeout_secs: 5,
        http_ready_timeout_secs: 5,
        workers: 4,
        warmup: false,
        ..ServiceConfig::default()
    }
}

pub struct Harness {
    pub service: Arc<TranslationService>,
    pub loader: Arc<StubLoader>,
    pub model: Arc<StubModel>,
}

/// Service over a stub model; the load is not started.
pub fn harness(model: StubModel) -> Harness {
    harness_with(StubLoader::new(model), test_config())
}

pub fn harness_with(loader: StubLoader, config: ServiceConfig) -> Harness {
    let loader = Arc::new(loader);
    let model = loader.model();
    let service = TranslationService::lazy(&config, Arc::clone(&loader) as Arc<dyn indictrans_serve::model::ModelLoader>)
        .expect("test config is valid");
    Harness {
        service,
        loader,
        model,
    }
}

/// Stub loader that takes `delay` to load.
pub fn slow_loader(delay: Duration) -> StubLoader {
    StubLoader::new(StubModel::new()).with_load_delay(delay)
}

/// Write a model directory with the required artifacts.
pub fn write_model_dir(dir: &Path, vocab: &str) {
    std::fs::write(dir.join("model.pt"), b"weights").expect("write model.pt");
    std::fs::write(dir.join("vocab"), vocab).expect("write vocab");
}
