//! Service boundary shared by the CLI and the HTTP server: a blocking call
//! and a non-blocking call over the same `TranslationCore`, plus shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cancellation::ShutdownSignal;
use crate::config::ServiceConfig;
use crate::error::{ConfigError, TranslateError};
use crate::lifecycle::{ModelLifecycle, ModelPhase};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::model::ModelLoader;
use crate::orchestrator::TranslationCore;
use crate::translate::cache::ResultCache;
use crate::translate::normalize::Segmenter;
use crate::translate::pipeline::RequestPipeline;
use crate::translate::{TranslationConfig, TranslationOutcome, TranslationRequest};

/// Process-wide state snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceState {
    pub phase: ModelPhase,
    /// Unix millis of the last request that reached the model.
    pub last_used_ms: Option<u64>,
    pub shutdown_requested: bool,
}

pub struct TranslationService {
    core: Arc<TranslationCore>,
    lifecycle: Arc<ModelLifecycle>,
    shutdown: ShutdownSignal,
    workers: Arc<Semaphore>,
    load_timeout: Duration,
    http_ready_timeout: Duration,
    default_config: TranslationConfig,
}

impl TranslationService {
    /// Build the service and start loading the model in the background.
    /// Returns as soon as the loader thread is spawned.
    pub fn start(
        config: &ServiceConfig,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::lazy(config, loader).map(|service| {
            if let Err(e) = service.lifecycle.start() {
                warn!(error = %e, "model load not started");
            }
            service
        })
    }

    /// Build the service without starting the load; the first cache miss
    /// triggers it instead.
    pub fn lazy(
        config: &ServiceConfig,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::build(config, loader, RequestPipeline::default())
    }

    /// Same as `lazy` with a custom segmenter.
    pub fn lazy_with_segmenter(
        config: &ServiceConfig,
        loader: Arc<dyn ModelLoader>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::build(config, loader, RequestPipeline::new(segmenter))
    }

    fn build(
        config: &ServiceConfig,
        loader: Arc<dyn ModelLoader>,
        pipeline: RequestPipeline,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let metrics = Arc::new(MetricsRegistry::new());
        let shutdown = ShutdownSignal::new();
        let cache = Arc::new(ResultCache::new(config.cache_size));
        let lifecycle = ModelLifecycle::new(
            config.model_dir.clone(),
            loader,
            config.load_timeout(),
            config.warmup,
            Arc::clone(&metrics),
        );
        let core = Arc::new(TranslationCore::new(
            cache,
            Arc::clone(&lifecycle),
            pipeline,
            shutdown.clone(),
            metrics,
            config.max_input_length,
        ));

        info!(
            model_dir = %config.model_dir.display(),
            cache_size = config.cache_size,
            workers = config.workers,
            load_timeout_secs = config.load_timeout_secs,
            "translation service created"
        );

        Ok(Arc::new(Self {
            core,
            lifecycle,
            shutdown,
            workers: Arc::new(Semaphore::new(config.workers)),
            load_timeout: config.load_timeout(),
            http_ready_timeout: config.http_ready_timeout(),
            default_config: config.translation_config(),
        }))
    }

    /// Request with the service's default decoding settings.
    pub fn request(
        &self,
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> TranslationRequest {
        TranslationRequest::new(text, source_lang, target_lang)
            .with_config(self.default_config.clone())
    }

    /// Blocking translate. Waits up to the load timeout for the model.
    pub fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationOutcome, TranslateError> {
        self.core.translate(request, self.load_timeout)
    }

    /// Non-blocking translate: runs the blocking call on a worker.
    pub async fn translate_async(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationOutcome, TranslateError> {
        self.translate_async_with_timeout(request, self.load_timeout)
            .await
    }

    /// Non-blocking translate with an explicit readiness bound. Cache hits
    /// are answered inline without queueing for a worker.
    pub async fn translate_async_with_timeout(
        &self,
        request: TranslationRequest,
        ready_timeout: Duration,
    ) -> Result<TranslationOutcome, TranslateError> {
        if let Some(hit) = self.core.lookup(&request)? {
            return Ok(hit);
        }

        let queued = Instant::now();
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| TranslateError::ServiceUnavailable)?;
        self.core.metrics().record(
            metric_names::WORKER_QUEUE_WAIT,
            queued.elapsed().as_micros() as f64,
        );

        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            core.translate_uncached(&request, ready_timeout)
        })
        .await
        .map_err(TranslateError::translation)?
    }

    /// Readiness bound used by the HTTP boundary.
    pub fn http_ready_timeout(&self) -> Duration {
        self.http_ready_timeout
    }

    pub fn state(&self) -> ServiceState {
        ServiceState {
            phase: self.lifecycle.phase(),
            last_used_ms: self.core.last_used_ms(),
            shutdown_requested: self.shutdown.is_requested(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Retry a failed model load.
    pub fn reload(&self) -> Result<ModelPhase, TranslateError> {
        if self.shutdown.is_requested() {
            return Err(TranslateError::ServiceUnavailable);
        }
        self.lifecycle.reload()
    }

    /// Stop accepting work and release the model. Safe to call repeatedly
    /// and while translations are in flight.
    pub fn shutdown(&self) {
        if self.shutdown.request() {
            info!("shutdown requested, releasing model");
            self.workers.close();
        }
        self.lifecycle.cleanup();
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn core(&self) -> &Arc<TranslationCore> {
        &self.core
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        self.core.cache()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        self.core.metrics()
    }
}
