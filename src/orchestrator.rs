//! Per-request orchestration:
//! validating → cache-lookup → awaiting-model → translating → caching-result → done.
//! The cache is consulted before any wait on model readiness.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info_span, warn};

use crate::cancellation::ShutdownSignal;
use crate::error::{panic_payload, TranslateError};
use crate::lifecycle::ModelLifecycle;
use crate::metrics::{metric_names, new_request_id, MetricsRegistry};
use crate::translate::cache::{CacheKey, ResultCache};
use crate::translate::pipeline::RequestPipeline;
use crate::translate::{TranslationOutcome, TranslationRequest};

pub struct TranslationCore {
    cache: Arc<ResultCache>,
    lifecycle: Arc<ModelLifecycle>,
    pipeline: RequestPipeline,
    shutdown: ShutdownSignal,
    metrics: Arc<MetricsRegistry>,
    max_input_length: usize,
    /// Unix millis of the last request that reached the model; 0 = never.
    last_used_ms: AtomicU64,
}

impl TranslationCore {
    pub fn new(
        cache: Arc<ResultCache>,
        lifecycle: Arc<ModelLifecycle>,
        pipeline: RequestPipeline,
        shutdown: ShutdownSignal,
        metrics: Arc<MetricsRegistry>,
        max_input_length: usize,
    ) -> Self {
        Self {
            cache,
            lifecycle,
            pipeline,
            shutdown,
            metrics,
            max_input_length,
            last_used_ms: AtomicU64::new(0),
        }
    }

    /// Run one request. `ready_timeout` bounds the wait for the model on a
    /// cache miss.
    pub fn translate(
        &self,
        request: &TranslationRequest,
        ready_timeout: Duration,
    ) -> Result<TranslationOutcome, TranslateError> {
        match self.lookup(request)? {
            Some(hit) => Ok(hit),
            None => self.translate_uncached(request, ready_timeout),
        }
    }

    /// Cache-only half of `translate`: shutdown check, validation and the
    /// lookup. Never waits on the model, so callers can run it before
    /// queueing for a worker. `Ok(None)` is a miss.
    pub fn lookup(
        &self,
        request: &TranslationRequest,
    ) -> Result<Option<TranslationOutcome>, TranslateError> {
        self.admit(request)?;
        let started = Instant::now();
        let key = cache_key(request);
        Ok(self.cache.get(&key).map(|hit| {
            debug!(key = %key, "cache hit");
            self.metrics
                .record(metric_names::CACHE_HIT, started.elapsed().as_micros() as f64);
            TranslationOutcome {
                translated_text: hit,
                cached: true,
                elapsed_ms: elapsed_ms(started),
            }
        }))
    }

    /// Model half of `translate`, for a request whose lookup missed.
    /// Waits for readiness, runs the pipeline and fills the cache.
    pub fn translate_uncached(
        &self,
        request: &TranslationRequest,
        ready_timeout: Duration,
    ) -> Result<TranslationOutcome, TranslateError> {
        self.admit(request)?;

        let request_id = new_request_id();
        let span = info_span!(
            "translate",
            request_id = %request_id,
            src = request.source_lang(),
            tgt = request.target_lang()
        );
        let _enter = span.enter();

        let started = Instant::now();
        let total = self.metrics.span(metric_names::TRANSLATE_TOTAL);

        let wait = self.metrics.span(metric_names::MODEL_WAIT);
        let model = self.lifecycle.ensure_ready(ready_timeout)?;
        wait.finish();
        self.touch();

        let pipeline_span = self.metrics.span(metric_names::PIPELINE);
        let translated = catch_unwind(AssertUnwindSafe(|| self.pipeline.run(model.as_ref(), request)))
            .unwrap_or_else(|panic| {
                Err(TranslateError::translation(format!(
                    "model panicked: {}",
                    panic_payload(&*panic)
                )))
            })
            .inspect_err(|e| warn!(error = %e, "pipeline failed"))?;
        pipeline_span.finish();

        if translated.is_empty() {
            debug!("no segments after preprocessing");
        } else {
            self.cache.put(cache_key(request), translated.clone());
        }
        total.finish();

        Ok(TranslationOutcome {
            translated_text: translated,
            cached: false,
            elapsed_ms: elapsed_ms(started),
        })
    }

    fn admit(&self, request: &TranslationRequest) -> Result<(), TranslateError> {
        if self.shutdown.is_requested() {
            return Err(TranslateError::ServiceUnavailable);
        }
        self.validate(request)
    }

    fn validate(&self, request: &TranslationRequest) -> Result<(), TranslateError> {
        if request.text().trim().is_empty() {
            return Err(TranslateError::InvalidInput("input text cannot be empty".into()));
        }
        let chars = request.text().chars().count();
        if chars > self.max_input_length {
            return Err(TranslateError::InvalidInput(format!(
                "input text exceeds maximum length of {} characters (got {chars})",
                self.max_input_length
            )));
        }
        Ok(())
    }

    fn touch(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_used_ms.store(now, Ordering::Relaxed);
    }

    /// Unix millis of the last request that reached the model.
    pub fn last_used_ms(&self) -> Option<u64> {
        match self.last_used_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn lifecycle(&self) -> &Arc<ModelLifecycle> {
        &self.lifecycle
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }
}

fn cache_key(request: &TranslationRequest) -> CacheKey {
    CacheKey::fingerprint(request.source_lang(), request.target_lang(), request.text())
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
