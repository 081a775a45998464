//! Model lifecycle: Unloaded → Loading → Ready | Failed, then ShutDown.
//! One load in flight at a time, run on a dedicated thread. Waiters block
//! on a condvar with a deadline instead of polling.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{panic_payload, ModelError, TranslateError};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::model::{ModelLoader, TranslationModel};
use crate::translate::TranslationConfig;

/// Representative sentences run once after a successful load.
pub const WARMUP_SAMPLES: [(&str, &str, &str); 3] = [
    ("Hello, how are you?", "en", "hi"),
    ("This is a test.", "en", "hi"),
    ("नमस्ते, आप कैसे हैं?", "hi", "en"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPhase {
    Unloaded,
    Loading,
    Ready,
    Failed,
    ShutDown,
}

impl std::fmt::Display for ModelPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelPhase::Unloaded => write!(f, "Unloaded"),
            ModelPhase::Loading => write!(f, "Loading"),
            ModelPhase::Ready => write!(f, "Ready"),
            ModelPhase::Failed => write!(f, "Failed"),
            ModelPhase::ShutDown => write!(f, "ShutDown"),
        }
    }
}

impl ModelPhase {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: ModelPhase) -> bool {
        matches!(
            (self, next),
            (ModelPhase::Unloaded, ModelPhase::Loading)
                | (ModelPhase::Loading, ModelPhase::Ready)
                | (ModelPhase::Loading, ModelPhase::Failed)
                | (ModelPhase::Failed, ModelPhase::Unloaded) // explicit reload
                | (ModelPhase::Unloaded, ModelPhase::ShutDown)
                | (ModelPhase::Loading, ModelPhase::ShutDown)
                | (ModelPhase::Ready, ModelPhase::ShutDown)
                | (ModelPhase::Failed, ModelPhase::ShutDown)
        )
    }
}

/// Why the last load attempt failed. Kept so later callers get the same
/// answer without triggering another load.
#[derive(Debug, Clone)]
enum LoadFailure {
    Model(ModelError),
    TimedOut(Duration),
    Spawn(String),
}

impl From<&LoadFailure> for TranslateError {
    fn from(failure: &LoadFailure) -> Self {
        match failure {
            LoadFailure::Model(e) => TranslateError::ModelLoad(e.to_string()),
            LoadFailure::TimedOut(limit) => TranslateError::ModelTimeout(*limit),
            LoadFailure::Spawn(msg) => TranslateError::ModelLoad(msg.clone()),
        }
    }
}

struct LifecycleState {
    phase: ModelPhase,
    model: Option<Arc<dyn TranslationModel>>,
    failure: Option<LoadFailure>,
    /// Bumped on every load start and on shutdown; a loader thread whose
    /// attempt no longer matches discards its result.
    attempt: u64,
    load_started: Option<Instant>,
}

pub struct ModelLifecycle {
    model_dir: PathBuf,
    loader: Arc<dyn ModelLoader>,
    load_timeout: Duration,
    warmup: bool,
    metrics: Arc<MetricsRegistry>,
    state: Mutex<LifecycleState>,
    changed: Condvar,
}

impl ModelLifecycle {
    pub fn new(
        model_dir: PathBuf,
        loader: Arc<dyn ModelLoader>,
        load_timeout: Duration,
        warmup: bool,
        metrics: Arc<MetricsRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            model_dir,
            loader,
            load_timeout,
            warmup,
            metrics,
            state: Mutex::new(LifecycleState {
                phase: ModelPhase::Unloaded,
                model: None,
                failure: None,
                attempt: 0,
                load_started: None,
            }),
            changed: Condvar::new(),
        })
    }

    pub fn phase(&self) -> ModelPhase {
        self.state.lock().phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == ModelPhase::Ready
    }

    /// Begin loading in the background if nothing has been attempted yet.
    /// Never blocks on the load itself.
    pub fn start(self: &Arc<Self>) -> Result<ModelPhase, TranslateError> {
        let mut st = self.state.lock();
        match st.phase {
            ModelPhase::Unloaded => {
                self.begin_load(&mut st);
                Ok(st.phase)
            }
            ModelPhase::ShutDown => Err(TranslateError::ServiceUnavailable),
            phase => Ok(phase),
        }
    }

    /// Re-arm after a failed load and start a fresh attempt. Does nothing
    /// while a load is running or the model is ready.
    pub fn reload(self: &Arc<Self>) -> Result<ModelPhase, TranslateError> {
        let mut st = self.state.lock();
        match st.phase {
            ModelPhase::Failed => {
                info!(model_dir = %self.model_dir.display(), "reload requested after failed load");
                st.failure = None;
                self.transition(&mut st, ModelPhase::Unloaded);
                self.begin_load(&mut st);
                Ok(st.phase)
            }
            ModelPhase::Unloaded => {
                self.begin_load(&mut st);
                Ok(st.phase)
            }
            ModelPhase::ShutDown => Err(TranslateError::ServiceUnavailable),
            phase => Ok(phase),
        }
    }

    /// Wait until the model is ready and hand out a reference to it.
    /// Starts a load if none has been attempted. Gives up after `timeout`
    /// or once the current load has run past the load timeout.
    pub fn ensure_ready(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Result<Arc<dyn TranslationModel>, TranslateError> {
        // `None` means the bound is too large to represent: no deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut st = self.state.lock();
        loop {
            match st.phase {
                ModelPhase::Ready => {
                    return st.model.clone().ok_or_else(|| {
                        TranslateError::ModelLoad("ready without a model handle".into())
                    });
                }
                ModelPhase::Failed => {
                    return Err(st
                        .failure
                        .as_ref()
                        .map(TranslateError::from)
                        .unwrap_or_else(|| TranslateError::ModelLoad("unknown failure".into())));
                }
                ModelPhase::ShutDown => return Err(TranslateError::ServiceUnavailable),
                ModelPhase::Unloaded => self.begin_load(&mut st),
                ModelPhase::Loading => {
                    let now = Instant::now();
                    let load_deadline = st
                        .load_started
                        .unwrap_or(now)
                        .checked_add(self.load_timeout);
                    if load_deadline.is_some_and(|d| now >= d) {
                        warn!(
                            timeout_secs = self.load_timeout.as_secs_f64(),
                            "model load exceeded its timeout"
                        );
                        st.failure = Some(LoadFailure::TimedOut(self.load_timeout));
                        self.transition(&mut st, ModelPhase::Failed);
                        self.changed.notify_all();
                        return Err(TranslateError::ModelTimeout(self.load_timeout));
                    }
                    if deadline.is_some_and(|d| now >= d) {
                        return Err(TranslateError::ModelTimeout(timeout));
                    }
                    match earliest(deadline, load_deadline) {
                        Some(wake) => {
                            self.changed.wait_until(&mut st, wake);
                        }
                        None => self.changed.wait(&mut st),
                    }
                }
            }
        }
    }

    /// Release the model and refuse further readiness requests.
    /// Idempotent. Requests already holding a handle finish normally.
    pub fn cleanup(&self) {
        let released = {
            let mut st = self.state.lock();
            if st.phase == ModelPhase::ShutDown {
                return;
            }
            st.attempt += 1;
            self.transition(&mut st, ModelPhase::ShutDown);
            self.changed.notify_all();
            st.model.take()
        };
        let had_model = released.is_some();
        drop(released);
        info!(had_model, "model lifecycle cleaned up");
    }

    fn transition(&self, st: &mut LifecycleState, next: ModelPhase) {
        let current = st.phase;
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "invalid model phase transition ignored");
            return;
        }
        st.phase = next;
        info!(from = %current, to = %next, "model_phase_transition");
    }

    /// Caller holds the lock and has checked the phase is Unloaded.
    fn begin_load(self: &Arc<Self>, st: &mut LifecycleState) {
        self.transition(st, ModelPhase::Loading);
        st.attempt += 1;
        st.load_started = Some(Instant::now());
        let attempt = st.attempt;
        let this = Arc::clone(self);

        info!(model_dir = %self.model_dir.display(), attempt, "starting background model load");
        let spawned = std::thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || this.run_load(attempt));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn model loader thread");
            st.failure = Some(LoadFailure::Spawn(format!("failed to spawn loader: {e}")));
            self.transition(st, ModelPhase::Failed);
            self.changed.notify_all();
        }
    }

    /// Loader thread body.
    fn run_load(&self, attempt: u64) {
        let span = self.metrics.span(metric_names::MODEL_LOAD);
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| self.loader.load(&self.model_dir)))
            .unwrap_or_else(|panic| {
                Err(ModelError::Init(format!(
                    "loader panicked: {}",
                    panic_payload(&*panic)
                )))
            });
        let elapsed = started.elapsed();
        span.finish();

        let model = {
            let mut st = self.state.lock();
            if st.attempt != attempt || st.phase != ModelPhase::Loading {
                info!(attempt, phase = %st.phase, "discarding stale model load result");
                return;
            }
            let model = match result {
                Ok(model) if elapsed <= self.load_timeout => {
                    st.model = Some(Arc::clone(&model));
                    st.failure = None;
                    self.transition(&mut st, ModelPhase::Ready);
                    info!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        device = model.device(),
                        "model ready"
                    );
                    Some(model)
                }
                Ok(_) => {
                    warn!(elapsed_ms = elapsed.as_millis() as u64, "model load finished past its timeout");
                    st.failure = Some(LoadFailure::TimedOut(self.load_timeout));
                    self.transition(&mut st, ModelPhase::Failed);
                    None
                }
                Err(e) => {
                    error!(error = %e, "model load failed");
                    st.failure = Some(LoadFailure::Model(e));
                    self.transition(&mut st, ModelPhase::Failed);
                    None
                }
            };
            self.changed.notify_all();
            model
        };

        if let Some(model) = model {
            if self.warmup {
                warm_up(model.as_ref());
            }
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Best-effort warm-up. Failures are logged, never fatal.
fn warm_up(model: &dyn TranslationModel) {
    info!("warming up model");
    let config = TranslationConfig::default();
    for (text, src, tgt) in WARMUP_SAMPLES {
        if let Err(e) = model.translate_one(text, src, tgt, &config) {
            warn!(src, tgt, error = %e, "warm-up translation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StubLoader, StubModel};

    fn lifecycle(loader: Arc<StubLoader>, load_timeout: Duration) -> Arc<ModelLifecycle> {
        ModelLifecycle::new(
            PathBuf::from("unused"),
            loader,
            load_timeout,
            false,
            Arc::new(MetricsRegistry::new()),
        )
    }

    #[test]
    fn transitions_follow_the_phase_graph() {
        assert!(ModelPhase::Unloaded.can_transition_to(ModelPhase::Loading));
        assert!(ModelPhase::Loading.can_transition_to(ModelPhase::Ready));
        assert!(ModelPhase::Failed.can_transition_to(ModelPhase::Unloaded));
        assert!(ModelPhase::Ready.can_transition_to(ModelPhase::ShutDown));
        assert!(!ModelPhase::Ready.can_transition_to(ModelPhase::Loading));
        assert!(!ModelPhase::ShutDown.can_transition_to(ModelPhase::Loading));
        assert!(!ModelPhase::Unloaded.can_transition_to(ModelPhase::Ready));
    }

    #[test]
    fn ensure_ready_loads_once_then_returns_immediately() {
        let loader = Arc::new(StubLoader::new(StubModel::new()));
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));
        assert_eq!(lc.phase(), ModelPhase::Unloaded);

        lc.ensure_ready(Duration::from_secs(5)).unwrap();
        lc.ensure_ready(Duration::from_secs(5)).unwrap();

        assert_eq!(lc.phase(), ModelPhase::Ready);
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn concurrent_waiters_share_one_load() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(150)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lc = Arc::clone(&lc);
                std::thread::spawn(move || lc.ensure_ready(Duration::from_secs(5)).is_ok())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn start_returns_without_waiting_for_the_load() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(300)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));

        let before = Instant::now();
        assert_eq!(lc.start().unwrap(), ModelPhase::Loading);
        assert!(before.elapsed() < Duration::from_millis(200));

        lc.ensure_ready(Duration::from_secs(5)).unwrap();
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn failed_load_is_reported_without_retry() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new())
                .failing_with(ModelError::MissingArtifact(PathBuf::from("m/model.pt"))),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));

        let first = lc.ensure_ready(Duration::from_secs(5)).err().unwrap();
        let second = lc.ensure_ready(Duration::from_secs(5)).err().unwrap();

        assert!(matches!(first, TranslateError::ModelLoad(_)));
        assert!(matches!(second, TranslateError::ModelLoad(_)));
        assert_eq!(lc.phase(), ModelPhase::Failed);
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn panicking_loader_fails_fast_as_model_load() {
        let loader = Arc::new(StubLoader::new(StubModel::new()).panicking());
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(3));

        let started = Instant::now();
        let err = lc.ensure_ready(Duration::from_secs(3)).err().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            TranslateError::ModelLoad(msg) => assert!(msg.contains("native init failed")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lc.phase(), ModelPhase::Failed);
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn hung_loader_is_bounded_by_load_timeout() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_secs(60)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_millis(150));

        let started = Instant::now();
        let err = lc.ensure_ready(Duration::from_secs(30)).err().unwrap();

        assert!(matches!(err, TranslateError::ModelTimeout(t) if t == Duration::from_millis(150)));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(lc.phase(), ModelPhase::Failed);
    }

    #[test]
    fn unrepresentable_timeouts_mean_no_deadline() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(100)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::MAX);

        lc.ensure_ready(Duration::MAX).unwrap();
        lc.ensure_ready(Duration::from_secs(u64::MAX)).unwrap();
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn zero_caller_timeout_returns_without_waiting() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(300)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));

        let err = lc.ensure_ready(Duration::ZERO).err().unwrap();
        assert!(matches!(err, TranslateError::ModelTimeout(_)));
        assert_eq!(lc.phase(), ModelPhase::Loading);
    }

    #[test]
    fn reload_starts_a_fresh_attempt() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).failing_with(ModelError::Init("bad".into())),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));
        assert!(lc.ensure_ready(Duration::from_secs(5)).is_err());

        lc.reload().unwrap();
        assert!(lc.ensure_ready(Duration::from_secs(5)).is_err());
        assert_eq!(loader.load_calls(), 2);
    }

    #[test]
    fn slow_load_times_out_distinctly() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(400)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_millis(100));

        let err = lc.ensure_ready(Duration::from_secs(5)).err().unwrap();
        assert!(matches!(err, TranslateError::ModelTimeout(_)));
        assert_eq!(lc.phase(), ModelPhase::Failed);

        // The late result is discarded.
        std::thread::sleep(Duration::from_millis(500));
        assert_eq!(lc.phase(), ModelPhase::Failed);
        assert!(matches!(
            lc.ensure_ready(Duration::from_secs(1)).err().unwrap(),
            TranslateError::ModelTimeout(_)
        ));
    }

    #[test]
    fn caller_timeout_leaves_load_running() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(300)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));

        let err = lc.ensure_ready(Duration::from_millis(50)).err().unwrap();
        assert!(matches!(err, TranslateError::ModelTimeout(_)));
        assert_eq!(lc.phase(), ModelPhase::Loading);

        lc.ensure_ready(Duration::from_secs(5)).unwrap();
        assert_eq!(loader.load_calls(), 1);
    }

    #[test]
    fn cleanup_is_idempotent_and_wakes_waiters() {
        let loader = Arc::new(
            StubLoader::new(StubModel::new()).with_load_delay(Duration::from_millis(300)),
        );
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));
        lc.start().unwrap();

        let waiter = {
            let lc = Arc::clone(&lc);
            std::thread::spawn(move || lc.ensure_ready(Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(50));
        lc.cleanup();
        lc.cleanup();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(TranslateError::ServiceUnavailable)));
        assert_eq!(lc.phase(), ModelPhase::ShutDown);
        assert!(matches!(lc.start(), Err(TranslateError::ServiceUnavailable)));
    }

    #[test]
    fn held_handle_outlives_cleanup() {
        let loader = Arc::new(StubLoader::new(StubModel::new()));
        let lc = lifecycle(Arc::clone(&loader), Duration::from_secs(5));
        let model = lc.ensure_ready(Duration::from_secs(5)).unwrap();

        lc.cleanup();

        let out = model
            .translate_one("in flight", "en", "hi", &TranslationConfig::default())
            .unwrap();
        assert_eq!(out, "[hi] in flight");
    }

    #[test]
    fn warm_up_runs_after_ready() {
        let loader = Arc::new(StubLoader::new(StubModel::new()));
        let model = loader.model();
        let lc = ModelLifecycle::new(
            PathBuf::from("unused"),
            loader,
            Duration::from_secs(5),
            true,
            Arc::new(MetricsRegistry::new()),
        );
        lc.ensure_ready(Duration::from_secs(5)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while model.translate_calls() < WARMUP_SAMPLES.len() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(model.translate_calls(), WARMUP_SAMPLES.len());
    }

    #[test]
    fn warm_up_failures_are_not_fatal() {
        let loader = Arc::new(StubLoader::new(StubModel::new().failing_on("This is a test.")));
        let lc = ModelLifecycle::new(
            PathBuf::from("unused"),
            loader,
            Duration::from_secs(5),
            true,
            Arc::new(MetricsRegistry::new()),
        );
        lc.ensure_ready(Duration::from_secs(5)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(lc.is_ready());
    }
}
