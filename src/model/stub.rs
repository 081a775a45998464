//! In-memory stub backend with call counters. Used by tests and for
//! exercising the service without model artifacts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ModelLoader, TranslationModel};
use crate::error::ModelError;
use crate::translate::TranslationConfig;

/// Fixed-mapping translator. Unmapped sentences come back as
/// `"[<tgt>] <sentence>"`.
#[derive(Default)]
pub struct StubModel {
    mapping: HashMap<String, String>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    detokenize_fails: bool,
    delay: Duration,
    translate_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl StubModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, source: &str, target: &str) -> Self {
        self.mapping.insert(source.to_string(), target.to_string());
        self
    }

    /// Return an inference error for this exact sentence.
    pub fn failing_on(mut self, sentence: &str) -> Self {
        self.fail_on = Some(sentence.to_string());
        self
    }

    /// Panic for this exact sentence, like a misbehaving native library.
    pub fn panicking_on(mut self, sentence: &str) -> Self {
        self.panic_on = Some(sentence.to_string());
        self
    }

    pub fn with_failing_detokenizer(mut self) -> Self {
        self.detokenize_fails = true;
        self
    }

    /// Sleep this long per sentence.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sentences translated so far.
    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    /// Batched calls made so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl TranslationModel for StubModel {
    fn translate_one(
        &self,
        sentence: &str,
        _src_lang: &str,
        tgt_lang: &str,
        _config: &TranslationConfig,
    ) -> Result<String, ModelError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_on.as_deref() == Some(sentence) {
            panic!("stub model panicked on {sentence:?}");
        }
        if self.fail_on.as_deref() == Some(sentence) {
            return Err(ModelError::Inference(format!("cannot translate {sentence:?}")));
        }
        Ok(self
            .mapping
            .get(sentence)
            .cloned()
            .unwrap_or_else(|| format!("[{tgt_lang}] {sentence}")))
    }

    fn translate_batch(
        &self,
        sentences: &[String],
        src_lang: &str,
        tgt_lang: &str,
        config: &TranslationConfig,
    ) -> Result<Vec<String>, ModelError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        sentences
            .iter()
            .map(|s| self.translate_one(s, src_lang, tgt_lang, config))
            .collect()
    }

    fn detokenize(&self, text: &str, _lang: &str) -> Result<String, ModelError> {
        if self.detokenize_fails {
            return Err(ModelError::Inference("detokenizer unavailable".into()));
        }
        Ok(text.to_string())
    }

    fn device(&self) -> &str {
        "stub"
    }
}

/// Loader handing out one shared `StubModel`, counting load attempts.
pub struct StubLoader {
    model: Arc<StubModel>,
    load_delay: Duration,
    failure: Option<ModelError>,
    panics: bool,
    load_calls: AtomicUsize,
}

impl StubLoader {
    pub fn new(model: StubModel) -> Self {
        Self {
            model: Arc::new(model),
            load_delay: Duration::ZERO,
            failure: None,
            panics: false,
            load_calls: AtomicUsize::new(0),
        }
    }

    /// Block inside `load` for this long.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Every load fails with this error.
    pub fn failing_with(mut self, error: ModelError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Every load panics, like a native library aborting during init.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn model(&self) -> Arc<StubModel> {
        Arc::clone(&self.model)
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StubLoader {
    fn load(&self, _model_dir: &Path) -> Result<Arc<dyn TranslationModel>, ModelError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        if self.panics {
            panic!("native init failed");
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(Arc::clone(&self.model) as Arc<dyn TranslationModel>),
        }
    }
}
