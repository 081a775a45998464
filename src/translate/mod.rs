//! Translation request types, result cache and the request pipeline.

pub mod cache;
pub mod normalize;
pub mod pipeline;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_BEAM_SIZE};

pub const DEFAULT_SOURCE_LANG: &str = "en";
pub const DEFAULT_TARGET_LANG: &str = "hi";

/// Decoding settings. The core only reads `batch_size`; the rest is
/// forwarded to the model untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub batch_size: usize,
    pub beam_size: usize,
    pub max_length: usize,
    pub length_penalty: f32,
    pub no_repeat_ngram_size: usize,
    pub temperature: f32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            beam_size: DEFAULT_BEAM_SIZE,
            max_length: 200,
            length_penalty: 1.0,
            no_repeat_ngram_size: 3,
            temperature: 1.0,
        }
    }
}

/// A single translation request. Immutable once built.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
    config: TranslationConfig,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            config: TranslationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TranslationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }
}

/// What every entry point hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationOutcome {
    pub translated_text: String,
    pub cached: bool,
    pub elapsed_ms: f64,
}
