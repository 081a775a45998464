//! Seam to the external model library.
//! `ModelLoader::load` builds the expensive handle once; the handle is
//! shared read-only across request threads.

pub mod placeholder;
pub mod stub;

use std::path::Path;
use std::sync::Arc;

use crate::error::ModelError;
use crate::translate::TranslationConfig;

pub use placeholder::PlaceholderLoader;
pub use stub::{StubLoader, StubModel};

/// Files that must exist in the model directory before a load is attempted.
pub const REQUIRED_ARTIFACTS: [&str; 2] = ["model.pt", "vocab"];

/// Fail fast when the model directory lacks a required artifact.
pub fn check_artifacts(model_dir: &Path) -> Result<(), ModelError> {
    for name in REQUIRED_ARTIFACTS {
        let path = model_dir.join(name);
        if !path.exists() {
            return Err(ModelError::MissingArtifact(path));
        }
    }
    Ok(())
}

/// A loaded model plus its tokenizer/detokenizer state.
pub trait TranslationModel: Send + Sync {
    fn translate_one(
        &self,
        sentence: &str,
        src_lang: &str,
        tgt_lang: &str,
        config: &TranslationConfig,
    ) -> Result<String, ModelError>;

    /// Translate a group of sentences in one call. Must return exactly one
    /// output per input, in order. Backends without native batching keep
    /// this default.
    fn translate_batch(
        &self,
        sentences: &[String],
        src_lang: &str,
        tgt_lang: &str,
        config: &TranslationConfig,
    ) -> Result<Vec<String>, ModelError> {
        sentences
            .iter()
            .map(|s| self.translate_one(s, src_lang, tgt_lang, config))
            .collect()
    }

    /// Final cleanup of joined output in the target language.
    fn detokenize(&self, text: &str, _lang: &str) -> Result<String, ModelError> {
        Ok(text.to_string())
    }

    /// Where the model runs, for logging.
    fn device(&self) -> &str {
        "cpu"
    }
}

/// Builds a model handle from a directory. Called at most once per load
/// attempt, always off the request path.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_dir: &Path) -> Result<Arc<dyn TranslationModel>, ModelError>;
}
