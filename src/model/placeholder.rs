//! Placeholder backend used by the binary until a native model library is
//! wired in. It performs the real load-time checks (artifacts present,
//! vocabulary readable and non-empty) and tags each sentence instead of
//! decoding it.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::{check_artifacts, ModelLoader, TranslationModel};
use crate::error::ModelError;
use crate::translate::TranslationConfig;

pub struct PlaceholderLoader;

impl ModelLoader for PlaceholderLoader {
    fn load(&self, model_dir: &Path) -> Result<Arc<dyn TranslationModel>, ModelError> {
        let start = Instant::now();
        check_artifacts(model_dir)?;

        let vocab_path = model_dir.join("vocab");
        let vocab_size = if vocab_path.is_dir() {
            std::fs::read_dir(&vocab_path)
                .map_err(|e| ModelError::Init(format!("read {}: {e}", vocab_path.display())))?
                .count()
        } else {
            std::fs::read_to_string(&vocab_path)
                .map_err(|e| ModelError::Init(format!("read {}: {e}", vocab_path.display())))?
                .lines()
                .filter(|l| !l.trim().is_empty())
                .count()
        };
        if vocab_size == 0 {
            return Err(ModelError::Init(format!(
                "vocabulary at {} is empty",
                vocab_path.display()
            )));
        }

        info!(
            model_dir = %model_dir.display(),
            vocab_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "placeholder model loaded"
        );
        Ok(Arc::new(PlaceholderModel))
    }
}

pub struct PlaceholderModel;

impl TranslationModel for PlaceholderModel {
    fn translate_one(
        &self,
        sentence: &str,
        src_lang: &str,
        tgt_lang: &str,
        _config: &TranslationConfig,
    ) -> Result<String, ModelError> {
        Ok(format!("[Translated from {src_lang} to {tgt_lang}]: {sentence}"))
    }
}
