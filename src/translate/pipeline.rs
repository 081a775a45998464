//! preprocess (normalize + segment) → translate per batch → postprocess
//! (rejoin). Segment order is preserved end to end.

use std::sync::Arc;

use tracing::{debug, warn};

use super::normalize::{normalize_whitespace, PunctuationSegmenter, Segmenter};
use super::{TranslationConfig, TranslationRequest};
use crate::error::TranslateError;
use crate::model::TranslationModel;

pub struct RequestPipeline {
    segmenter: Arc<dyn Segmenter>,
}

impl RequestPipeline {
    pub fn new(segmenter: Arc<dyn Segmenter>) -> Self {
        Self { segmenter }
    }

    /// Normalized, non-empty segments in source order.
    pub fn preprocess(&self, text: &str, lang: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        self.segmenter
            .split(&normalized, lang)
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// One translation per segment, same order. Segments go to the model
    /// in groups of at most `config.batch_size`.
    pub fn translate_segments(
        &self,
        model: &dyn TranslationModel,
        segments: &[String],
        src_lang: &str,
        tgt_lang: &str,
        config: &TranslationConfig,
    ) -> Result<Vec<String>, TranslateError> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = config.batch_size.max(1);
        let mut translated = Vec::with_capacity(segments.len());
        for batch in segments.chunks(batch_size) {
            let out = model
                .translate_batch(batch, src_lang, tgt_lang, config)
                .map_err(TranslateError::translation)?;
            if out.len() != batch.len() {
                return Err(TranslateError::translation(format!(
                    "model returned {} segments for a batch of {}",
                    out.len(),
                    batch.len()
                )));
            }
            translated.extend(out);
        }
        debug!(
            segments = segments.len(),
            batches = segments.len().div_ceil(batch_size),
            "segments_translated"
        );
        Ok(translated)
    }

    /// Join with single spaces and detokenize. A detokenizer failure falls
    /// back to the raw join; translated work is never discarded here.
    pub fn postprocess(
        &self,
        model: &dyn TranslationModel,
        segments: &[String],
        tgt_lang: &str,
    ) -> String {
        if segments.is_empty() {
            return String::new();
        }
        let joined = segments.join(" ");
        match model.detokenize(&joined, tgt_lang) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "postprocess failed, returning raw join");
                joined
            }
        }
    }

    /// Full pipeline for one request.
    pub fn run(
        &self,
        model: &dyn TranslationModel,
        request: &TranslationRequest,
    ) -> Result<String, TranslateError> {
        let segments = self.preprocess(request.text(), request.source_lang());
        let translated = self.translate_segments(
            model,
            &segments,
            request.source_lang(),
            request.target_lang(),
            request.config(),
        )?;
        Ok(self.postprocess(model, &translated, request.target_lang()))
    }
}

impl Default for RequestPipeline {
    fn default() -> Self {
        Self::new(Arc::new(PunctuationSegmenter::new()))
    }
}
