//! Source-text normalization and sentence segmentation.
//! Segmentation rules belong to a language library; `Segmenter` is the
//! seam, `PunctuationSegmenter` the built-in rule set covering Latin
//! punctuation plus danda / double danda and the Urdu full stop.

use regex::Regex;

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits normalized text into sentence-like segments.
pub trait Segmenter: Send + Sync {
    /// Segments in source order. May return blanks; callers filter them.
    fn split(&self, text: &str, lang: &str) -> Vec<String>;
}

/// Splits after a run of terminal punctuation followed by whitespace.
pub struct PunctuationSegmenter {
    boundary: Regex,
}

impl PunctuationSegmenter {
    pub fn new() -> Self {
        Self {
            // . ! ? । ॥ ۔ possibly followed by closing quotes/brackets
            boundary: Regex::new(r#"[.!?।॥۔]+["'”’)\]]*\s+"#).expect("static regex"),
        }
    }
}

impl Default for PunctuationSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for PunctuationSegmenter {
    fn split(&self, text: &str, _lang: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut start = 0;
        for m in self.boundary.find_iter(text) {
            segments.push(text[start..m.end()].trim().to_string());
            start = m.end();
        }
        if start < text.len() {
            segments.push(text[start..].trim().to_string());
        }
        segments
    }
}
