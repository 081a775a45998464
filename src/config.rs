//! Startup configuration. Defaults match the reference deployment; a TOML
//! file and CLI/env overrides are layered on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::translate::TranslationConfig;

pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_BEAM_SIZE: usize = 5;
pub const DEFAULT_CACHE_SIZE: usize = 10_000;
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 2000;
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_HTTP_READY_TIMEOUT_SECS: u64 = 60;
/// Upper bound for either timeout: one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding `model.pt` and `vocab`.
    pub model_dir: PathBuf,
    /// Segments per external model call.
    pub batch_size: usize,
    /// Decoding width, forwarded opaquely.
    pub beam_size: usize,
    /// ResultCache capacity.
    pub cache_size: usize,
    /// Max wait for model readiness on the blocking path.
    pub load_timeout_secs: u64,
    /// Max wait for model readiness on the HTTP path.
    pub http_ready_timeout_secs: u64,
    /// Max input length in characters.
    pub max_input_length: usize,
    /// Concurrent blocking translations on the async path.
    pub workers: usize,
    /// Run warm-up translations after a successful load.
    pub warmup: bool,
    /// HTTP listen address.
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/indic-en"),
            batch_size: DEFAULT_BATCH_SIZE,
            beam_size: DEFAULT_BEAM_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            http_ready_timeout_secs: DEFAULT_HTTP_READY_TIMEOUT_SECS,
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            workers: 4,
            warmup: true,
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("batch_size", self.batch_size),
            ("beam_size", self.beam_size),
            ("cache_size", self.cache_size),
            ("max_input_length", self.max_input_length),
            ("workers", self.workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        for (name, secs) in [
            ("load_timeout_secs", self.load_timeout_secs),
            ("http_ready_timeout_secs", self.http_ready_timeout_secs),
        ] {
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 1 and {MAX_TIMEOUT_SECS} seconds (got {secs})"
                )));
            }
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn http_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.http_ready_timeout_secs)
    }

    /// Per-request model settings derived from the startup values.
    pub fn translation_config(&self) -> TranslationConfig {
        TranslationConfig {
            batch_size: self.batch_size,
            beam_size: self.beam_size,
            ..TranslationConfig::default()
        }
    }
}
