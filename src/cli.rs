//! Command-line front end: argument parsing, config layering and the three
//! terminal modes. HTTP mode is driven from `main`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use crate::config::ServiceConfig;
use crate::error::ConfigError;
use crate::metrics::metric_names;
use crate::service::TranslationService;
use crate::translate::{DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG};

/// Fixed inputs for `--benchmark`: (text, src, tgt).
pub const BENCHMARK_SAMPLES: [(&str, &str, &str); 5] = [
    ("Hello, how are you?", "en", "hi"),
    ("This is a test of the translation service.", "en", "hi"),
    ("The quick brown fox jumps over the lazy dog.", "en", "hi"),
    ("नमस्ते, आप कैसे हैं?", "hi", "en"),
    ("यह एक परीक्षण है।", "hi", "ta"),
];

const RULE_WIDE: usize = 80;
const RULE_NARROW: usize = 40;

#[derive(Debug, Parser)]
#[command(name = "indictrans-serve", version, about = "Indic translation service")]
pub struct Cli {
    /// Text to translate. Omit to start interactive mode.
    pub text: Option<String>,

    /// Source language code.
    #[arg(long, default_value = DEFAULT_SOURCE_LANG)]
    pub src: String,

    /// Target language code.
    #[arg(long, default_value = DEFAULT_TARGET_LANG)]
    pub tgt: String,

    /// Read lines from stdin and translate each one.
    #[arg(short, long)]
    pub interactive: bool,

    /// Translate a fixed sample set and print timings.
    #[arg(long)]
    pub benchmark: bool,

    /// Serve the HTTP API.
    #[arg(long)]
    pub http: bool,

    /// HTTP listen address.
    #[arg(long, env = "INDICTRANS_BIND")]
    pub bind: Option<String>,

    /// Directory holding the model artifacts.
    #[arg(long, env = "INDICTRANS_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[arg(long, env = "INDICTRANS_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    #[arg(long, env = "INDICTRANS_BEAM_SIZE")]
    pub beam_size: Option<usize>,

    #[arg(long, env = "INDICTRANS_CACHE_SIZE")]
    pub cache_size: Option<usize>,

    /// Seconds to wait for the model to load.
    #[arg(long, env = "INDICTRANS_LOAD_TIMEOUT")]
    pub load_timeout: Option<u64>,

    /// TOML config file; flags and env vars override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Http,
    Benchmark,
    Interactive,
    Single(String),
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.http {
            Mode::Http
        } else if self.benchmark {
            Mode::Benchmark
        } else {
            match &self.text {
                Some(text) if !self.interactive => Mode::Single(text.clone()),
                _ => Mode::Interactive,
            }
        }
    }

    /// Defaults, then the config file, then flags/env.
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.beam_size {
            config.beam_size = n;
        }
        if let Some(n) = self.cache_size {
            config.cache_size = n;
        }
        if let Some(secs) = self.load_timeout {
            config.load_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Translate one text and print a framed report to `out`. A failure goes
/// to `err` as `Error: ...` and yields `Ok(false)`.
pub fn run_single<W: Write, E: Write>(
    service: &TranslationService,
    text: &str,
    src: &str,
    tgt: &str,
    out: &mut W,
    err: &mut E,
) -> io::Result<bool> {
    let started = Instant::now();
    match service.translate(&service.request(text, src, tgt)) {
        Ok(outcome) => {
            let elapsed = started.elapsed().as_secs_f64() * 1000.0;
            writeln!(out, "\n{}", "=".repeat(RULE_WIDE))?;
            writeln!(out, "Source ({src}): {text}")?;
            writeln!(out, "{}", "-".repeat(RULE_WIDE))?;
            writeln!(out, "Target ({tgt}): {}", outcome.translated_text)?;
            writeln!(out, "{}", "-".repeat(RULE_WIDE))?;
            writeln!(out, "Translation took {elapsed:.2} ms")?;
            writeln!(out, "{}", "=".repeat(RULE_WIDE))?;
            Ok(true)
        }
        Err(e) => {
            writeln!(err, "\nError: {e}")?;
            Ok(false)
        }
    }
}

/// Translate lines from `input` until `quit`, `exit` or EOF. Per-line
/// failures go to `err` and the loop continues. Returns the number of
/// successful translations.
pub fn run_interactive<R: BufRead, W: Write, E: Write>(
    service: &TranslationService,
    src: &str,
    tgt: &str,
    input: R,
    out: &mut W,
    err: &mut E,
) -> io::Result<usize> {
    writeln!(out, "Indic translation service, interactive mode")?;
    writeln!(out, "Type 'quit' or 'exit' to leave\n")?;

    let mut translated = 0;
    let mut lines = input.lines();
    loop {
        write!(out, "Enter text to translate ({src}->{tgt}): ")?;
        out.flush()?;
        let Some(line) = lines.next().transpose()? else {
            writeln!(out, "\nExiting...")?;
            break;
        };
        let text = line.trim();
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        match service.translate(&service.request(text, src, tgt)) {
            Ok(outcome) => {
                writeln!(out, "\n{}", "-".repeat(RULE_WIDE))?;
                writeln!(out, "Translated: {}", outcome.translated_text)?;
                writeln!(out, "Time: {:.2} ms", outcome.elapsed_ms)?;
                writeln!(out, "{}\n", "-".repeat(RULE_WIDE))?;
                translated += 1;
            }
            Err(e) => writeln!(err, "\nError: {e}\n")?,
        }
    }
    Ok(translated)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkReport {
    pub cases: usize,
    pub failures: usize,
    pub total_chars: usize,
    pub total_ms: f64,
}

impl BenchmarkReport {
    pub fn average_ms(&self) -> f64 {
        if self.cases == 0 {
            0.0
        } else {
            self.total_ms / self.cases as f64
        }
    }

    pub fn chars_per_second(&self) -> Option<f64> {
        (self.total_ms > 0.0).then(|| self.total_chars as f64 / (self.total_ms / 1000.0))
    }
}

/// Run every benchmark sample once. Per-case failures are printed and
/// counted; the run continues.
pub fn run_benchmark<W: Write>(
    service: &TranslationService,
    out: &mut W,
) -> io::Result<BenchmarkReport> {
    writeln!(out, "Running benchmark...\n")?;
    let mut report = BenchmarkReport::default();

    for (i, (text, src, tgt)) in BENCHMARK_SAMPLES.iter().enumerate() {
        writeln!(out, "Test {}: {src} -> {tgt}", i + 1)?;
        writeln!(out, "  Input: {text}")?;
        let started = Instant::now();
        let result = service.translate(&service.request(*text, *src, *tgt));
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        report.cases += 1;
        report.total_ms += elapsed;

        match result {
            Ok(outcome) => {
                report.total_chars += text.chars().count();
                writeln!(out, "  Output: {}", outcome.translated_text)?;
                writeln!(out, "  Time: {elapsed:.2} ms\n")?;
            }
            Err(e) => {
                report.failures += 1;
                writeln!(out, "  Error: {e}\n")?;
            }
        }
    }

    writeln!(out, "\nBenchmark summary")?;
    writeln!(out, "{}", "-".repeat(RULE_NARROW))?;
    writeln!(out, "Total tests: {}", report.cases)?;
    writeln!(out, "Failures: {}", report.failures)?;
    writeln!(out, "Total characters: {}", report.total_chars)?;
    writeln!(out, "Total time: {:.2} ms", report.total_ms)?;
    writeln!(out, "Average time per test: {:.2} ms", report.average_ms())?;
    if let Some(cps) = report.chars_per_second() {
        writeln!(out, "Characters per second: {cps:.2}")?;
    }
    let metrics = service.metrics();
    if let (Some(p50), Some(p95)) = (
        metrics.percentile(metric_names::TRANSLATE_TOTAL, 50.0),
        metrics.percentile(metric_names::TRANSLATE_TOTAL, 95.0),
    ) {
        writeln!(
            out,
            "Model path latency: p50 {:.2} ms, p95 {:.2} ms",
            p50 / 1000.0,
            p95 / 1000.0
        )?;
    }
    writeln!(out, "{}", "-".repeat(RULE_NARROW))?;
    Ok(report)
}
