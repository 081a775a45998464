use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use indictrans_serve::cli::{self, Cli, Mode};
use indictrans_serve::model::PlaceholderLoader;
use indictrans_serve::{http, init_tracing, TranslationService};
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match cli.service_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(model_dir = %config.model_dir.display(), "indictrans-serve starting");
    let service = match TranslationService::start(&config, Arc::new(PlaceholderLoader)) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.mode() {
        Mode::Http => serve_http(Arc::clone(&service), &config.bind).map(|_| true),
        Mode::Benchmark => cli::run_benchmark(&service, &mut io::stdout().lock()).map(|_| true),
        Mode::Interactive => cli::run_interactive(
            &service,
            &cli.src,
            &cli.tgt,
            io::stdin().lock(),
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
        )
        .map(|_| true),
        Mode::Single(text) => cli::run_single(
            &service,
            &text,
            &cli.src,
            &cli.tgt,
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
        ),
    };

    service.shutdown();
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "terminal i/o failed");
            ExitCode::FAILURE
        }
    }
}

fn serve_http(service: Arc<TranslationService>, bind: &str) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("http-worker")
        .build()?;
    runtime.block_on(http::serve(service, bind))
}
