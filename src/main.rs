use std::process::ExitCode;

use clap::Parser;

use tinyserver::cli::Cli;
use tinyserver::lifecycle::startup;
use tinyserver::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tinyserver: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!("tinyserver v{} starting", env!("CARGO_PKG_VERSION"));

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
