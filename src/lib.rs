mod application;
mod domain;
mod infrastructure;
mod interfaces;
mod shared;

use crate::infrastructure::config::Settings;
use crate::interfaces::cli::{execute, Cli};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub fn run() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();

    let settings = match Settings::load(cli.env_file.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = match &cli.model {
        Some(model) => settings.with_model(model),
        None => settings,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(cli.command, settings)).and_then(|report| report.into_result()) {
        Ok(report) => {
            tracing::info!("Done: {}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
