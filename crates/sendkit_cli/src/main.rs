mod cli;
mod config;
mod display;
mod signal;

use std::process::ExitCode;
use std::sync::mpsc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sendkit_io_fs::{CopyEvent, CopyJobController, SpecCopyRequest};

use cli::Cli;
use config::SendkitConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(display::ProgressAwareStderr)
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(display::EXIT_COMPLETED_WITH_ERRORS)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let (cfg, path_config) = SendkitConfig::load(cli.config.as_deref())?;
    if let Some(path) = &path_config {
        tracing::info!("Using config: {}", path.display());
    }

    let request = build_request(cli, &cfg, Local::now().date_naive());
    tracing::info!(
        "exporting {} -> {} ({}..={})",
        request.dir_source.display(),
        request.dir_destination.display(),
        request.date_from,
        request.date_to
    );

    signal::install_signal_handlers();

    let mut controller = CopyJobController::new(cfg.walk_options(&cli.exclude), cfg.archive_options());
    let (tx, rx) = mpsc::channel::<CopyEvent>();
    controller.trigger(request, tx)?;

    let result = display::drive(&mut controller, rx, cli.quiet)
        .context("copy worker finished without a result")?;
    if let Ok(report) = &result {
        tracing::info!("{report}");
    }

    let (message, code) = display::render_outcome(&result);
    if code == display::EXIT_OK {
        println!("{message}");
    } else {
        eprintln!("{message}");
    }
    Ok(code)
}

/// Merge flags over config values. Missing paths stay empty so the
/// pre-flight checks report them alongside any other problem.
fn build_request(cli: &Cli, cfg: &SendkitConfig, date_today: NaiveDate) -> SpecCopyRequest {
    let dir_source = cli
        .source
        .clone()
        .or_else(|| cfg.source_dir.clone())
        .unwrap_or_default();
    let dir_destination = cli
        .destination
        .clone()
        .or_else(|| cfg.destination_dir.clone())
        .unwrap_or_default();

    let mut request = SpecCopyRequest::new(
        dir_source,
        dir_destination,
        cli.from.unwrap_or(date_today),
        cli.to.unwrap_or(date_today),
    );
    request.if_compress = cli.zip || (cfg.compress && !cli.no_zip);
    request.if_password_protect = cli.protect || cfg.password_protect;
    request.password = cli.password.clone().unwrap_or_default();
    request
}
