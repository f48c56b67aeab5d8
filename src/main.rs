//! diagrun CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use diagrun::check::builtin;
use diagrun::cli::{Cli, CommandDispatcher};
use diagrun::loader::{Loader, HOST_API_VERSION};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `--quiet` flag sets level to WARN
/// 3. `RUST_LOG` environment variable (if set)
/// 4. Default is INFO
///
/// Logs go to stderr; stdout carries the result tree.
fn init_tracing(debug: bool, quiet: bool) {
    let filter = if debug {
        EnvFilter::new("diagrun=debug")
    } else if quiet {
        EnvFilter::new("diagrun=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("diagrun=info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.quiet);

    tracing::debug!("diagrun starting with args: {:?}", cli);

    let loader = Loader::new(builtin::registry(HOST_API_VERSION));
    let dispatcher = CommandDispatcher::new(loader);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match dispatcher.dispatch(&cli, &mut out) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
