//! Evolve CLI - database schema migrations from plain SQL scripts

use anyhow::Result;
use clap::Parser;
use evolve_core::CoreError;
use evolve_db::DriverRegistry;
use evolve_engine::{ErrorKind, Evolve, EvolveError};

mod cli;
mod output;
mod settings;

use cli::{Cli, Commands, OutputFormat};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match run(&cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            std::process::ExitCode::from(exit_code(&err))
        }
    }
}

/// `info` by default, `debug` with `--verbose`; `RUST_LOG` wins over both.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = settings::resolve_config(&cli.global, cli.command.command())?;
    let format = match cli.command {
        Commands::Info(args) => args.output,
        _ => OutputFormat::Table,
    };

    let registry = DriverRegistry::with_defaults();
    let evolve = Evolve::connect(config, &registry).await?;

    let cancel = evolve.cancel_handle().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; cancelling");
            cancel.cancel();
        }
    });

    let report = evolve.execute().await?;
    output::print_report(&report, format)
}

/// Process exit status for a failed run.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<EvolveError>() {
        return match err.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Validation => 3,
            ErrorKind::SqlLint => 4,
            ErrorKind::Execution => 5,
            ErrorKind::Connection => 6,
            ErrorKind::Cancelled => 130,
        };
    }
    if err.downcast_ref::<CoreError>().is_some() {
        return 2;
    }
    1
}
