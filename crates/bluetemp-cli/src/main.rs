//! Command-line interface for BLE temperature and humidity sensors.
//!
//! ```bash
//! bluetemp read --device A4:C1:38:F0:E9:D2
//! bluetemp read --store --format json
//! bluetemp battery -d A4:C1:38:F0:E9:D2
//! bluetemp history -n 10
//! ```

mod cli;
mod commands;
mod config;
mod format;

use std::process::ExitCode;

use anyhow::Result;
use bluetemp_types::Role;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{ReadArgs, Status};
use crate::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(Status::Done) => ExitCode::SUCCESS,
        Ok(Status::Interrupted) => {
            tracing::info!("Exiting after interrupt");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Status> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Read {
            device,
            output,
            store,
            database,
        } => {
            let store = store.then(|| config.database_path(database.as_deref()));
            commands::cmd_read(ReadArgs {
                session: config.session_config(&device)?,
                format: config.output_format(output.format),
                store,
            })
            .await
        }
        Commands::Temperature { device, output } => {
            single(&config, &device, output.format, Role::Temperature).await
        }
        Commands::Humidity { device, output } => {
            single(&config, &device, output.format, Role::Humidity).await
        }
        Commands::Battery { device, output } => {
            single(&config, &device, output.format, Role::Battery).await
        }
        Commands::History {
            count,
            database,
            output,
        } => {
            commands::cmd_history(
                config.database_path(database.as_deref()),
                count,
                config.output_format(output.format),
            )
            .await
        }
    }
}

async fn single(
    config: &Config,
    device: &cli::DeviceArgs,
    format: Option<cli::OutputFormat>,
    role: Role,
) -> Result<Status> {
    commands::cmd_single(
        config.session_config(device)?,
        role,
        config.output_format(format),
    )
    .await
}
