//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "bluetemp")]
#[command(author, version, about = "Read BLE temperature and humidity sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress everything but warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read temperature and humidity
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Persist the reading in the local database
        #[arg(long)]
        store: bool,

        /// Database file used with --store
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },

    /// Read the temperature
    Temperature {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Read the relative humidity
    Humidity {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Read the battery level
    Battery {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show readings stored with `read --store`
    History {
        /// Number of records to show, newest first
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,

        /// Database file
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Selects the peripheral and its timeouts.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Peripheral id or address
    #[arg(short, long, env = "BLUETEMP_DEVICE")]
    pub device: Option<String>,

    /// Scan timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub scan_timeout: Option<u64>,

    /// Connection timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub connect_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read_with_store() {
        let cli = Cli::try_parse_from([
            "bluetemp",
            "read",
            "--device",
            "A4:C1:38:F0:E9:D2",
            "--store",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Read {
                device,
                output,
                store,
                database,
            } => {
                assert_eq!(device.device.as_deref(), Some("A4:C1:38:F0:E9:D2"));
                assert_eq!(output.format, Some(OutputFormat::Json));
                assert!(store);
                assert!(database.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bluetemp", "battery", "-d", "sensor", "--quiet"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Battery { .. }));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["bluetemp", "-v", "-q", "temperature"]).is_err());
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::try_parse_from(["bluetemp", "history"]).unwrap();
        match cli.command {
            Commands::History { count, output, .. } => {
                assert_eq!(count, 20);
                assert!(output.format.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
