//! proxgate CLI - check whether this device is within range of a venue.
//!
//! # Commands
//!
//! - `check`: take one fresh reading; exit 0 when within range, 2 otherwise
//! - `watch`: follow the gate until Ctrl+C
//! - `simulate`: replay a JSON script of readings against the engine
//! - `distance`: great-circle distance between two points
//! - `config`: view and edit `config.ini`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use proxgate::config::{ConfigFile, DEFAULT_LOG_LEVEL};
use tracing::debug;

mod commands;
mod error;
mod logging;
mod render;

use commands::common::{resolve_config_path, resolve_zone, TargetArgs};
use commands::config::ConfigCommands;
use error::CliError;

/// Exit status when the device is not within range.
const EXIT_OUTSIDE: u8 = 2;

#[derive(Parser)]
#[command(name = "proxgate")]
#[command(version = proxgate::VERSION)]
#[command(about = "Verify that this device is within range of a venue", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also write logs to this file, rotated daily
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one fresh reading and report whether the gate is open
    Check,

    /// Report every position update until Ctrl+C
    Watch {
        /// Also force a fresh reading every N seconds
        #[arg(long, value_name = "SECS")]
        refresh_every: Option<u64>,
    },

    /// Replay a JSON script of readings through a simulated sensor
    Simulate {
        /// Script file
        script: PathBuf,
    },

    /// Great-circle distance between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },

    /// View and edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config_path = resolve_config_path(cli.config.as_deref());

    // Config commands run without logging or a resolved target
    let command = match cli.command {
        Commands::Config { command } => {
            commands::config::run(command, &config_path, &cli.target)?;
            return Ok(ExitCode::SUCCESS);
        }
        other => other,
    };

    let config = ConfigFile::load_from(&config_path)?;
    let log_file = cli.log_file.or_else(|| config.logging.file.clone());
    let level = if config.logging.level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        config.logging.level.as_str()
    };
    let _log_guard = logging::init_logging(cli.verbose, level, log_file.as_deref())?;
    debug!(config = %config_path.display(), "Configuration loaded");

    match command {
        Commands::Check => {
            let zone = resolve_zone(&cli.target, &config)?;
            if commands::check::run(zone, &config)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_OUTSIDE))
            }
        }
        Commands::Watch { refresh_every } => {
            let zone = resolve_zone(&cli.target, &config)?;
            commands::watch::run(zone, &config, refresh_every)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Simulate { script } => {
            commands::simulate::run(&script, &cli.target, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            commands::distance::run(lat1, lon1, lat2, lon2)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_coordinates_parse() {
        let cli = Cli::try_parse_from([
            "proxgate", "--lat", "-33.9", "--lon", "-70.6", "distance", "-33.9", "-70.6", "6.5",
            "3.38",
        ])
        .unwrap();
        assert_eq!(cli.target.lat, Some(-33.9));
        assert!(matches!(
            cli.command,
            Commands::Distance { lat1, lon2, .. } if lat1 == -33.9 && lon2 == 3.38
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["proxgate", "check", "-vv", "--radius", "100"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.target.radius, Some(100.0));
    }
}
