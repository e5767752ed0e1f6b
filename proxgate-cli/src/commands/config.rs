//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, `config path`, and
//! `config init` for viewing and modifying settings from the command line.

use std::path::Path;

use clap::Subcommand;
use proxgate::config::{ConfigFile, ConfigKey};

use super::common::TargetArgs;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., target.latitude)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., target.latitude)
        key: String,

        /// Value to set (empty clears optional settings)
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with defaults and any --lat/--lon/--radius
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path, target: &TargetArgs) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(path, &key),
        ConfigCommands::Set { key, value } => run_set(path, &key, &value),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(path, target, force),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'proxgate config list' to see available keys.",
            key
        ))
    })
}

/// Get a configuration value.
fn run_get(path: &Path, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

/// Set a configuration value.
fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let mut config = ConfigFile::load_from(path)?;
    config_key.set(&mut config, value)?;
    config.save_to(path)?;

    println!("Set {} = {}", config_key.name(), config_key.get(&config));
    Ok(())
}

/// List all configuration settings.
fn run_list(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
    Ok(())
}

/// Create the configuration file.
fn run_init(path: &Path, target: &TargetArgs, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let config = initial_config(target)?;
    config.save_to(path)?;

    println!("Configuration file: {}", path.display());
    println!();
    if config.target.latitude.is_none() || config.target.longitude.is_none() {
        println!("Set the venue before running 'proxgate check':");
        println!("  proxgate config set target.latitude <degrees>");
        println!("  proxgate config set target.longitude <degrees>");
    }
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

/// Defaults plus any target given on the command line, validated per key.
fn initial_config(target: &TargetArgs) -> Result<ConfigFile, CliError> {
    let mut config = ConfigFile::default();
    let overrides = [
        (ConfigKey::TargetLatitude, target.lat),
        (ConfigKey::TargetLongitude, target.lon),
        (ConfigKey::TargetRadiusMeters, target.radius),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            key.set(&mut config, &value.to_string())?;
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        run_set(&path, "target.latitude", "-33.9").unwrap();
        run_set(&path, "sensor.allow_remote", "true").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.target.latitude, Some(-33.9));
        assert!(config.sensor.allow_remote);
        assert!(run_get(&path, "target.latitude").is_ok());
    }

    #[test]
    fn test_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_get(&dir.path().join("config.ini"), "target.altitude").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_invalid_value_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        assert!(run_set(&path, "refresh.timeout_secs", "soon").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_init_with_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxgate").join("config.ini");
        let target = TargetArgs {
            lat: Some(6.50837),
            lon: Some(3.384247),
            radius: Some(100.0),
        };

        run_init(&path, &target, false).unwrap();
        let zone = ConfigFile::load_from(&path).unwrap().target_zone().unwrap();
        assert_eq!(zone.radius_meters(), 100.0);

        // Existing file is left alone without --force
        run_init(&path, &TargetArgs::default(), false).unwrap();
        assert!(ConfigFile::load_from(&path).unwrap().target_zone().is_ok());

        run_init(&path, &TargetArgs::default(), true).unwrap();
        assert!(ConfigFile::load_from(&path).unwrap().target_zone().is_err());
    }
}
