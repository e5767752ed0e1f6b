//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use proxgate::config::{config_file_path, ConfigFile, DEFAULT_RADIUS_METERS};
use proxgate::geo::TargetZone;
use proxgate::sensor::GpsdSensor;
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Target overrides accepted by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Venue latitude in degrees (overrides target.latitude)
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Venue longitude in degrees (overrides target.longitude)
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Allowed distance in meters (overrides target.radius_meters)
    #[arg(long, global = true)]
    pub radius: Option<f64>,
}

/// Configuration file to use: `--config` if given, else the default path.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

/// Resolve the venue from CLI args and config. CLI takes precedence.
pub fn resolve_zone(args: &TargetArgs, config: &ConfigFile) -> Result<TargetZone, CliError> {
    let latitude = args.lat.or(config.target.latitude);
    let longitude = args.lon.or(config.target.longitude);
    let radius = args.radius.unwrap_or(config.target.radius_meters);

    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Ok(TargetZone::from_degrees(lat, lon, radius)?),
        _ => Err(CliError::Config(format!(
            "No venue configured. Pass --lat and --lon, or run \
             'proxgate config set target.latitude <deg>' and \
             'proxgate config set target.longitude <deg>' \
             (radius defaults to {} m).",
            DEFAULT_RADIUS_METERS
        ))),
    }
}

/// gpsd-backed sensor from the `[sensor]` section.
pub fn gpsd_sensor(config: &ConfigFile) -> Arc<GpsdSensor> {
    Arc::new(GpsdSensor::new(config.gpsd_config()))
}

/// Multi-threaded runtime for async commands.
pub fn build_runtime() -> Result<Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("proxgate")
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start async runtime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> ConfigFile {
        let mut config = ConfigFile::default();
        config.target.latitude = Some(6.50837);
        config.target.longitude = Some(3.384247);
        config
    }

    #[test]
    fn test_zone_from_config() {
        let zone = resolve_zone(&TargetArgs::default(), &configured()).unwrap();
        assert_eq!(zone.center().latitude(), 6.50837);
        assert_eq!(zone.radius_meters(), DEFAULT_RADIUS_METERS);
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = TargetArgs {
            lat: Some(-33.9),
            lon: None,
            radius: Some(50.0),
        };
        let zone = resolve_zone(&args, &configured()).unwrap();
        assert_eq!(zone.center().latitude(), -33.9);
        assert_eq!(zone.center().longitude(), 3.384247);
        assert_eq!(zone.radius_meters(), 50.0);
    }

    #[test]
    fn test_missing_target() {
        let err = resolve_zone(&TargetArgs::default(), &ConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_override() {
        let args = TargetArgs {
            lat: Some(120.0),
            ..TargetArgs::default()
        };
        let err = resolve_zone(&args, &configured()).unwrap_err();
        assert!(matches!(err, CliError::Coordinate(_)));
    }

    #[test]
    fn test_config_path_override() {
        let path = PathBuf::from("/tmp/custom.ini");
        assert_eq!(resolve_config_path(Some(&path)), path);
        assert_eq!(resolve_config_path(None), config_file_path());
    }
}
