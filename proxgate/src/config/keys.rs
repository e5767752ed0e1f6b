//! Typed `section.key` addressing for configuration values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};
use crate::geo::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    TargetLatitude,
    TargetLongitude,
    TargetRadiusMeters,
    SensorGpsdAddress,
    SensorAllowRemote,
    SensorAccept2dFix,
    RefreshTimeoutSecs,
    WatchMaximumAgeSecs,
    WatchTimeoutSecs,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::TargetLatitude,
            ConfigKey::TargetLongitude,
            ConfigKey::TargetRadiusMeters,
            ConfigKey::SensorGpsdAddress,
            ConfigKey::SensorAllowRemote,
            ConfigKey::SensorAccept2dFix,
            ConfigKey::RefreshTimeoutSecs,
            ConfigKey::WatchMaximumAgeSecs,
            ConfigKey::WatchTimeoutSecs,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingFile,
        ]
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::TargetLatitude | ConfigKey::TargetLongitude | ConfigKey::TargetRadiusMeters => {
                "target"
            }
            ConfigKey::SensorGpsdAddress
            | ConfigKey::SensorAllowRemote
            | ConfigKey::SensorAccept2dFix => "sensor",
            ConfigKey::RefreshTimeoutSecs => "refresh",
            ConfigKey::WatchMaximumAgeSecs | ConfigKey::WatchTimeoutSecs => "watch",
            ConfigKey::LoggingLevel | ConfigKey::LoggingFile => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::TargetLatitude => "latitude",
            ConfigKey::TargetLongitude => "longitude",
            ConfigKey::TargetRadiusMeters => "radius_meters",
            ConfigKey::SensorGpsdAddress => "gpsd_address",
            ConfigKey::SensorAllowRemote => "allow_remote",
            ConfigKey::SensorAccept2dFix => "accept_2d_fix",
            ConfigKey::RefreshTimeoutSecs => "timeout_secs",
            ConfigKey::WatchMaximumAgeSecs => "maximum_age_secs",
            ConfigKey::WatchTimeoutSecs => "timeout_secs",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::TargetLatitude => "target.latitude",
            ConfigKey::TargetLongitude => "target.longitude",
            ConfigKey::TargetRadiusMeters => "target.radius_meters",
            ConfigKey::SensorGpsdAddress => "sensor.gpsd_address",
            ConfigKey::SensorAllowRemote => "sensor.allow_remote",
            ConfigKey::SensorAccept2dFix => "sensor.accept_2d_fix",
            ConfigKey::RefreshTimeoutSecs => "refresh.timeout_secs",
            ConfigKey::WatchMaximumAgeSecs => "watch.maximum_age_secs",
            ConfigKey::WatchTimeoutSecs => "watch.timeout_secs",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Current value as a string. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::TargetLatitude => optional(config.target.latitude),
            ConfigKey::TargetLongitude => optional(config.target.longitude),
            ConfigKey::TargetRadiusMeters => config.target.radius_meters.to_string(),
            ConfigKey::SensorGpsdAddress => config.sensor.gpsd_address.clone(),
            ConfigKey::SensorAllowRemote => config.sensor.allow_remote.to_string(),
            ConfigKey::SensorAccept2dFix => config.sensor.accept_2d_fix.to_string(),
            ConfigKey::RefreshTimeoutSecs => config.refresh.timeout_secs.to_string(),
            ConfigKey::WatchMaximumAgeSecs => config.watch.maximum_age_secs.to_string(),
            ConfigKey::WatchTimeoutSecs => config.watch.timeout_secs.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse and store `value`. An empty value clears optional settings.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::TargetLatitude => {
                config.target.latitude = self.parse_degrees(value, MIN_LAT, MAX_LAT)?;
            }
            ConfigKey::TargetLongitude => {
                config.target.longitude = self.parse_degrees(value, MIN_LON, MAX_LON)?;
            }
            ConfigKey::TargetRadiusMeters => {
                let radius: f64 = self.parse(value)?;
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(self.invalid(value, "must be a positive number of meters"));
                }
                config.target.radius_meters = radius;
            }
            ConfigKey::SensorGpsdAddress => {
                if value.is_empty() {
                    return Err(self.invalid(value, "address must not be empty"));
                }
                config.sensor.gpsd_address = value.to_string();
            }
            ConfigKey::SensorAllowRemote => {
                config.sensor.allow_remote = self.parse_bool(value)?;
            }
            ConfigKey::SensorAccept2dFix => {
                config.sensor.accept_2d_fix = self.parse_bool(value)?;
            }
            ConfigKey::RefreshTimeoutSecs => {
                config.refresh.timeout_secs = self.parse_seconds(value)?;
            }
            ConfigKey::WatchMaximumAgeSecs => {
                config.watch.maximum_age_secs = self.parse(value)?;
            }
            ConfigKey::WatchTimeoutSecs => {
                config.watch.timeout_secs = self.parse_seconds(value)?;
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(value, "expected trace, debug, info, warn, or error"));
                }
                config.logging.level = level;
            }
            ConfigKey::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        value
            .parse()
            .map_err(|e: T::Err| self.invalid(value, &e.to_string()))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn parse_seconds(&self, value: &str) -> Result<u64, ConfigError> {
        match self.parse::<u64>(value)? {
            0 => Err(self.invalid(value, "timeout must be at least one second")),
            secs => Ok(secs),
        }
    }

    fn parse_degrees(&self, value: &str, min: f64, max: f64) -> Result<Option<f64>, ConfigError> {
        if value.is_empty() {
            return Ok(None);
        }
        let degrees: f64 = self.parse(value)?;
        if !(min..=max).contains(&degrees) {
            return Err(self.invalid(value, &format!("must be between {} and {}", min, max)));
        }
        Ok(Some(degrees))
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_section_dot_key() {
        for key in ConfigKey::all() {
            assert_eq!(key.name(), format!("{}.{}", key.section(), key.key_name()));
        }
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            "target.latitude".parse::<ConfigKey>().unwrap(),
            ConfigKey::TargetLatitude
        );
        assert_eq!(
            "WATCH.TIMEOUT_SECS".parse::<ConfigKey>().unwrap(),
            ConfigKey::WatchTimeoutSecs
        );
        assert!(matches!(
            "target.altitude".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();
        ConfigKey::TargetLatitude.set(&mut config, "6.50837").unwrap();
        ConfigKey::SensorAllowRemote.set(&mut config, "yes").unwrap();
        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();

        assert_eq!(ConfigKey::TargetLatitude.get(&config), "6.50837");
        assert_eq!(ConfigKey::SensorAllowRemote.get(&config), "true");
        assert_eq!(ConfigKey::LoggingLevel.get(&config), "debug");
        assert_eq!(ConfigKey::TargetLongitude.get(&config), "");
    }

    #[test]
    fn test_latitude_range_enforced() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::TargetLatitude.set(&mut config, "91").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "target.latitude",
                ..
            }
        ));
        assert!(ConfigKey::TargetLongitude.set(&mut config, "-180").is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::RefreshTimeoutSecs.set(&mut config, "0").is_err());
        // Zero cache age is legitimate
        assert!(ConfigKey::WatchMaximumAgeSecs.set(&mut config, "0").is_ok());
    }

    #[test]
    fn test_accept_2d_fix() {
        let mut config = ConfigFile::default();
        assert_eq!(ConfigKey::SensorAccept2dFix.get(&config), "false");
        ConfigKey::SensorAccept2dFix.set(&mut config, "on").unwrap();
        assert!(config.sensor.accept_2d_fix);
        assert!(ConfigKey::SensorAccept2dFix.set(&mut config, "maybe").is_err());
        assert_eq!(
            "sensor.accept_2d_fix".parse::<ConfigKey>().unwrap(),
            ConfigKey::SensorAccept2dFix
        );
    }

    #[test]
    fn test_clear_optional() {
        let mut config = ConfigFile::default();
        ConfigKey::LoggingFile.set(&mut config, "/tmp/p.log").unwrap();
        ConfigKey::LoggingFile.set(&mut config, "").unwrap();
        assert!(config.logging.file.is_none());
    }
}
