//! The configuration file model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use super::{config_file_path, ConfigError, ConfigKey};
use crate::engine::{
    EngineConfig, DEFAULT_REFRESH_TIMEOUT, DEFAULT_WATCH_MAXIMUM_AGE, DEFAULT_WATCH_TIMEOUT,
};
use crate::geo::TargetZone;
use crate::sensor::{GpsdSensorConfig, DEFAULT_GPSD_ADDRESS};

/// Default zone radius in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 250.0;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `[target]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSettings {
    /// Venue latitude in degrees.
    pub latitude: Option<f64>,
    /// Venue longitude in degrees.
    pub longitude: Option<f64>,
    /// Allowed distance from the venue in meters.
    pub radius_meters: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

/// `[sensor]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    /// gpsd `host:port`.
    pub gpsd_address: String,
    /// Trust a non-loopback gpsd.
    pub allow_remote: bool,
    /// Let refreshes use a 2D fix.
    pub accept_2d_fix: bool,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            gpsd_address: DEFAULT_GPSD_ADDRESS.to_string(),
            allow_remote: false,
            accept_2d_fix: false,
        }
    }
}

/// `[refresh]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Refresh timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_REFRESH_TIMEOUT.as_secs(),
        }
    }
}

/// `[watch]` section. Also governs the initial read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    /// Oldest cached reading accepted, in seconds.
    pub maximum_age_secs: u64,
    /// Per-read timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            maximum_age_secs: DEFAULT_WATCH_MAXIMUM_AGE.as_secs(),
            timeout_secs: DEFAULT_WATCH_TIMEOUT.as_secs(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file; logs also go to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// All settings from the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub target: TargetSettings,
    pub sensor: SensorSettings,
    pub refresh: RefreshSettings,
    pub watch: WatchSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(parse) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: parse.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default path, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// The configured venue as a zone.
    pub fn target_zone(&self) -> Result<TargetZone, ConfigError> {
        match (self.target.latitude, self.target.longitude) {
            (Some(lat), Some(lon)) => Ok(TargetZone::from_degrees(
                lat,
                lon,
                self.target.radius_meters,
            )?),
            _ => Err(ConfigError::MissingTarget),
        }
    }

    /// Engine timing derived from the `[refresh]` and `[watch]` sections.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_refresh_timeout(Duration::from_secs(self.refresh.timeout_secs))
            .with_background(
                Duration::from_secs(self.watch.maximum_age_secs),
                Duration::from_secs(self.watch.timeout_secs),
            )
    }

    /// gpsd connection settings from the `[sensor]` section.
    pub fn gpsd_config(&self) -> GpsdSensorConfig {
        GpsdSensorConfig::new(self.sensor.gpsd_address.clone())
            .with_allow_remote(self.sensor.allow_remote)
            .with_accept_2d_fix(self.sensor.accept_2d_fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[target]
latitude = 6.50837
longitude = 3.384247
radius_meters = 300

[sensor]
gpsd_address = 10.0.0.5:2947
allow_remote = true
accept_2d_fix = on

[refresh]
timeout_secs = 20

[logging]
level = debug
";

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.target.radius_meters, DEFAULT_RADIUS_METERS);
        assert_eq!(config.sensor.gpsd_address, DEFAULT_GPSD_ADDRESS);
        assert_eq!(config.refresh.timeout_secs, 15);
        assert_eq!(config.watch.maximum_age_secs, 30);
        assert!(matches!(
            config.target_zone(),
            Err(ConfigError::MissingTarget)
        ));
    }

    #[test]
    fn test_parse_sample() {
        let config = ConfigFile::parse(SAMPLE).unwrap();
        let zone = config.target_zone().unwrap();
        assert_eq!(zone.center().latitude(), 6.50837);
        assert_eq!(zone.radius_meters(), 300.0);
        assert!(config.sensor.allow_remote);
        assert_eq!(config.logging.level, "debug");
        // Unset sections keep defaults
        assert_eq!(config.watch.timeout_secs, 27);
    }

    #[test]
    fn test_engine_config_translation() {
        let config = ConfigFile::parse(SAMPLE).unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.refresh.timeout, Duration::from_secs(20));
        assert_eq!(engine.refresh.maximum_age, Duration::ZERO);
        assert_eq!(engine.watch.maximum_age, Duration::from_secs(30));
    }

    #[test]
    fn test_gpsd_config_translation() {
        let config = ConfigFile::parse(SAMPLE).unwrap();
        let gpsd = config.gpsd_config();
        assert_eq!(gpsd.address, "10.0.0.5:2947");
        assert!(gpsd.allow_remote);
        assert!(gpsd.accept_2d_fix);
        assert!(!ConfigFile::default().gpsd_config().accept_2d_fix);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = ConfigFile::parse("[target]\nradius_meters = -4\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::parse(SAMPLE).unwrap();
        config.logging.file = Some(PathBuf::from("/tmp/proxgate.log"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }
}
