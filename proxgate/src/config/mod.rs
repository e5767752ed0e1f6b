//! Configuration file support.
//!
//! Settings live in an INI file at `~/.config/proxgate/config.ini` (or the
//! platform equivalent). Every setting is addressed by a [`ConfigKey`] in
//! `section.key` form, which is also what the CLI `config get/set` commands
//! accept.
//!
//! ```ini
//! [target]
//! latitude = 6.50837
//! longitude = 3.384247
//! radius_meters = 250
//!
//! [sensor]
//! gpsd_address = 127.0.0.1:2947
//! allow_remote = false
//! accept_2d_fix = false
//!
//! [refresh]
//! timeout_secs = 15
//!
//! [watch]
//! maximum_age_secs = 30
//! timeout_secs = 27
//!
//! [logging]
//! level = info
//! file = /var/log/proxgate/proxgate.log
//! ```

mod file;
mod keys;

pub use file::{
    ConfigFile, LoggingSettings, RefreshSettings, SensorSettings, TargetSettings, WatchSettings,
    DEFAULT_LOG_LEVEL, DEFAULT_RADIUS_METERS,
};
pub use keys::ConfigKey;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::geo::CoordError;

/// Errors from loading, saving, or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value could not be interpreted for its key.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The key is not a known `section.key` name.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Target latitude or longitude is not set.
    #[error("Target location is not configured; set target.latitude and target.longitude")]
    MissingTarget,

    /// The configured target does not form a valid zone.
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] CoordError),
}

/// Directory holding the configuration file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proxgate")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.ini")
}
