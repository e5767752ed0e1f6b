//! Engine timing configuration.

use std::time::Duration;

use crate::sensor::PositionOptions;

/// Default timeout for a user-triggered refresh.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default maximum cache age for the background watch and the initial read.
///
/// These feed continuous UI feedback, so a slightly stale reading is fine.
pub const DEFAULT_WATCH_MAXIMUM_AGE: Duration = Duration::from_secs(30);

/// Default timeout for the background watch and the initial read.
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(27);

/// Sensor options for each of the engine's read paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Options for the read issued by `start()`.
    pub initial_read: PositionOptions,
    /// Options for the continuous watch.
    pub watch: PositionOptions,
    /// Options for `refresh()`. Always forces a fresh reading.
    pub refresh: PositionOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let background =
            PositionOptions::tolerant(DEFAULT_WATCH_MAXIMUM_AGE, DEFAULT_WATCH_TIMEOUT);
        Self {
            initial_read: background,
            watch: background,
            refresh: PositionOptions::fresh(DEFAULT_REFRESH_TIMEOUT),
        }
    }
}

impl EngineConfig {
    /// Set the refresh timeout. The refresh read always has zero cache age.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh = PositionOptions::fresh(timeout);
        self
    }

    /// Set the cache age and timeout used by the watch and the initial read.
    pub fn with_background(mut self, maximum_age: Duration, timeout: Duration) -> Self {
        self.watch = PositionOptions::tolerant(maximum_age, timeout);
        self.initial_read = self.watch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.refresh.maximum_age, Duration::ZERO);
        assert_eq!(config.refresh.timeout, DEFAULT_REFRESH_TIMEOUT);
        assert!(config.refresh.high_accuracy);
        assert_eq!(config.watch.maximum_age, DEFAULT_WATCH_MAXIMUM_AGE);
        assert_eq!(config.initial_read, config.watch);
        // Background reads accept a standard-accuracy source
        assert!(!config.watch.high_accuracy);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_refresh_timeout(Duration::from_secs(10))
            .with_background(Duration::from_secs(60), Duration::from_secs(45));
        assert_eq!(config.refresh.timeout, Duration::from_secs(10));
        assert_eq!(config.refresh.maximum_age, Duration::ZERO);
        assert_eq!(config.initial_read.maximum_age, Duration::from_secs(60));
        assert_eq!(config.watch.timeout, Duration::from_secs(45));
    }
}
