//! Per-request sensor options.

use std::time::Duration;

/// Options passed with every sensor request, mirroring the usual platform
/// geolocation API shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask the platform for its most precise source.
    pub high_accuracy: bool,
    /// Oldest cached reading the caller will accept. Zero forces a new read.
    pub maximum_age: Duration,
    /// Upper bound on how long a single read may take.
    pub timeout: Duration,
}

impl PositionOptions {
    /// High-accuracy read that refuses any cached value.
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout,
        }
    }

    /// Standard-accuracy read that tolerates cached values up to `maximum_age`.
    pub fn tolerant(maximum_age: Duration, timeout: Duration) -> Self {
        Self {
            high_accuracy: false,
            maximum_age,
            timeout,
        }
    }

    /// Set the high-accuracy flag.
    pub fn with_high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.high_accuracy = high_accuracy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_rejects_cache() {
        let opts = PositionOptions::fresh(Duration::from_secs(15));
        assert!(opts.high_accuracy);
        assert_eq!(opts.maximum_age, Duration::ZERO);
        assert_eq!(opts.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_tolerant_is_standard_accuracy() {
        let opts = PositionOptions::tolerant(Duration::from_secs(30), Duration::from_secs(27));
        assert!(!opts.high_accuracy);
        assert_eq!(opts.maximum_age, Duration::from_secs(30));
        assert_eq!(opts.timeout, Duration::from_secs(27));
    }

    #[test]
    fn test_builder() {
        let opts = PositionOptions::tolerant(Duration::from_secs(30), Duration::from_secs(27))
            .with_high_accuracy(true);
        assert!(opts.high_accuracy);
        assert_eq!(opts.maximum_age, Duration::from_secs(30));
    }
}
