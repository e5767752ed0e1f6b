//! A single position reading.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::Coordinate;

/// A sensor reading: where the device is, how sure the sensor is, and when.
///
/// `accuracy_meters` is stored exactly as reported. Some platforms report
/// negative or nonsensical values; evaluation clamps it, the fix does not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fix {
    /// Reported position.
    pub coordinate: Coordinate,
    /// Radius of the sensor's confidence circle in meters.
    pub accuracy_meters: f64,
    /// When the sensor captured the reading.
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// Create a fix captured now.
    pub fn new(coordinate: Coordinate, accuracy_meters: f64) -> Self {
        Self::with_timestamp(coordinate, accuracy_meters, Utc::now())
    }

    /// Create a fix with an explicit capture time.
    pub fn with_timestamp(
        coordinate: Coordinate,
        accuracy_meters: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            coordinate,
            accuracy_meters,
            timestamp,
        }
    }

    /// Age of the reading relative to `now`, saturating at zero for fixes
    /// stamped in the future by a skewed clock.
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.timestamp).to_std().unwrap_or_default()
    }
}
