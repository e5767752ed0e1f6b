//! Geographic value types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Errors raised when constructing geographic values.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CoordError {
    /// Latitude outside [-90, 90] or not finite.
    #[error("Invalid latitude: {0} (must be between -90 and 90 degrees)")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("Invalid longitude: {0} (must be between -180 and 180 degrees)")]
    InvalidLongitude(f64),

    /// Zone radius that is zero, negative, or not finite.
    #[error("Invalid radius: {0} meters (must be a positive number)")]
    InvalidRadius(f64),
}

/// A WGS84 position in decimal degrees.
///
/// Immutable once constructed. Out-of-range values are rejected by
/// [`Coordinate::new`] so every `Coordinate` in the system is usable for
/// distance math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, validating both components.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        if !latitude.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(CoordError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(CoordError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to another coordinate in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        super::haversine_distance(self, other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat_hem = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let lon_hem = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.6}°{} {:.6}°{}",
            self.latitude.abs(),
            lat_hem,
            self.longitude.abs(),
            lon_hem
        )
    }
}

/// The venue a device must be near: a center point plus a radius.
///
/// Supplied once when an engine is built and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetZone {
    center: Coordinate,
    radius_meters: f64,
}

impl TargetZone {
    /// Create a zone. The radius must be finite and strictly positive.
    pub fn new(center: Coordinate, radius_meters: f64) -> Result<Self, CoordError> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(CoordError::InvalidRadius(radius_meters));
        }
        Ok(Self {
            center,
            radius_meters,
        })
    }

    /// Convenience constructor from raw degrees.
    pub fn from_degrees(
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Result<Self, CoordError> {
        Self::new(Coordinate::new(latitude, longitude)?, radius_meters)
    }

    /// Center of the zone.
    pub fn center(&self) -> Coordinate {
        self.center
    }

    /// Radius in meters.
    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }
}

impl fmt::Display for TargetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (radius {:.0} m)", self.center, self.radius_meters)
    }
}
