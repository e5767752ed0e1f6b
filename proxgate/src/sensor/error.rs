//! Sensor failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Why a location reading could not be produced.
///
/// `UnsupportedPlatform` and `InsecureContext` are fatal: the engine reports
/// them once from `start()` and never touches the sensor. The remaining kinds
/// are transient and can be retried with `refresh()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// No location capability on this host.
    #[error("Location services are not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// The platform refuses location access from an insecure context.
    #[error("Location access requires a secure context: {0}")]
    InsecureContext(String),

    /// The user or OS denied access to the location sensor.
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    /// No fix arrived within the allotted time.
    #[error("Timed out after {:.1}s waiting for a location fix", .after.as_secs_f64())]
    Timeout { after: Duration },

    /// The sensor is present but could not produce a fix.
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),
}

impl PositionError {
    /// True for errors that no amount of retrying will fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PositionError::UnsupportedPlatform(_) | PositionError::InsecureContext(_)
        )
    }

    /// True for errors a later `refresh()` may recover from.
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }

    /// Short machine-friendly label for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            PositionError::UnsupportedPlatform(_) => "unsupported_platform",
            PositionError::InsecureContext(_) => "insecure_context",
            PositionError::PermissionDenied(_) => "permission_denied",
            PositionError::Timeout { .. } => "timeout",
            PositionError::PositionUnavailable(_) => "position_unavailable",
        }
    }
}
