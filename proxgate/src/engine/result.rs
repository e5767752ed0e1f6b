//! Published containment state.

use std::fmt;

use crate::sensor::{Fix, PositionError};

/// Whether the device is inside the target zone.
///
/// `Unknown` is not `Outside`: it means no reading has resolved yet, and
/// consumers should show a neutral "determining location" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Containment {
    /// No fix or failure has been processed yet.
    #[default]
    Unknown,
    /// The latest reading places the device within the radius.
    Inside,
    /// The latest reading places the device outside, or the read failed.
    Outside,
}

impl Containment {
    /// `None` while unknown, otherwise the definite answer.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Containment::Unknown => None,
            Containment::Inside => Some(true),
            Containment::Outside => Some(false),
        }
    }

    /// True only for a definite `Inside`.
    pub fn is_inside(&self) -> bool {
        matches!(self, Containment::Inside)
    }

    /// True once a fix or failure has been processed.
    pub fn is_known(&self) -> bool {
        !matches!(self, Containment::Unknown)
    }

    /// Short description for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Containment::Unknown => "unknown",
            Containment::Inside => "inside",
            Containment::Outside => "outside",
        }
    }
}

impl From<bool> for Containment {
    fn from(inside: bool) -> Self {
        if inside {
            Containment::Inside
        } else {
            Containment::Outside
        }
    }
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's published answer.
///
/// Fields are read-only so the fix-derived values (`distance_meters`,
/// `accuracy_meters`, `last_fix`) always come from the same reading.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContainmentResult {
    containment: Containment,
    distance_meters: Option<f64>,
    accuracy_meters: Option<f64>,
    last_fix: Option<Fix>,
    error: Option<PositionError>,
}

impl ContainmentResult {
    /// The initial state before anything resolved.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A result derived from a fix.
    pub(crate) fn from_fix(
        containment: Containment,
        distance_meters: f64,
        accuracy_meters: f64,
        fix: Fix,
    ) -> Self {
        Self {
            containment,
            distance_meters: Some(distance_meters),
            accuracy_meters: Some(accuracy_meters),
            last_fix: Some(fix),
            error: None,
        }
    }

    /// Fail closed: mark outside and record `error`, keeping the last fix
    /// and the values derived from it for display.
    pub fn failed(&self, error: PositionError) -> Self {
        Self {
            containment: Containment::Outside,
            error: Some(error),
            ..self.clone()
        }
    }

    /// Inside, outside, or unknown.
    pub fn containment(&self) -> Containment {
        self.containment
    }

    /// `None` while unknown.
    pub fn inside(&self) -> Option<bool> {
        self.containment.as_bool()
    }

    /// Raw great-circle distance to the target for `last_fix`.
    pub fn distance_meters(&self) -> Option<f64> {
        self.distance_meters
    }

    /// Clamped sensor accuracy for `last_fix`.
    pub fn accuracy_meters(&self) -> Option<f64> {
        self.accuracy_meters
    }

    /// The reading the distance and accuracy came from.
    pub fn last_fix(&self) -> Option<&Fix> {
        self.last_fix.as_ref()
    }

    /// The failure behind the current state, if any.
    pub fn error(&self) -> Option<&PositionError> {
        self.error.as_ref()
    }

    /// The failure rendered for users, verbatim.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// What a gating control should do with this result.
    pub fn gate_status(&self) -> GateStatus {
        match self.containment {
            Containment::Unknown => GateStatus::Determining,
            Containment::Inside => GateStatus::Open {
                distance_meters: self.distance_meters.unwrap_or_default(),
            },
            Containment::Outside => GateStatus::Blocked {
                error: self.error_message(),
                last_distance_meters: self.distance_meters,
            },
        }
    }
}

/// Consumer-facing interpretation of a [`ContainmentResult`].
///
/// Keeps "still checking" and "denied" visibly distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum GateStatus {
    /// No answer yet; show a neutral loading state.
    Determining,
    /// The gated action must stay disabled.
    Blocked {
        /// Why the reading failed, if it did.
        error: Option<String>,
        /// Last known distance to the target, if any fix was seen.
        last_distance_meters: Option<f64>,
    },
    /// The gated action may proceed.
    Open {
        /// Distance to the target for the deciding fix.
        distance_meters: f64,
    },
}

impl GateStatus {
    /// True only when the gated action may proceed.
    pub fn is_open(&self) -> bool {
        matches!(self, GateStatus::Open { .. })
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStatus::Determining => write!(f, "Determining location..."),
            GateStatus::Open { distance_meters } => {
                write!(f, "Within range ({:.0} m from venue)", distance_meters)
            }
            GateStatus::Blocked {
                error: Some(error),
                last_distance_meters: Some(d),
            } => write!(f, "{} (last known distance {:.0} m)", error, d),
            GateStatus::Blocked {
                error: Some(error),
                last_distance_meters: None,
            } => write!(f, "{}", error),
            GateStatus::Blocked {
                error: None,
                last_distance_meters: Some(d),
            } => write!(f, "Too far from venue ({:.0} m away)", d),
            GateStatus::Blocked {
                error: None,
                last_distance_meters: None,
            } => write!(f, "Not within range of the venue"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    fn fix() -> Fix {
        Fix::new(Coordinate::new(6.5, 3.38).unwrap(), 12.0)
    }

    #[test]
    fn test_unknown_is_not_outside() {
        let result = ContainmentResult::unknown();
        assert_eq!(result.inside(), None);
        assert!(!result.containment().is_known());
        assert_eq!(result.gate_status(), GateStatus::Determining);
    }

    #[test]
    fn test_failed_keeps_fix_derived_values() {
        let ok = ContainmentResult::from_fix(Containment::Inside, 40.0, 12.0, fix());
        let failed = ok.failed(PositionError::PermissionDenied("denied".into()));

        assert_eq!(failed.inside(), Some(false));
        assert_eq!(failed.distance_meters(), Some(40.0));
        assert_eq!(failed.accuracy_meters(), Some(12.0));
        assert_eq!(failed.last_fix(), ok.last_fix());
        assert_eq!(
            failed.error_message().as_deref(),
            Some("Location permission denied: denied")
        );
    }

    #[test]
    fn test_failed_from_unknown_becomes_outside() {
        let failed = ContainmentResult::unknown()
            .failed(PositionError::PositionUnavailable("no signal".into()));
        assert_eq!(failed.containment(), Containment::Outside);
        assert!(failed.distance_meters().is_none());
    }

    #[test]
    fn test_gate_status() {
        let inside = ContainmentResult::from_fix(Containment::Inside, 40.0, 12.0, fix());
        assert!(inside.gate_status().is_open());

        let outside = ContainmentResult::from_fix(Containment::Outside, 1400.0, 12.0, fix());
        assert_eq!(
            outside.gate_status(),
            GateStatus::Blocked {
                error: None,
                last_distance_meters: Some(1400.0)
            }
        );
        assert_eq!(
            outside.gate_status().to_string(),
            "Too far from venue (1400 m away)"
        );
    }

    #[test]
    fn test_containment_from_bool() {
        assert_eq!(Containment::from(true), Containment::Inside);
        assert_eq!(Containment::from(false), Containment::Outside);
        assert_eq!(Containment::Outside.as_bool(), Some(false));
    }
}
