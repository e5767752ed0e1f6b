//! Terminal rendering of containment results.

use console::style;
use proxgate::engine::{ContainmentResult, GateStatus};
use proxgate::geo::TargetZone;

/// Human-friendly distance: meters below 1 km, kilometers above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1_000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.2} km", meters / 1_000.0)
    }
}

/// One styled status line for a result.
pub fn status_line(result: &ContainmentResult, zone: &TargetZone) -> String {
    match result.gate_status() {
        GateStatus::Determining => {
            format!("{} Determining location...", style("…").yellow().bold())
        }
        GateStatus::Open { distance_meters } => format!(
            "{} Within range: {} from venue{}",
            style("✓").green().bold(),
            format_distance(distance_meters),
            accuracy_suffix(result)
        ),
        GateStatus::Blocked {
            error: Some(error),
            last_distance_meters,
        } => {
            let mut line = format!("{} {}", style("✗").red().bold(), style(error).red());
            if let Some(d) = last_distance_meters {
                line.push_str(&format!(" (last known distance {})", format_distance(d)));
            }
            line
        }
        GateStatus::Blocked {
            error: None,
            last_distance_meters,
        } => {
            let distance = last_distance_meters
                .map(format_distance)
                .unwrap_or_else(|| "unknown distance".to_string());
            format!(
                "{} Too far: {} from venue, limit {}{}",
                style("✗").red().bold(),
                distance,
                format_distance(zone.radius_meters()),
                accuracy_suffix(result)
            )
        }
    }
}

fn accuracy_suffix(result: &ContainmentResult) -> String {
    match result.accuracy_meters() {
        Some(a) if a > 0.0 => format!(" {}", style(format!("(±{})", format_distance(a))).dim()),
        _ => String::new(),
    }
}

/// Banner describing the target.
pub fn target_banner(zone: &TargetZone) -> String {
    format!(
        "{} {} within {}",
        style("Venue:").bold(),
        zone.center(),
        format_distance(zone.radius_meters())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxgate::engine::evaluate;
    use proxgate::geo::Coordinate;
    use proxgate::sensor::{Fix, PositionError};

    fn zone() -> TargetZone {
        TargetZone::from_degrees(6.50837, 3.384247, 250.0).unwrap()
    }

    fn plain(result: &ContainmentResult) -> String {
        console::strip_ansi_codes(&status_line(result, &zone())).to_string()
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(12.4), "12 m");
        assert_eq!(format_distance(999.0), "999 m");
        assert_eq!(format_distance(1_234.0), "1.23 km");
    }

    #[test]
    fn test_determining() {
        assert_eq!(
            plain(&ContainmentResult::unknown()),
            "… Determining location..."
        );
    }

    #[test]
    fn test_open_and_too_far() {
        let inside = Fix::new(Coordinate::new(6.50837, 3.384247).unwrap(), 0.0);
        assert_eq!(plain(&evaluate(&zone(), &inside)), "✓ Within range: 0 m from venue");

        let far = Fix::new(Coordinate::new(6.515, 3.39).unwrap(), 0.0);
        let line = plain(&evaluate(&zone(), &far));
        assert!(line.starts_with("✗ Too far: "), "{line}");
        assert!(line.ends_with("limit 250 m"), "{line}");
    }

    #[test]
    fn test_error_is_verbatim() {
        let result = ContainmentResult::unknown()
            .failed(PositionError::PermissionDenied("User denied Geolocation".into()));
        assert_eq!(
            plain(&result),
            "✗ Location permission denied: User denied Geolocation"
        );
    }
}
