//! Distance command - great-circle distance between two points.

use proxgate::geo::Coordinate;

use crate::error::CliError;
use crate::render::format_distance;

/// Run the distance command.
pub fn run(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(), CliError> {
    let from = Coordinate::new(lat1, lon1)?;
    let to = Coordinate::new(lat2, lon2)?;
    let meters = from.distance_to(&to);

    println!("From: {}", from);
    println!("To:   {}", to);
    println!("{} ({:.1} m)", format_distance(meters), meters);
    Ok(())
}
