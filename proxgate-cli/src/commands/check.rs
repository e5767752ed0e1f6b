//! Check command - take one fresh reading and report the gate.

use std::sync::Arc;

use proxgate::config::ConfigFile;
use proxgate::engine::{EngineError, ProximityEngine};
use proxgate::geo::TargetZone;
use proxgate::sensor::LocationSensor;
use tracing::info;

use super::common::{build_runtime, gpsd_sensor};
use crate::error::CliError;
use crate::render;

/// Run the check command. Returns whether the device is within range.
pub fn run(zone: TargetZone, config: &ConfigFile) -> Result<bool, CliError> {
    println!("{}", render::target_banner(&zone));

    let sensor = gpsd_sensor(config);
    let runtime = build_runtime()?;
    runtime.block_on(check(zone, sensor, config))
}

/// Start an engine, refresh once, print the result, and stop.
pub async fn check(
    zone: TargetZone,
    sensor: Arc<dyn LocationSensor>,
    config: &ConfigFile,
) -> Result<bool, CliError> {
    let engine = ProximityEngine::with_config(zone, sensor, config.engine_config());

    let result = match engine.start() {
        Ok(()) => engine.refresh().await?,
        // Fatal preconditions are already published as a closed gate
        Err(EngineError::Unavailable(_)) => engine.current(),
        Err(e) => return Err(e.into()),
    };
    engine.stop();

    println!("{}", render::status_line(&result, &zone));
    info!(
        containment = %result.containment(),
        distance_m = ?result.distance_meters(),
        "Check complete"
    );
    Ok(result.gate_status().is_open())
}
