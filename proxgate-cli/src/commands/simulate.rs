//! Simulate command - replay a scripted sequence of readings.
//!
//! A script is a JSON document:
//!
//! ```json
//! {
//!   "target": { "latitude": 6.50837, "longitude": 3.384247, "radius_meters": 250 },
//!   "initial": { "fix": { "latitude": 6.50837, "longitude": 3.384247, "accuracy_meters": 5 } },
//!   "steps": [
//!     { "action": "watch", "fix": { "latitude": 6.515, "longitude": 3.39, "accuracy_meters": 10 } },
//!     { "action": "refresh", "error": { "kind": "permission_denied", "message": "User denied Geolocation" } },
//!     { "action": "wait", "ms": 500 },
//!     { "action": "stop" },
//!     { "action": "watch", "fix": { "latitude": 6.50837, "longitude": 3.384247 } }
//!   ]
//! }
//! ```
//!
//! `unsupported` or `insecure` at the top level (a reason string) makes the
//! simulated platform fail its preconditions.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use proxgate::config::{ConfigFile, DEFAULT_RADIUS_METERS};
use proxgate::engine::{
    ContainmentResult, EngineConfig, EngineError, ProximityEngine, StatsSnapshot,
};
use proxgate::geo::{Coordinate, TargetZone};
use proxgate::sensor::{Fix, PositionError, ScriptedRead, ScriptedSensor, SensorCapabilities};
use serde::Deserialize;
use tracing::debug;

use super::common::{build_runtime, resolve_zone, TargetArgs};
use crate::error::CliError;
use crate::render;

/// Upper bound on waiting for the engine to absorb a step.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// A simulation script.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Venue; CLI target flags take precedence.
    #[serde(default)]
    pub target: Option<ScriptTarget>,
    /// Platform lacks location support, for this reason.
    #[serde(default)]
    pub unsupported: Option<String>,
    /// Context is insecure, for this reason.
    #[serde(default)]
    pub insecure: Option<String>,
    /// Outcome of the read issued at start.
    #[serde(default)]
    pub initial: Option<ScriptReading>,
    /// Actions replayed in order after start.
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptTarget {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_METERS
}

/// One reading: exactly one of `fix` or `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptReading {
    #[serde(default)]
    pub fix: Option<ScriptFix>,
    #[serde(default)]
    pub error: Option<ScriptError>,
    /// How long a one-shot read takes.
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_meters: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptErrorKind {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Deliver a reading through the watch.
    Watch(ScriptReading),
    /// Force a fresh read that resolves to the given reading.
    Refresh(ScriptReading),
    /// Pause.
    Wait { ms: u64 },
    /// Stop the engine.
    Stop,
    /// Start again after a stop.
    Start {
        #[serde(default)]
        initial: Option<ScriptReading>,
    },
}

impl ScriptReading {
    /// The sensor outcome. `timeout` is what a timeout error reports.
    pub fn outcome(&self, timeout: Duration) -> Result<Result<Fix, PositionError>, CliError> {
        match (&self.fix, &self.error) {
            (Some(fix), None) => {
                let coordinate = Coordinate::new(fix.latitude, fix.longitude)?;
                Ok(Ok(Fix::new(coordinate, fix.accuracy_meters)))
            }
            (None, Some(error)) => Ok(Err(error.to_position_error(timeout))),
            _ => Err(CliError::Script(
                "each reading needs exactly one of \"fix\" or \"error\"".to_string(),
            )),
        }
    }

    fn to_read(&self, timeout: Duration) -> Result<ScriptedRead, CliError> {
        Ok(ScriptedRead {
            outcome: self.outcome(timeout)?,
            delay: Duration::from_millis(self.delay_ms),
        })
    }
}

impl ScriptError {
    fn to_position_error(&self, timeout: Duration) -> PositionError {
        match self.kind {
            ScriptErrorKind::PermissionDenied => PositionError::PermissionDenied(self.message.clone()),
            ScriptErrorKind::PositionUnavailable => {
                PositionError::PositionUnavailable(self.message.clone())
            }
            ScriptErrorKind::Timeout => PositionError::Timeout { after: timeout },
        }
    }
}

impl Script {
    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Script(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            CliError::Script(msg) => CliError::Script(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse script JSON.
    pub fn parse(text: &str) -> Result<Self, CliError> {
        serde_json::from_str(text).map_err(|e| CliError::Script(e.to_string()))
    }

    fn capabilities(&self) -> SensorCapabilities {
        SensorCapabilities {
            unsupported_reason: self.unsupported.clone(),
            insecure_reason: self.insecure.clone(),
        }
    }

    /// Venue for this run: CLI flags, then the script, then config.
    pub fn zone(&self, args: &TargetArgs, config: &ConfigFile) -> Result<TargetZone, CliError> {
        match &self.target {
            Some(target) if args.lat.is_none() && args.lon.is_none() => {
                let radius = args.radius.unwrap_or(target.radius_meters);
                Ok(TargetZone::from_degrees(
                    target.latitude,
                    target.longitude,
                    radius,
                )?)
            }
            _ => resolve_zone(args, config),
        }
    }
}

/// Run the simulate command.
pub fn run(path: &Path, args: &TargetArgs, config: &ConfigFile) -> Result<(), CliError> {
    let script = Script::load(path)?;
    let zone = script.zone(args, config)?;
    println!("{}", render::target_banner(&zone));
    println!();

    let runtime = build_runtime()?;
    let stats = runtime.block_on(simulate(
        zone,
        &script,
        config.engine_config(),
        |label, result| {
            println!("{:<18} {}", label, render::status_line(result, &zone));
        },
    ))?;

    println!();
    println!(
        "{} watch fixes, {} watch errors, {} refreshes ({} failed), {} stale updates dropped",
        stats.watch_fixes,
        stats.watch_errors,
        stats.refreshes,
        stats.refresh_failures,
        stats.stale_dropped
    );
    Ok(())
}

/// Replay `script` against a scripted sensor, reporting after every step.
pub async fn simulate(
    zone: TargetZone,
    script: &Script,
    engine_config: EngineConfig,
    mut report: impl FnMut(&str, &ContainmentResult),
) -> Result<StatsSnapshot, CliError> {
    let sensor = Arc::new(ScriptedSensor::with_capabilities(script.capabilities()));
    let engine = ProximityEngine::with_config(zone, sensor.clone(), engine_config);

    start(&engine, &sensor, script.initial.as_ref(), &engine_config).await?;
    report("start", &engine.current());

    for (index, step) in script.steps.iter().enumerate() {
        let number = index + 1;
        debug!(step = number, ?step, "Simulation step");
        let label = match step {
            ScriptStep::Watch(reading) => {
                let before = absorbed(&engine);
                if sensor.emit(reading.outcome(engine_config.watch.timeout)?) > 0 {
                    settle(|| absorbed(&engine) > before).await?;
                }
                "watch"
            }
            ScriptStep::Refresh(reading) => {
                if engine.is_running() {
                    sensor.push_read(reading.to_read(engine_config.refresh.timeout)?);
                }
                match engine.refresh().await {
                    Ok(_) => "refresh",
                    Err(EngineError::NotRunning) => "refresh (stopped)",
                    Err(e) => return Err(e.into()),
                }
            }
            ScriptStep::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                "wait"
            }
            ScriptStep::Stop => {
                engine.stop();
                "stop"
            }
            ScriptStep::Start { initial } => {
                start(&engine, &sensor, initial.as_ref(), &engine_config).await?;
                "start"
            }
        };
        report(&format!("[{:>2}] {}", number, label), &engine.current());
    }

    engine.stop();
    Ok(engine.stats())
}

/// Start the engine and wait until the initial read has been taken, and
/// applied if one was scripted.
async fn start(
    engine: &ProximityEngine,
    sensor: &ScriptedSensor,
    initial: Option<&ScriptReading>,
    engine_config: &EngineConfig,
) -> Result<(), CliError> {
    if engine.is_running() {
        return Ok(());
    }
    if let Some(reading) = initial {
        sensor.push_read(reading.to_read(engine_config.initial_read.timeout)?);
    }

    let calls_before = sensor.current_position_calls();
    let mut results = engine.subscribe();
    results.borrow_and_update();

    match engine.start() {
        Ok(()) => {}
        Err(EngineError::Unavailable(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    if initial.is_some() {
        let wait = engine_config.initial_read.timeout + SETTLE_TIMEOUT;
        tokio::time::timeout(wait, results.changed())
            .await
            .map_err(|_| CliError::Script("initial read was never applied".to_string()))?
            .map_err(|_| CliError::Script("engine closed during start".to_string()))?;
    } else {
        // Keep the pending initial read from consuming a scripted refresh
        settle(|| sensor.current_position_calls() > calls_before).await?;
    }
    Ok(())
}

fn absorbed(engine: &ProximityEngine) -> u64 {
    let stats = engine.stats();
    stats.watch_fixes + stats.watch_errors + stats.stale_dropped
}

async fn settle(mut done: impl FnMut() -> bool) -> Result<(), CliError> {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| CliError::Script("engine did not absorb the step in time".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxgate::engine::Containment;

    const LAGOS: &str = r#"{
        "target": { "latitude": 6.50837, "longitude": 3.384247 },
        "initial": { "fix": { "latitude": 6.50837, "longitude": 3.384247, "accuracy_meters": 5 } },
        "steps": [
            { "action": "watch", "fix": { "latitude": 6.515, "longitude": 3.39, "accuracy_meters": 10 } },
            { "action": "refresh", "error": { "kind": "position_unavailable", "message": "no satellites" } },
            { "action": "watch", "error": { "kind": "timeout" } },
            { "action": "stop" },
            { "action": "watch", "fix": { "latitude": 6.50837, "longitude": 3.384247 } },
            { "action": "refresh", "fix": { "latitude": 6.50837, "longitude": 3.384247 } }
        ]
    }"#;

    async fn replay(script: &Script) -> (Vec<(String, ContainmentResult)>, StatsSnapshot) {
        let zone = script
            .zone(&TargetArgs::default(), &ConfigFile::default())
            .unwrap();
        let mut seen = Vec::new();
        let stats = simulate(zone, script, EngineConfig::default(), |label, result| {
            seen.push((label.to_string(), result.clone()))
        })
        .await
        .unwrap();
        (seen, stats)
    }

    #[test]
    fn test_parse_script() {
        let script = Script::parse(LAGOS).unwrap();
        assert_eq!(script.steps.len(), 6);
        assert_eq!(script.target.as_ref().unwrap().radius_meters, DEFAULT_RADIUS_METERS);
        assert!(matches!(script.steps[3], ScriptStep::Stop));
    }

    #[test]
    fn test_reading_needs_one_outcome() {
        let reading = ScriptReading {
            fix: None,
            error: None,
            delay_ms: 0,
        };
        assert!(matches!(
            reading.outcome(Duration::from_secs(1)),
            Err(CliError::Script(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Script::parse(r#"{ "stepz": [] }"#).is_err());
    }

    #[tokio::test]
    async fn test_lagos_replay() {
        let script = Script::parse(LAGOS).unwrap();
        let (seen, stats) = replay(&script).await;

        let labels: Vec<&str> = seen.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(
            labels,
            [
                "start",
                "[ 1] watch",
                "[ 2] refresh",
                "[ 3] watch",
                "[ 4] stop",
                "[ 5] watch",
                "[ 6] refresh (stopped)"
            ]
        );

        assert_eq!(seen[0].1.containment(), Containment::Inside);
        assert_eq!(seen[1].1.containment(), Containment::Outside);
        let distance = seen[1].1.distance_meters().unwrap();
        assert!((900.0..=1000.0).contains(&distance));

        // Refresh failure closes the gate but keeps the last distance
        assert_eq!(seen[2].1.containment(), Containment::Outside);
        assert_eq!(seen[2].1.distance_meters(), Some(distance));
        assert!(seen[2].1.error().is_some());

        // Watch errors are absorbed; stopped engine stays frozen
        assert_eq!(seen[3].1, seen[2].1);
        assert_eq!(seen[5].1, seen[2].1);
        assert_eq!(seen[6].1, seen[2].1);

        assert_eq!(stats.watch_fixes, 1);
        assert_eq!(stats.watch_errors, 1);
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.refresh_failures, 1);
    }

    #[tokio::test]
    async fn test_insecure_platform() {
        let script = Script::parse(
            r#"{
                "target": { "latitude": 6.50837, "longitude": 3.384247 },
                "insecure": "plain http",
                "steps": [ { "action": "refresh", "fix": { "latitude": 6.50837, "longitude": 3.384247 } } ]
            }"#,
        )
        .unwrap();
        let (seen, stats) = replay(&script).await;

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1.containment(), Containment::Outside);
        assert!(matches!(
            seen[0].1.error(),
            Some(PositionError::InsecureContext(_))
        ));
        // Refresh returns the frozen fatal result
        assert_eq!(seen[1].0, "[ 1] refresh");
        assert_eq!(seen[1].1, seen[0].1);
        assert_eq!(stats.refreshes, 0);
    }

    #[tokio::test]
    async fn test_restart_with_new_initial() {
        let script = Script::parse(
            r#"{
                "target": { "latitude": 6.50837, "longitude": 3.384247 },
                "initial": { "fix": { "latitude": 6.515, "longitude": 3.39 } },
                "steps": [
                    { "action": "stop" },
                    { "action": "start", "initial": { "fix": { "latitude": 6.50837, "longitude": 3.384247 } } }
                ]
            }"#,
        )
        .unwrap();
        let (seen, stats) = replay(&script).await;

        assert_eq!(seen[0].1.containment(), Containment::Outside);
        assert_eq!(seen[2].1.containment(), Containment::Inside);
        assert_eq!(stats.initial_reads, 2);
    }
}
