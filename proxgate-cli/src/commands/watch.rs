//! Watch command - follow the gate until Ctrl+C.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use proxgate::config::ConfigFile;
use proxgate::engine::{
    ContainmentResult, EngineConfig, EngineError, ProximityEngine, StatsSnapshot,
};
use proxgate::geo::TargetZone;
use proxgate::sensor::LocationSensor;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::common::{build_runtime, gpsd_sensor};
use crate::error::CliError;
use crate::render;

/// Run the watch command.
pub fn run(
    zone: TargetZone,
    config: &ConfigFile,
    refresh_every: Option<u64>,
) -> Result<(), CliError> {
    println!("{}", render::target_banner(&zone));
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    let runtime = build_runtime()?;
    let stats = runtime.block_on(watch(
        zone,
        gpsd_sensor(config),
        config.engine_config(),
        refresh_every.map(Duration::from_secs),
        shutdown,
    ))?;

    println!();
    println!(
        "Stopped. {} watch fixes, {} watch errors, {} refreshes ({} failed).",
        stats.watch_fixes, stats.watch_errors, stats.refreshes, stats.refresh_failures
    );
    Ok(())
}

/// A scheduled refresh that has not finished yet.
type PendingRefresh<'a> =
    Pin<Box<dyn Future<Output = Result<ContainmentResult, EngineError>> + Send + 'a>>;

/// Print every published result until `shutdown` fires.
///
/// With `refresh_every`, a fresh reading is also forced on that period. A
/// refresh still in flight when `shutdown` fires is abandoned.
pub async fn watch(
    zone: TargetZone,
    sensor: Arc<dyn LocationSensor>,
    engine_config: EngineConfig,
    refresh_every: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<StatsSnapshot, CliError> {
    let engine = ProximityEngine::with_config(zone, sensor, engine_config);
    let mut results = engine.subscribe();

    match engine.start() {
        Ok(()) => {}
        Err(EngineError::Unavailable(_)) => {
            print_result(&engine, &zone);
            return Ok(engine.stats());
        }
        Err(e) => return Err(e.into()),
    }
    print_result(&engine, &zone);

    let mut ticker = refresh_every
        .filter(|period| !period.is_zero())
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    let mut refreshing: Option<PendingRefresh<'_>> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                results.borrow_and_update();
                print_result(&engine, &zone);
            }

            outcome = next_refresh(&mut refreshing) => {
                refreshing = None;
                if let Err(e) = outcome {
                    warn!(error = %e, "Scheduled refresh failed");
                }
            }

            _ = next_tick(&mut ticker) => {
                if refreshing.is_some() {
                    debug!("Previous refresh still running; skipping tick");
                } else {
                    let refresh: PendingRefresh<'_> = Box::pin(engine.refresh());
                    refreshing = Some(refresh);
                }
            }
        }
    }

    drop(refreshing);
    engine.stop();
    let stats = engine.stats();
    info!(
        watch_fixes = stats.watch_fixes,
        refreshes = stats.refreshes,
        "Watch ended"
    );
    Ok(stats)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_refresh<F: Future + Unpin>(pending: &mut Option<F>) -> F::Output {
    match pending {
        Some(refresh) => refresh.await,
        None => std::future::pending().await,
    }
}

fn print_result(engine: &ProximityEngine, zone: &TargetZone) {
    println!(
        "{} {}",
        console::style(Local::now().format("%H:%M:%S")).dim(),
        render::status_line(&engine.current(), zone)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxgate::geo::Coordinate;
    use proxgate::sensor::{Fix, ScriptedSensor, SensorCapabilities};

    fn zone() -> TargetZone {
        TargetZone::from_degrees(6.50837, 3.384247, 250.0).unwrap()
    }

    fn at_venue() -> Fix {
        Fix::new(Coordinate::new(6.50837, 3.384247).unwrap(), 5.0)
    }

    #[tokio::test]
    async fn test_watch_until_shutdown() {
        let sensor = Arc::new(ScriptedSensor::new());
        sensor.push_fix(at_venue());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(watch(
            zone(),
            sensor.clone(),
            EngineConfig::default(),
            None,
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sensor.emit_fix(at_venue()), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.initial_reads, 1);
        assert_eq!(stats.watch_fixes, 1);
        assert_eq!(sensor.active_watches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_refresh() {
        let sensor = Arc::new(ScriptedSensor::new());
        sensor.push_fix(at_venue());
        sensor.push_fix(at_venue());
        sensor.push_fix(at_venue());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(watch(
            zone(),
            sensor.clone(),
            EngineConfig::default(),
            Some(Duration::from_secs(10)),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.refreshes, 2);
        assert_eq!(sensor.current_position_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_not_held_by_pending_refresh() {
        let sensor = Arc::new(ScriptedSensor::new());
        sensor.push_fix(at_venue());
        let shutdown = CancellationToken::new();

        // Nothing queued after the initial read, so the first refresh hangs
        // until its 15 s timeout
        let task = tokio::spawn(watch(
            zone(),
            sensor.clone(),
            EngineConfig::default(),
            Some(Duration::from_secs(1)),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(sensor.current_position_calls(), 2);

        let cancelled_at = Instant::now();
        shutdown.cancel();
        let stats = task.await.unwrap().unwrap();

        assert!(cancelled_at.elapsed() < Duration::from_millis(100));
        assert_eq!(stats.refreshes, 0);
        assert_eq!(sensor.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_sensor_returns_immediately() {
        let sensor = Arc::new(ScriptedSensor::with_capabilities(
            SensorCapabilities::insecure("remote gpsd"),
        ));
        let stats = watch(
            zone(),
            sensor.clone(),
            EngineConfig::default(),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats, StatsSnapshot::default());
        assert_eq!(sensor.total_calls(), 0);
    }
}
