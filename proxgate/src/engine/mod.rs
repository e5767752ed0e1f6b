//! Proximity verification engine.
//!
//! The [`ProximityEngine`] answers one question for a gating UI: is this
//! device within `radius` meters of the venue? It reconciles a continuous
//! background watch with on-demand rechecks, compensates for sensor
//! uncertainty, and fails closed on every error.
//!
//! # Lifecycle
//!
//! ```text
//! new(zone, sensor) ──► start() ──► { watch fixes, initial read, refresh() } ──► stop()
//!   (no I/O)            │                 all feed one session actor           (frozen result)
//!                       └─ fatal precondition: publish Outside + error, no sensor calls
//! ```
//!
//! # Example
//!
//! ```ignore
//! use proxgate::engine::ProximityEngine;
//! use proxgate::geo::TargetZone;
//! use proxgate::sensor::{GpsdSensor, GpsdSensorConfig};
//! use std::sync::Arc;
//!
//! let zone = TargetZone::from_degrees(6.50837, 3.384247, 250.0)?;
//! let engine = ProximityEngine::new(zone, Arc::new(GpsdSensor::new(GpsdSensorConfig::default())));
//! engine.start()?;
//!
//! // Just before submitting the claim, insist on a fresh reading
//! let result = engine.refresh().await?;
//! if result.gate_status().is_open() {
//!     submit_claim().await?;
//! }
//! engine.stop();
//! ```

mod config;
mod evaluate;
mod result;
mod session;
mod stats;

pub use config::{
    EngineConfig, DEFAULT_REFRESH_TIMEOUT, DEFAULT_WATCH_MAXIMUM_AGE, DEFAULT_WATCH_TIMEOUT,
};
pub use evaluate::{effective_distance, evaluate};
pub use result::{Containment, ContainmentResult, GateStatus};
pub use stats::{EngineStats, StatsSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::TargetZone;
use crate::sensor::{Fix, LocationSensor, PositionError, PositionOptions, WatchId};
use session::{Publisher, ReadOrigin, SessionActor, SessionCommand, SessionId};

/// Errors returned by engine operations.
///
/// Sensor failures during normal operation are not errors here: they are
/// published in the [`ContainmentResult`] with the gate closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A fatal precondition failed at `start()`.
    #[error(transparent)]
    Unavailable(#[from] PositionError),

    /// `start()` was called outside a Tokio runtime.
    #[error("Proximity engine must be started from within a Tokio runtime")]
    NoRuntime,

    /// The operation needs a running engine.
    #[error("Proximity engine is not running; call start() first")]
    NotRunning,
}

/// Live subscription state for one start/stop cycle.
struct EngineSession {
    id: SessionId,
    watch_id: Option<WatchId>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

/// Decides whether the device is within a [`TargetZone`].
///
/// Owns its sensor subscription exclusively. Independent engines share no
/// state and may run side by side with different zones.
pub struct ProximityEngine {
    zone: TargetZone,
    sensor: Arc<dyn LocationSensor>,
    config: EngineConfig,
    publisher: Arc<Publisher>,
    stats: Arc<EngineStats>,
    session: Mutex<Option<EngineSession>>,
    next_session: AtomicU64,
}

impl std::fmt::Debug for ProximityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityEngine")
            .field("zone", &self.zone)
            .field("sensor", &self.sensor.name())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ProximityEngine {
    /// Create an engine with default timing. Performs no I/O.
    pub fn new(zone: TargetZone, sensor: Arc<dyn LocationSensor>) -> Self {
        Self::with_config(zone, sensor, EngineConfig::default())
    }

    /// Create an engine with explicit timing. Performs no I/O.
    pub fn with_config(
        zone: TargetZone,
        sensor: Arc<dyn LocationSensor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            zone,
            sensor,
            config,
            publisher: Arc::new(Publisher::new()),
            stats: Arc::new(EngineStats::new()),
            session: Mutex::new(None),
            next_session: AtomicU64::new(1),
        }
    }

    /// Begin monitoring: open the watch and issue one immediate read.
    ///
    /// If the sensor reports no capability or an insecure context, the gate
    /// is published closed with that error, the sensor is not touched, and
    /// the error is returned. Calling `start()` on a running engine does
    /// nothing.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut session = self.session.lock();
        if let Some(active) = session.as_ref() {
            debug!(session = %active.id, "Proximity engine already running");
            return Ok(());
        }

        if let Err(fatal) = self.sensor.capabilities().check() {
            warn!(
                sensor = self.sensor.name(),
                error = %fatal,
                "Location unavailable; gate closed"
            );
            self.publisher
                .publish_unscoped(self.publisher.current().failed(fatal.clone()));
            return Err(EngineError::Unavailable(fatal));
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (reading_tx, reading_rx) = mpsc::unbounded_channel();

        self.publisher.open(id);

        let watch_id = match self.sensor.watch_position(self.config.watch, reading_tx) {
            Ok(watch_id) => Some(watch_id),
            Err(error) => {
                // The watch is best effort; one-shot reads still work
                warn!(session = %id, error = %error, "Could not open position watch");
                None
            }
        };

        let actor = SessionActor::new(
            id,
            self.zone,
            Arc::clone(&self.publisher),
            Arc::clone(&self.stats),
        );
        runtime.spawn(actor.run(command_rx, reading_rx, cancel.clone()));
        runtime.spawn(run_initial_read(
            Arc::clone(&self.sensor),
            self.config.initial_read,
            command_tx.clone(),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));

        info!(
            session = %id,
            sensor = self.sensor.name(),
            zone = %self.zone,
            watching = watch_id.is_some(),
            "Proximity engine started"
        );

        *session = Some(EngineSession {
            id,
            watch_id,
            commands: command_tx,
            cancel,
        });
        Ok(())
    }

    /// Take one fresh high-accuracy reading and publish the outcome.
    ///
    /// Read failures close the gate and are reported in the returned result.
    /// Concurrent refreshes are fine; the last one delivered wins. Returns
    /// [`EngineError::NotRunning`] if the engine was never started or has
    /// stopped, except after a fatal start, where the frozen fatal result is
    /// returned without touching the sensor.
    ///
    /// If `stop()` runs while the read is in flight, the read is abandoned
    /// and the frozen result is returned. That result is not a fresh
    /// reading; compare its timestamp or check [`is_running`] afterwards.
    ///
    /// [`is_running`]: ProximityEngine::is_running
    pub async fn refresh(&self) -> Result<ContainmentResult, EngineError> {
        let (id, commands, cancel) = {
            let session = self.session.lock();
            match session.as_ref() {
                Some(active) => (active.id, active.commands.clone(), active.cancel.clone()),
                None => {
                    let current = self.current();
                    if current.error().is_some_and(PositionError::is_fatal) {
                        return Ok(current);
                    }
                    return Err(EngineError::NotRunning);
                }
            }
        };

        debug!(session = %id, "Refreshing position");
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.current()),
            outcome = read_position(self.sensor.as_ref(), self.config.refresh) => outcome,
        };

        self.stats.refresh(outcome.is_err());
        if let Err(error) = &outcome {
            warn!(session = %id, error = %error, "Refresh failed");
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let command = SessionCommand::Apply {
            origin: ReadOrigin::Refresh,
            outcome,
            reply: Some(reply_tx),
        };
        if commands.send(command).is_err() {
            return Ok(self.current());
        }
        Ok(reply_rx.await.unwrap_or_else(|_| self.current()))
    }

    /// Cancel the watch and freeze the published result.
    ///
    /// Synchronous: once this returns no further update is published, even
    /// for readings already in flight. Calling it when not running is a
    /// no-op.
    pub fn stop(&self) {
        let Some(session) = self.session.lock().take() else {
            debug!("Proximity engine not running; stop ignored");
            return;
        };

        self.publisher.close(session.id);
        if let Some(watch_id) = session.watch_id {
            self.sensor.clear_watch(watch_id);
        }
        session.cancel.cancel();

        info!(session = %session.id, "Proximity engine stopped");
    }

    /// The latest published result.
    pub fn current(&self) -> ContainmentResult {
        self.publisher.current()
    }

    /// Subscribe to published results.
    ///
    /// Do not hold a borrow of the receiver across calls into the engine.
    pub fn subscribe(&self) -> watch::Receiver<ContainmentResult> {
        self.publisher.subscribe()
    }

    /// Wait until the containment is no longer unknown.
    ///
    /// Returns the current result straight away when the engine is not
    /// running, and as soon as `stop()` is called while waiting. In both
    /// cases the result may still be unknown.
    pub async fn wait_until_known(&self) -> ContainmentResult {
        let Some(cancel) = self.session.lock().as_ref().map(|s| s.cancel.clone()) else {
            return self.current();
        };
        let mut results = self.subscribe();
        let known = tokio::select! {
            biased;
            outcome = results.wait_for(|r| r.containment().is_known()) => {
                outcome.map(|result| result.clone()).ok()
            }
            _ = cancel.cancelled() => None,
        };
        known.unwrap_or_else(|| self.current())
    }

    /// True between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// The zone this engine checks against.
    pub fn zone(&self) -> &TargetZone {
        &self.zone
    }

    /// The engine's timing configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for ProximityEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One-shot read bounded by `options.timeout`, whether or not the sensor
/// honours it.
async fn read_position(
    sensor: &dyn LocationSensor,
    options: PositionOptions,
) -> Result<Fix, PositionError> {
    match tokio::time::timeout(options.timeout, sensor.current_position(options)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PositionError::Timeout {
            after: options.timeout,
        }),
    }
}

async fn run_initial_read(
    sensor: Arc<dyn LocationSensor>,
    options: PositionOptions,
    commands: mpsc::UnboundedSender<SessionCommand>,
    stats: Arc<EngineStats>,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        outcome = read_position(sensor.as_ref(), options) => outcome,
    };
    stats.initial_read(outcome.is_err());
    let _ = commands.send(SessionCommand::Apply {
        origin: ReadOrigin::Initial,
        outcome,
        reply: None,
    });
}
