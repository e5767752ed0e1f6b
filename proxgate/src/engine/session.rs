//! Session actor and publication gate.
//!
//! Each running engine has one [`SessionActor`] task that owns the mutable
//! containment state. Readings reach it from two producers:
//!
//! ```text
//! ┌──────────────┐  readings (mpsc)   ┌───────────────┐  watch::Sender  ┌──────────┐
//! │ sensor watch │ ─────────────────► │               │ ──────────────► │          │
//! └──────────────┘                    │ SessionActor  │                 │ consumer │
//! ┌──────────────┐  commands (mpsc)   │ (single owner │   via Publisher │          │
//! │ initial read │ ─────────────────► │  of state)    │                 └──────────┘
//! │ refresh()    │ ◄── oneshot reply ─│               │
//! └──────────────┘                    └───────────────┘
//! ```
//!
//! Every write goes through [`Publisher::publish`], which holds the gate
//! lock while sending. `stop()` closes the gate under the same lock, so once
//! it returns no reading queued before or after can change the result.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::evaluate::evaluate;
use super::stats::EngineStats;
use super::ContainmentResult;
use crate::geo::TargetZone;
use crate::sensor::{Fix, PositionError};

/// Identifies one start/stop cycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Owns the result channel and decides which session may write to it.
pub(crate) struct Publisher {
    results: watch::Sender<ContainmentResult>,
    live: Mutex<Option<SessionId>>,
}

impl Publisher {
    pub(crate) fn new() -> Self {
        let (results, _) = watch::channel(ContainmentResult::unknown());
        Self {
            results,
            live: Mutex::new(None),
        }
    }

    /// Allow `session` to publish.
    pub(crate) fn open(&self, session: SessionId) {
        *self.live.lock() = Some(session);
    }

    /// Stop `session` from publishing. Returns once no publish is in flight.
    pub(crate) fn close(&self, session: SessionId) {
        let mut live = self.live.lock();
        if *live == Some(session) {
            *live = None;
        }
    }

    /// Publish on behalf of `session`. Returns false if the session is no
    /// longer live, in which case nothing changes.
    pub(crate) fn publish(&self, session: SessionId, result: ContainmentResult) -> bool {
        let live = self.live.lock();
        if *live != Some(session) {
            return false;
        }
        self.results.send_replace(result);
        true
    }

    /// Publish outside any session. Only used for fatal start failures,
    /// when no session exists to race with.
    pub(crate) fn publish_unscoped(&self, result: ContainmentResult) {
        let _live = self.live.lock();
        self.results.send_replace(result);
    }

    pub(crate) fn current(&self) -> ContainmentResult {
        self.results.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ContainmentResult> {
        self.results.subscribe()
    }
}

/// Which read path produced a one-shot outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOrigin {
    Initial,
    Refresh,
}

impl ReadOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            ReadOrigin::Initial => "initial",
            ReadOrigin::Refresh => "refresh",
        }
    }
}

/// Messages from one-shot readers to the actor.
pub(crate) enum SessionCommand {
    /// Apply a one-shot read outcome. Failures are published fail-closed.
    Apply {
        origin: ReadOrigin,
        outcome: Result<Fix, PositionError>,
        reply: Option<oneshot::Sender<ContainmentResult>>,
    },
}

/// Single writer of a session's containment state.
pub(crate) struct SessionActor {
    id: SessionId,
    zone: TargetZone,
    publisher: Arc<Publisher>,
    stats: Arc<EngineStats>,
    current: ContainmentResult,
}

impl SessionActor {
    pub(crate) fn new(
        id: SessionId,
        zone: TargetZone,
        publisher: Arc<Publisher>,
        stats: Arc<EngineStats>,
    ) -> Self {
        let current = publisher.current();
        Self {
            id,
            zone,
            publisher,
            stats,
            current,
        }
    }

    /// Process readings and commands until cancelled.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut readings: mpsc::UnboundedReceiver<Result<Fix, PositionError>>,
        cancel: CancellationToken,
    ) {
        debug!(session = %self.id, "Session actor starting");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(command) = commands.recv() => self.handle_command(command),

                Some(reading) = readings.recv() => self.handle_watch_reading(reading),
            }
        }

        debug!(session = %self.id, "Session actor stopped");
    }

    fn handle_watch_reading(&mut self, reading: Result<Fix, PositionError>) {
        match reading {
            Ok(fix) => {
                let result = evaluate(&self.zone, &fix);
                self.log_fix("watch", &result);
                if self.publish(result) {
                    self.stats.watch_fix();
                }
            }
            Err(error) => {
                // Background failures never reach the consumer
                self.stats.watch_error();
                warn!(
                    session = %self.id,
                    error = %error,
                    "Watch reading failed; keeping last result"
                );
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Apply {
                origin,
                outcome,
                reply,
            } => {
                let result = match outcome {
                    Ok(fix) => {
                        let result = evaluate(&self.zone, &fix);
                        self.log_fix(origin.as_str(), &result);
                        result
                    }
                    Err(error) => {
                        info!(
                            session = %self.id,
                            origin = origin.as_str(),
                            error = %error,
                            "Read failed; gate closed"
                        );
                        self.current.failed(error)
                    }
                };
                self.publish(result);
                if let Some(reply) = reply {
                    let _ = reply.send(self.current.clone());
                }
            }
        }
    }

    fn publish(&mut self, result: ContainmentResult) -> bool {
        if self.publisher.publish(self.id, result.clone()) {
            self.current = result;
            true
        } else {
            self.stats.stale_dropped();
            debug!(session = %self.id, "Dropped update for stopped session");
            false
        }
    }

    fn log_fix(&self, origin: &str, result: &ContainmentResult) {
        debug!(
            session = %self.id,
            origin,
            containment = %result.containment(),
            distance_m = result.distance_meters().unwrap_or_default(),
            accuracy_m = result.accuracy_meters().unwrap_or_default(),
            radius_m = self.zone.radius_meters(),
            "Evaluated fix"
        );
    }
}
