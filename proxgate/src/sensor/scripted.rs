//! Scriptable in-process sensor.
//!
//! Used by the test suite and by the CLI `simulate` command. One-shot reads
//! are served from a FIFO queue of [`ScriptedRead`]s; watch readings are
//! pushed explicitly with [`ScriptedSensor::emit`]. Every call is counted so
//! tests can assert that the engine did (or did not) touch the sensor.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    Fix, FixSink, LocationSensor, PositionError, PositionFuture, PositionOptions,
    SensorCapabilities, WatchId,
};

/// One queued answer for [`LocationSensor::current_position`].
#[derive(Debug, Clone)]
pub struct ScriptedRead {
    /// What the read resolves to.
    pub outcome: Result<Fix, PositionError>,
    /// How long the read takes before resolving.
    pub delay: Duration,
}

impl ScriptedRead {
    /// A read that immediately yields `fix`.
    pub fn fix(fix: Fix) -> Self {
        Self {
            outcome: Ok(fix),
            delay: Duration::ZERO,
        }
    }

    /// A read that immediately fails with `error`.
    pub fn error(error: PositionError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
        }
    }

    /// Delay resolution by `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scriptable [`LocationSensor`].
///
/// A one-shot read with nothing queued behaves like a sensor that never
/// answers: it resolves to [`PositionError::Timeout`] once the requested
/// timeout elapses. A queued read whose delay exceeds the timeout does the
/// same.
pub struct ScriptedSensor {
    capabilities: Mutex<SensorCapabilities>,
    reads: Mutex<VecDeque<ScriptedRead>>,
    watches: Mutex<HashMap<WatchId, FixSink>>,
    /// Sinks of cleared watches, kept to model platform callbacks that fire
    /// after cancellation.
    cleared: Mutex<Vec<FixSink>>,
    watch_failure: Mutex<Option<PositionError>>,
    options_seen: Mutex<Vec<PositionOptions>>,
    next_watch_id: AtomicU64,
    current_position_calls: AtomicUsize,
    watch_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl std::fmt::Debug for ScriptedSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSensor")
            .field("queued_reads", &self.reads.lock().len())
            .field("active_watches", &self.watches.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSensor {
    /// Create a sensor that reports full capability and has nothing queued.
    pub fn new() -> Self {
        Self::with_capabilities(SensorCapabilities::available())
    }

    /// Create a sensor with explicit capabilities.
    pub fn with_capabilities(capabilities: SensorCapabilities) -> Self {
        Self {
            capabilities: Mutex::new(capabilities),
            reads: Mutex::new(VecDeque::new()),
            watches: Mutex::new(HashMap::new()),
            cleared: Mutex::new(Vec::new()),
            watch_failure: Mutex::new(None),
            options_seen: Mutex::new(Vec::new()),
            next_watch_id: AtomicU64::new(1),
            current_position_calls: AtomicUsize::new(0),
            watch_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the reported capabilities.
    pub fn set_capabilities(&self, capabilities: SensorCapabilities) {
        *self.capabilities.lock() = capabilities;
    }

    /// Queue an answer for the next one-shot read.
    pub fn push_read(&self, read: ScriptedRead) {
        self.reads.lock().push_back(read);
    }

    /// Queue an immediate successful read.
    pub fn push_fix(&self, fix: Fix) {
        self.push_read(ScriptedRead::fix(fix));
    }

    /// Queue an immediate failed read.
    pub fn push_error(&self, error: PositionError) {
        self.push_read(ScriptedRead::error(error));
    }

    /// Make subsequent `watch_position` calls fail with `error`.
    pub fn fail_watch_with(&self, error: PositionError) {
        *self.watch_failure.lock() = Some(error);
    }

    /// Deliver a reading to every active watch. Returns how many received it.
    pub fn emit(&self, outcome: Result<Fix, PositionError>) -> usize {
        let watches = self.watches.lock();
        watches
            .values()
            .filter(|sink| sink.send(outcome.clone()).is_ok())
            .count()
    }

    /// Deliver a successful reading to every active watch.
    pub fn emit_fix(&self, fix: Fix) -> usize {
        self.emit(Ok(fix))
    }

    /// Deliver a reading to watches that were already cleared, as a
    /// misbehaving platform might. Returns how many sinks accepted it.
    pub fn emit_to_cleared(&self, outcome: Result<Fix, PositionError>) -> usize {
        let cleared = self.cleared.lock();
        cleared
            .iter()
            .filter(|sink| sink.send(outcome.clone()).is_ok())
            .count()
    }

    /// Number of one-shot reads requested so far.
    pub fn current_position_calls(&self) -> usize {
        self.current_position_calls.load(Ordering::SeqCst)
    }

    /// Number of watch subscriptions requested so far.
    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    /// Number of `clear_watch` calls so far.
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind that touched the sensor.
    pub fn total_calls(&self) -> usize {
        self.current_position_calls() + self.watch_calls() + self.clear_calls()
    }

    /// Number of watches currently subscribed.
    pub fn active_watches(&self) -> usize {
        self.watches.lock().len()
    }

    /// Number of one-shot reads still queued.
    pub fn queued_reads(&self) -> usize {
        self.reads.lock().len()
    }

    /// Options passed to every one-shot read, in call order.
    pub fn read_options(&self) -> Vec<PositionOptions> {
        self.options_seen.lock().clone()
    }
}

impl LocationSensor for ScriptedSensor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> SensorCapabilities {
        self.capabilities.lock().clone()
    }

    fn current_position(&self, options: PositionOptions) -> PositionFuture<'_> {
        self.current_position_calls.fetch_add(1, Ordering::SeqCst);
        self.options_seen.lock().push(options);
        let next = self.reads.lock().pop_front();

        Box::pin(async move {
            let timed_out = Err(PositionError::Timeout {
                after: options.timeout,
            });
            match next {
                Some(read) if read.delay <= options.timeout => {
                    if !read.delay.is_zero() {
                        tokio::time::sleep(read.delay).await;
                    }
                    read.outcome
                }
                _ => {
                    tokio::time::sleep(options.timeout).await;
                    timed_out
                }
            }
        })
    }

    fn watch_position(
        &self,
        _options: PositionOptions,
        sink: FixSink,
    ) -> Result<WatchId, PositionError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.watch_failure.lock().clone() {
            return Err(error);
        }
        let id = WatchId(self.next_watch_id.fetch_add(1, Ordering::SeqCst));
        self.watches.lock().insert(id, sink);
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(sink) = self.watches.lock().remove(&id) {
            self.cleared.lock().push(sink);
        }
    }
}
