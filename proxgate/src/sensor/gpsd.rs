//! gpsd-backed location sensor.
//!
//! Talks to a gpsd daemon over its JSON socket protocol. After connecting the
//! sensor enables watcher mode and consumes `TPV` (time-position-velocity)
//! reports:
//!
//! ```text
//! client → ?WATCH={"enable":true,"json":true};
//! gpsd   → {"class":"VERSION",...}
//! gpsd   → {"class":"TPV","mode":3,"time":"...","lat":6.50837,"lon":3.384247,"epx":4.1,"epy":5.3}
//! ```
//!
//! # Mapping to the sensor contract
//!
//! - Capability: always supported when an address is configured. The context
//!   counts as secure only for loopback addresses, since the protocol is
//!   plain TCP; remote daemons require `allow_remote`.
//! - Accuracy: `max(epx, epy)`, falling back to `eph`, then to zero (no
//!   uncertainty compensation) when the receiver reports no estimate.
//! - `high_accuracy` requires a 3D fix (mode 3) unless `accept_2d_fix` is set.
//!   Other reads accept a 2D fix (mode 2).
//! - `maximum_age` is served from the last fix this sensor saw.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{
    Fix, FixSink, LocationSensor, PositionError, PositionFuture, PositionOptions,
    SensorCapabilities, WatchId,
};
use crate::geo::Coordinate;

/// Default gpsd listen address.
pub const DEFAULT_GPSD_ADDRESS: &str = "127.0.0.1:2947";

/// Delay before a watch reconnects after losing gpsd.
const WATCH_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Command that switches gpsd into JSON watcher mode.
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// gpsd fix mode for a 2D fix.
const MODE_2D: u8 = 2;

/// gpsd fix mode for a 3D fix.
const MODE_3D: u8 = 3;

/// Configuration for [`GpsdSensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsdSensorConfig {
    /// `host:port` of the gpsd daemon.
    pub address: String,
    /// Accept a non-loopback daemon even though the link is unencrypted.
    pub allow_remote: bool,
    /// Let high-accuracy reads use a 2D fix, for receivers that never
    /// report altitude.
    pub accept_2d_fix: bool,
}

impl Default for GpsdSensorConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_GPSD_ADDRESS.to_string(),
            allow_remote: false,
            accept_2d_fix: false,
        }
    }
}

impl GpsdSensorConfig {
    /// Create a config for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            allow_remote: false,
            accept_2d_fix: false,
        }
    }

    /// Allow or refuse a non-loopback daemon.
    pub fn with_allow_remote(mut self, allow_remote: bool) -> Self {
        self.allow_remote = allow_remote;
        self
    }

    /// Accept 2D fixes for high-accuracy reads.
    pub fn with_accept_2d_fix(mut self, accept_2d_fix: bool) -> Self {
        self.accept_2d_fix = accept_2d_fix;
        self
    }

    /// Lowest gpsd fix mode that satisfies `options`.
    pub fn required_mode(&self, options: &PositionOptions) -> u8 {
        if options.high_accuracy && !self.accept_2d_fix {
            MODE_3D
        } else {
            MODE_2D
        }
    }
}

/// [`LocationSensor`] backed by a gpsd daemon.
pub struct GpsdSensor {
    config: GpsdSensorConfig,
    last_fix: Arc<Mutex<Option<Fix>>>,
    watches: Mutex<HashMap<WatchId, CancellationToken>>,
    next_watch_id: AtomicU64,
}

impl std::fmt::Debug for GpsdSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsdSensor")
            .field("config", &self.config)
            .field("active_watches", &self.watches.lock().len())
            .finish_non_exhaustive()
    }
}

impl GpsdSensor {
    /// Create a sensor. No connection is made until a read or watch starts.
    pub fn new(config: GpsdSensorConfig) -> Self {
        Self {
            config,
            last_fix: Arc::new(Mutex::new(None)),
            watches: Mutex::new(HashMap::new()),
            next_watch_id: AtomicU64::new(1),
        }
    }

    /// The configured daemon address.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    fn cached_fix(&self, maximum_age: Duration) -> Option<Fix> {
        if maximum_age.is_zero() {
            return None;
        }
        let cached = (*self.last_fix.lock())?;
        (cached.age_at(Utc::now()) <= maximum_age).then_some(cached)
    }
}

impl Drop for GpsdSensor {
    fn drop(&mut self) {
        for (_, token) in self.watches.lock().drain() {
            token.cancel();
        }
    }
}

impl LocationSensor for GpsdSensor {
    fn name(&self) -> &str {
        "gpsd"
    }

    fn capabilities(&self) -> SensorCapabilities {
        let address = self.config.address.trim();
        if address.is_empty() {
            return SensorCapabilities::unsupported("no gpsd address configured");
        }
        if !self.config.allow_remote && !is_loopback_address(address) {
            return SensorCapabilities::insecure(format!(
                "gpsd at {} is not a loopback address; set allow_remote to trust it",
                address
            ));
        }
        SensorCapabilities::available()
    }

    fn current_position(&self, options: PositionOptions) -> PositionFuture<'_> {
        Box::pin(async move {
            if let Some(fix) = self.cached_fix(options.maximum_age) {
                trace!("gpsd: serving cached fix");
                return Ok(fix);
            }

            let min_mode = self.config.required_mode(&options);
            let read = async {
                let mut reports = connect(&self.config.address).await?;
                loop {
                    let report = reports.next_report().await?;
                    if let Some(fix) = report.to_fix(min_mode) {
                        *self.last_fix.lock() = Some(fix);
                        return Ok::<Fix, PositionError>(fix);
                    }
                    trace!(mode = report.mode, "gpsd: report does not qualify, waiting");
                }
            };

            match tokio::time::timeout(options.timeout, read).await {
                Ok(result) => result,
                Err(_) => Err(PositionError::Timeout {
                    after: options.timeout,
                }),
            }
        })
    }

    fn watch_position(
        &self,
        options: PositionOptions,
        sink: FixSink,
    ) -> Result<WatchId, PositionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PositionError::PositionUnavailable("gpsd watch requires a Tokio runtime".to_string())
        })?;

        let id = WatchId(self.next_watch_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        self.watches.lock().insert(id, token.clone());

        let address = self.config.address.clone();
        let min_mode = self.config.required_mode(&options);
        let last_fix = Arc::clone(&self.last_fix);
        runtime.spawn(run_watch(id, address, min_mode, sink, last_fix, token));

        info!(watch = %id, address = %self.config.address, "gpsd watch started");
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(token) = self.watches.lock().remove(&id) {
            token.cancel();
            info!(watch = %id, "gpsd watch cleared");
        }
    }
}

/// Stream fixes into `sink` until cancelled, reconnecting on failure.
async fn run_watch(
    id: WatchId,
    address: String,
    min_mode: u8,
    sink: FixSink,
    last_fix: Arc<Mutex<Option<Fix>>>,
    token: CancellationToken,
) {
    loop {
        let streamed = async {
            let mut reports = connect(&address).await?;
            loop {
                let report = reports.next_report().await?;
                let Some(fix) = report.to_fix(min_mode) else {
                    continue;
                };
                *last_fix.lock() = Some(fix);
                if token.is_cancelled() || sink.send(Ok(fix)).is_err() {
                    return Ok::<(), PositionError>(());
                }
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = streamed => outcome,
        };

        match outcome {
            // Receiver dropped or watch cancelled mid-stream
            Ok(()) => break,
            Err(error) => {
                debug!(watch = %id, error = %error, "gpsd watch stream failed");
                if token.is_cancelled() || sink.send(Err(error)).is_err() {
                    break;
                }
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(WATCH_RECONNECT_DELAY) => {}
        }
    }
    debug!(watch = %id, "gpsd watch task exiting");
}

/// Connect to gpsd and enable JSON watcher mode.
async fn connect(address: &str) -> Result<ReportStream, PositionError> {
    let mut stream = TcpStream::connect(address)
        .await
        .map_err(|e| map_io_error(address, e))?;
    stream
        .write_all(WATCH_COMMAND)
        .await
        .map_err(|e| map_io_error(address, e))?;
    Ok(ReportStream {
        address: address.to_string(),
        lines: BufReader::new(stream).lines(),
    })
}

fn map_io_error(address: &str, error: io::Error) -> PositionError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => {
            PositionError::PermissionDenied(format!("gpsd at {}: {}", address, error))
        }
        _ => PositionError::PositionUnavailable(format!(
            "cannot read from gpsd at {}: {}",
            address, error
        )),
    }
}

/// Line-oriented reader of gpsd JSON reports.
struct ReportStream {
    address: String,
    lines: Lines<BufReader<TcpStream>>,
}

impl ReportStream {
    /// Next `TPV` report. Other report classes are skipped.
    async fn next_report(&mut self) -> Result<TpvReport, PositionError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| map_io_error(&self.address, e))?
                .ok_or_else(|| {
                    PositionError::PositionUnavailable(format!(
                        "gpsd at {} closed the connection",
                        self.address
                    ))
                })?;

            match parse_message(&line) {
                Some(GpsdMessage::Tpv(report)) => return Ok(report),
                Some(GpsdMessage::Error { message }) => {
                    return Err(PositionError::PositionUnavailable(format!(
                        "gpsd error: {}",
                        message
                    )))
                }
                Some(GpsdMessage::Other) => {}
                None => warn!(line = %line, "gpsd: ignoring malformed report"),
            }
        }
    }
}

/// The subset of gpsd report classes the sensor cares about.
#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum GpsdMessage {
    #[serde(rename = "TPV")]
    Tpv(TpvReport),
    #[serde(rename = "ERROR")]
    Error { message: String },
    #[serde(other)]
    Other,
}

/// A gpsd time-position-velocity report.
#[derive(Debug, Clone, Default, Deserialize)]
struct TpvReport {
    #[serde(default)]
    mode: u8,
    time: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    eph: Option<f64>,
}

impl TpvReport {
    /// Convert to a fix if the report carries a usable position.
    fn to_fix(&self, min_mode: u8) -> Option<Fix> {
        if self.mode < min_mode {
            return None;
        }
        let coordinate = Coordinate::new(self.lat?, self.lon?).ok()?;
        let accuracy = match (self.epx, self.epy) {
            (Some(x), Some(y)) => x.max(y),
            (Some(e), None) | (None, Some(e)) => e,
            (None, None) => self.eph.unwrap_or(0.0),
        };
        let timestamp = self
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Some(Fix::with_timestamp(coordinate, accuracy, timestamp))
    }
}

fn parse_message(line: &str) -> Option<GpsdMessage> {
    serde_json::from_str(line).ok()
}

/// True if `address` (`host:port` or bare host) names the local machine.
fn is_loopback_address(address: &str) -> bool {
    if let Ok(socket) = address.parse::<SocketAddr>() {
        return socket.ip().is_loopback();
    }
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
