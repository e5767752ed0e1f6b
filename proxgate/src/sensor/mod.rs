//! Location sensor abstraction.
//!
//! The engine never talks to hardware directly. It depends on the
//! [`LocationSensor`] trait, which mirrors the shape of a platform geolocation
//! API: a capability check, a one-shot read, and a cancellable subscription.
//!
//! # Implementors
//!
//! - [`GpsdSensor`] - reads fixes from a gpsd daemon over its JSON socket
//! - [`ScriptedSensor`] - fully scriptable sensor for tests and simulations

mod error;
mod fix;
mod gpsd;
mod options;
mod scripted;

pub use error::PositionError;
pub use fix::Fix;
pub use gpsd::{GpsdSensor, GpsdSensorConfig, DEFAULT_GPSD_ADDRESS};
pub use options::PositionOptions;
pub use scripted::{ScriptedRead, ScriptedSensor};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

/// Future returned by [`LocationSensor::current_position`].
pub type PositionFuture<'a> = Pin<Box<dyn Future<Output = Result<Fix, PositionError>> + Send + 'a>>;

/// Channel end a watch subscription delivers its readings into.
pub type FixSink = mpsc::UnboundedSender<Result<Fix, PositionError>>;

/// Handle identifying an active watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// What the host platform allows before any sensor call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCapabilities {
    /// `None` when location is available, otherwise why it is not.
    pub unsupported_reason: Option<String>,
    /// `None` when the execution context is secure, otherwise why it is not.
    pub insecure_reason: Option<String>,
}

impl SensorCapabilities {
    /// A platform with location support in a secure context.
    pub fn available() -> Self {
        Self {
            unsupported_reason: None,
            insecure_reason: None,
        }
    }

    /// A platform with no location capability.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            unsupported_reason: Some(reason.into()),
            insecure_reason: None,
        }
    }

    /// A platform that blocks location because the context is not secure.
    pub fn insecure(reason: impl Into<String>) -> Self {
        Self {
            unsupported_reason: None,
            insecure_reason: Some(reason.into()),
        }
    }

    /// Convert to the fatal error the engine should report, if any.
    ///
    /// Missing support takes precedence over an insecure context.
    pub fn check(&self) -> Result<(), PositionError> {
        if let Some(reason) = &self.unsupported_reason {
            return Err(PositionError::UnsupportedPlatform(reason.clone()));
        }
        if let Some(reason) = &self.insecure_reason {
            return Err(PositionError::InsecureContext(reason.clone()));
        }
        Ok(())
    }
}

/// A source of device position readings.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// from any task.
pub trait LocationSensor: Send + Sync + 'static {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Report platform support and context security. Must not touch hardware.
    fn capabilities(&self) -> SensorCapabilities;

    /// Read the current position once.
    fn current_position(&self, options: PositionOptions) -> PositionFuture<'_>;

    /// Start delivering readings into `sink` until [`clear_watch`] is called.
    ///
    /// [`clear_watch`]: LocationSensor::clear_watch
    fn watch_position(
        &self,
        options: PositionOptions,
        sink: FixSink,
    ) -> Result<WatchId, PositionError>;

    /// Cancel a subscription. After this returns no further readings are
    /// sent for `id`. Unknown ids are ignored.
    fn clear_watch(&self, id: WatchId);
}
