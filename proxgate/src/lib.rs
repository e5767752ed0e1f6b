//! proxgate - proximity verification for gated actions
//!
//! Decides whether the current device is physically within a radius of a
//! fixed venue, using the host's location sensor, and exposes the answer as a
//! fail-closed gate for a privileged action such as submitting a claim.
//!
//! # Modules
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`geo`]    | `Coordinate`, `TargetZone`, haversine distance             |
//! | [`sensor`] | `LocationSensor` trait, gpsd and scripted sensors          |
//! | [`engine`] | `ProximityEngine`, containment results, gate status        |
//! | [`config`] | INI configuration file and key access                      |

pub mod config;
pub mod engine;
pub mod geo;
pub mod sensor;

/// Version of the proxgate library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
