//! CLI command implementations.

pub mod check;
pub mod common;
pub mod config;
pub mod distance;
pub mod simulate;
pub mod watch;
