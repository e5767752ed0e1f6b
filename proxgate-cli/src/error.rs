//! CLI error type.

use std::fmt;

use proxgate::config::ConfigError;
use proxgate::engine::EngineError;
use proxgate::geo::CoordError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration is missing, unreadable, or invalid.
    Config(String),
    /// The engine could not run.
    Engine(EngineError),
    /// A coordinate or radius argument is out of range.
    Coordinate(CoordError),
    /// A simulation script could not be read or is malformed.
    Script(String),
    /// The async runtime or signal handler could not be set up.
    Runtime(String),
    /// Logging could not be initialised.
    Logging(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Engine(e) => write!(f, "Engine error: {}", e),
            CliError::Coordinate(e) => write!(f, "Invalid coordinate: {}", e),
            CliError::Script(msg) => write!(f, "Simulation script error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Engine(e) => Some(e),
            CliError::Coordinate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coordinate(e)
    }
}
