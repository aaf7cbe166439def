//! Crate-wide error taxonomy for the brewing controller.
//!
//! Recoverable conditions (a single failed report, a slow sensor poll) never
//! surface here; they are handled at the loop boundary that observed them.
//! A `BrewError` reaching the orchestrator's run loop aborts the step loop
//! and routes through the shared heater-off cleanup path.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BrewError {
    /// Connection, DNS or timeout failure talking to the coordinator.
    Transport(String),
    /// Non-2xx HTTP response that is not part of the report status protocol.
    Http { status: u16, message: String },
    /// Response decoded but required fields were missing or malformed.
    Protocol(String),
    /// Five consecutive unauthorized report outcomes.
    AuthFailure { attempts: u32 },
    /// Invalid regulator or runtime configuration.
    Config(String),
    /// Sensor unreadable or heater GPIO unreachable. Always fatal.
    Hardware(String),
}

impl fmt::Display for BrewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrewError::Transport(msg) => write!(f, "transport error: {}", msg),
            BrewError::Http { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            BrewError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            BrewError::AuthFailure { attempts } => write!(
                f,
                "brewing stopped after {} consecutive unauthorized reports",
                attempts
            ),
            BrewError::Config(msg) => write!(f, "configuration error: {}", msg),
            BrewError::Hardware(msg) => write!(f, "hardware fault: {}", msg),
        }
    }
}

impl std::error::Error for BrewError {}

impl From<reqwest::Error> for BrewError {
    fn from(err: reqwest::Error) -> Self {
        BrewError::Transport(err.to_string())
    }
}
