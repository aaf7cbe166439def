//! Report status protocol between the controller and the coordinator.
//!
//! The server reuses HTTP-looking numeric codes as domain signals (100
//! proceed, 202/205 hold for approval, 401 unauthorized) and additionally
//! carries a `brew_status` field that can order termination independently
//! of the numeric code. Raw codes are decoded exactly once, here; the
//! orchestrator only ever sees a [`ServerSignal`].

use log::warn;
use serde::Deserialize;

/// Result of one report submission. Produced by the coordinator client,
/// consumed immediately by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Success {
        status_code: u16,
        brew_status: Option<String>,
        message: Option<String>,
    },
    HttpError {
        status_code: u16,
        message: String,
    },
    TransportError {
        message: String,
    },
}

/// Response body of a report submission, as far as the controller cares.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportResponseBody {
    pub brew_status: Option<String>,
    pub message: Option<String>,
}

/// Decoded control signal. One report outcome maps to exactly one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerSignal {
    /// Everything fine, continue the current loop.
    Proceed,
    /// Stay in place and keep reporting until the server releases us.
    HoldForApproval,
    /// Authentication rejected. Counted; fatal when consecutive.
    Unauthorized,
    /// Server-directed termination of the whole brew.
    Ended,
    /// A code outside the protocol. Logged, otherwise ignored.
    Unexpected(u16),
    /// The report never reached the server.
    Unreachable(String),
}

pub const STATUS_PROCEED: u16 = 100;
pub const STATUS_HOLD: u16 = 202;
pub const STATUS_HOLD_APPROVAL: u16 = 205;
pub const STATUS_UNAUTHORIZED: u16 = 401;

impl ServerSignal {
    /// Decode a report outcome. The `brew_status == "ended"` check takes
    /// precedence over the numeric code.
    pub fn decode(outcome: &ReportOutcome) -> ServerSignal {
        match outcome {
            ReportOutcome::Success {
                status_code,
                brew_status,
                ..
            } => {
                if brew_status.as_deref() == Some("ended") {
                    return ServerSignal::Ended;
                }
                match *status_code {
                    STATUS_PROCEED => ServerSignal::Proceed,
                    STATUS_HOLD | STATUS_HOLD_APPROVAL => ServerSignal::HoldForApproval,
                    STATUS_UNAUTHORIZED => ServerSignal::Unauthorized,
                    other => {
                        warn!("Unexpected report status code: {}", other);
                        ServerSignal::Unexpected(other)
                    }
                }
            }
            ReportOutcome::HttpError {
                status_code,
                message,
            } => match *status_code {
                STATUS_UNAUTHORIZED => ServerSignal::Unauthorized,
                other => {
                    warn!("Report rejected with HTTP {}: {}", other, message);
                    ServerSignal::Unexpected(other)
                }
            },
            ReportOutcome::TransportError { message } => {
                ServerSignal::Unreachable(message.clone())
            }
        }
    }

    /// A successful non-401 round trip resets the consecutive auth-failure
    /// counter. Transport and HTTP errors leave it untouched.
    pub fn resets_auth_failures(outcome: &ReportOutcome) -> bool {
        matches!(
            outcome,
            ReportOutcome::Success { status_code, .. } if *status_code != STATUS_UNAUTHORIZED
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(code: u16) -> ReportOutcome {
        ReportOutcome::Success {
            status_code: code,
            brew_status: None,
            message: None,
        }
    }

    #[test]
    fn test_decode_numeric_codes() {
        assert_eq!(ServerSignal::decode(&success(100)), ServerSignal::Proceed);
        assert_eq!(
            ServerSignal::decode(&success(202)),
            ServerSignal::HoldForApproval
        );
        assert_eq!(
            ServerSignal::decode(&success(205)),
            ServerSignal::HoldForApproval
        );
        assert_eq!(
            ServerSignal::decode(&success(401)),
            ServerSignal::Unauthorized
        );
        assert_eq!(
            ServerSignal::decode(&success(250)),
            ServerSignal::Unexpected(250)
        );
    }

    #[test]
    fn test_ended_overrides_numeric_code() {
        let outcome = ReportOutcome::Success {
            status_code: 100,
            brew_status: Some("ended".to_string()),
            message: None,
        };
        assert_eq!(ServerSignal::decode(&outcome), ServerSignal::Ended);
    }

    #[test]
    fn test_http_401_is_unauthorized() {
        let outcome = ReportOutcome::HttpError {
            status_code: 401,
            message: "invalid secret".to_string(),
        };
        assert_eq!(ServerSignal::decode(&outcome), ServerSignal::Unauthorized);
    }

    #[test]
    fn test_transport_error_is_unreachable() {
        let outcome = ReportOutcome::TransportError {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            ServerSignal::decode(&outcome),
            ServerSignal::Unreachable("connection refused".to_string())
        );
    }

    #[test]
    fn test_reset_rule() {
        assert!(ServerSignal::resets_auth_failures(&success(100)));
        assert!(ServerSignal::resets_auth_failures(&success(202)));
        assert!(ServerSignal::resets_auth_failures(&success(250)));
        assert!(!ServerSignal::resets_auth_failures(&success(401)));
        assert!(!ServerSignal::resets_auth_failures(
            &ReportOutcome::TransportError {
                message: "timeout".to_string()
            }
        ));
        assert!(!ServerSignal::resets_auth_failures(
            &ReportOutcome::HttpError {
                status_code: 500,
                message: "oops".to_string()
            }
        ));
    }
}
