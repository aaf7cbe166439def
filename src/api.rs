//! Blocking HTTP client for the brewing coordinator.
//!
//! Each lifecycle call carries its own bounded retry policy. Report
//! submission is deliberately single-attempt: the orchestrator's own loop
//! re-submits on its cadence, so a failed report is surfaced as a
//! [`ReportOutcome`] variant instead of being retried here.

use crate::error::BrewError;
use crate::protocol::{ReportOutcome, ReportResponseBody};
use crate::recipe::RecipeResponse;
use crate::system::config::BrewConfig;
use log::{error, info, warn};
use serde_json::json;
use std::thread;
use std::time::Duration;

/// Bounded retry policy: fixed delay between a fixed number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Run `f` until it succeeds or the policy is exhausted, sleeping the fixed
/// delay between attempts. The last error is returned after exhaustion.
pub fn with_retry<T, F>(operation: &str, policy: &RetryPolicy, mut f: F) -> Result<T, BrewError>
where
    F: FnMut() -> Result<T, BrewError>,
{
    if policy.max_attempts == 0 {
        return Err(BrewError::Config(format!(
            "{}: retry policy allows zero attempts",
            operation
        )));
    }

    let mut last_err = BrewError::Transport(format!("{}: no attempt made", operation));
    for attempt in 1..=policy.max_attempts {
        match f() {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", operation, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "{} attempt {}/{} failed: {}",
                    operation, attempt, policy.max_attempts, e
                );
                last_err = e;
                if attempt < policy.max_attempts {
                    thread::sleep(policy.delay);
                }
            }
        }
    }

    error!(
        "{} failed after {} attempts: {}",
        operation, policy.max_attempts, last_err
    );
    Err(last_err)
}

/// Coordinator operations as the orchestrator consumes them. Implemented by
/// [`CoordinatorClient`] for the real server and by scripted mocks in tests.
pub trait BrewServer {
    fn fetch_recipe(&self) -> Result<RecipeResponse, BrewError>;
    fn start_session(&self) -> Result<serde_json::Value, BrewError>;
    fn submit_report(&self, temperature_c: f64) -> ReportOutcome;
    fn update_step_status(&self, field: &str, value: &str) -> Option<serde_json::Value>;
    fn finish_session(&self) -> Result<serde_json::Value, BrewError>;
}

pub struct CoordinatorClient {
    http: reqwest::blocking::Client,
    base_url: String,
    session_id: String,
    site_id: String,
    secret: String,
    fetch_retry: RetryPolicy,
    start_retry: RetryPolicy,
    finish_retry: RetryPolicy,
}

impl CoordinatorClient {
    pub fn new(config: &BrewConfig) -> Result<Self, BrewError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_id: config.session_id.clone(),
            site_id: config.site_id.clone(),
            secret: config.secret.clone(),
            fetch_retry: config.fetch_retry,
            start_retry: config.start_retry,
            finish_retry: config.finish_retry,
        })
    }

    fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, BrewError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(payload).send()?;
        Ok(response)
    }

    /// POST expecting a 2xx JSON response; anything else is an error.
    fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, BrewError> {
        let response = self.post(path, payload)?;
        let status = response.status();
        if !status.is_success() {
            return Err(BrewError::Http {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        response
            .json()
            .map_err(|e| BrewError::Protocol(format!("{}: invalid response body: {}", path, e)))
    }
}

impl BrewServer for CoordinatorClient {
    fn fetch_recipe(&self) -> Result<RecipeResponse, BrewError> {
        info!("Connecting to brew session {}", self.session_id);
        let payload = json!({
            "session_id": self.session_id,
            "secret": self.secret,
        });
        with_retry("fetch recipe", &self.fetch_retry, || {
            let value = self.post_json("/brews/connect", &payload)?;
            serde_json::from_value(value)
                .map_err(|e| BrewError::Protocol(format!("malformed recipe response: {}", e)))
        })
    }

    fn start_session(&self) -> Result<serde_json::Value, BrewError> {
        let payload = json!({
            "session_id": self.session_id,
            "secret": self.secret,
        });
        with_retry("start session", &self.start_retry, || {
            self.post_json("/brews/embedded_start", &payload)
        })
    }

    fn submit_report(&self, temperature_c: f64) -> ReportOutcome {
        let payload = json!({
            "session_id": self.session_id,
            "site_id": self.site_id,
            "temperature_celsius": temperature_c,
        });

        let response = match self.post("/brews/temperature", &payload) {
            Ok(response) => response,
            Err(e) => {
                return ReportOutcome::TransportError {
                    message: e.to_string(),
                }
            }
        };

        let status_code = response.status().as_u16();
        if response.status().is_client_error() || response.status().is_server_error() {
            return ReportOutcome::HttpError {
                status_code,
                message: response.text().unwrap_or_default(),
            };
        }

        match response.json::<ReportResponseBody>() {
            Ok(body) => ReportOutcome::Success {
                status_code,
                brew_status: body.brew_status,
                message: body.message,
            },
            Err(e) => ReportOutcome::TransportError {
                message: format!("invalid report response body: {}", e),
            },
        }
    }

    fn update_step_status(&self, field: &str, value: &str) -> Option<serde_json::Value> {
        let payload = json!({
            "session_id": self.session_id,
            "secret": self.secret,
            "status_field": field,
            "status_value": value,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        match self.post_json("/brews/update_step_status", &payload) {
            Ok(response) => {
                info!("Step status update: {} = {}", field, value);
                Some(response)
            }
            Err(e) => {
                // Best-effort telemetry, never fatal.
                warn!("Failed to update step status {} = {}: {}", field, value, e);
                None
            }
        }
    }

    fn finish_session(&self) -> Result<serde_json::Value, BrewError> {
        let payload = json!({ "session_id": self.session_id });
        with_retry("finish session", &self.finish_retry, || {
            self.post_json("/brews/end", &payload)
        })
    }
}
