//! Centralized runtime configuration.
//!
//! Defaults mirror the reference rig (heater relay on GPIO 17, DS18B20 on
//! the 1-wire bus, 5 s control cadence); every knob can be overridden from
//! the environment with a `WORT_` prefixed variable.

use crate::api::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone)]
pub struct BrewConfig {
    pub base_url: String,
    pub session_id: String,
    pub site_id: String,
    pub secret: String,

    pub heater_gpio: u32,
    pub sample_period_secs: f64,
    pub gains: PidGains,
    pub output_min: f64,
    pub output_max: f64,

    /// Pause between control-loop iterations in the heating and holding
    /// phases.
    pub report_interval: Duration,
    /// Pause between report re-submissions while waiting for approval.
    pub approval_poll_interval: Duration,
    pub http_timeout: Duration,

    pub fetch_retry: RetryPolicy,
    pub start_retry: RetryPolicy,
    pub finish_retry: RetryPolicy,

    pub audit_log_path: PathBuf,
    pub w1_devices_dir: PathBuf,
}

impl Default for BrewConfig {
    fn default() -> Self {
        Self {
            base_url: "https://brew-server.onrender.com".to_string(),
            session_id: "3".to_string(),
            site_id: "24".to_string(),
            secret: String::new(),

            heater_gpio: 17,
            sample_period_secs: 5.0,
            gains: PidGains {
                kp: 100.0,
                ki: 0.1,
                kd: 1.0,
            },
            output_min: 0.0,
            output_max: 100.0,

            report_interval: Duration::from_secs(5),
            approval_poll_interval: Duration::from_secs(3),
            http_timeout: Duration::from_secs(30),

            fetch_retry: RetryPolicy::new(50, Duration::from_secs(10)),
            start_retry: RetryPolicy::new(10, Duration::from_secs(10)),
            finish_retry: RetryPolicy::new(5, Duration::from_secs(5)),

            audit_log_path: PathBuf::from("brew_audit.csv"),
            w1_devices_dir: PathBuf::from("/sys/bus/w1/devices"),
        }
    }
}

impl BrewConfig {
    /// Defaults overridden by any `WORT_*` environment variables present.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("WORT_SERVER_URL") {
            config.base_url = url;
        }
        if let Ok(id) = env::var("WORT_SESSION_ID") {
            config.session_id = id;
        }
        if let Ok(id) = env::var("WORT_SITE_ID") {
            config.site_id = id;
        }
        if let Ok(secret) = env::var("WORT_SECRET") {
            config.secret = secret;
        }
        if let Some(pin) = env_parse("WORT_HEATER_GPIO") {
            config.heater_gpio = pin;
        }
        if let Some(secs) = env_parse("WORT_SAMPLE_PERIOD_SECS") {
            config.sample_period_secs = secs;
        }
        if let Some(kp) = env_parse("WORT_PID_KP") {
            config.gains.kp = kp;
        }
        if let Some(ki) = env_parse("WORT_PID_KI") {
            config.gains.ki = ki;
        }
        if let Some(kd) = env_parse("WORT_PID_KD") {
            config.gains.kd = kd;
        }
        if let Some(secs) = env_parse::<u64>("WORT_REPORT_INTERVAL_SECS") {
            config.report_interval = Duration::from_secs(secs);
        }
        if let Ok(path) = env::var("WORT_AUDIT_LOG") {
            config.audit_log_path = PathBuf::from(path);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
