//! DS18B20 temperature probe on the 1-wire bus.
//!
//! The kernel driver exposes each probe as a `28*` device directory whose
//! `w1_slave` file carries two lines: a CRC line ending in `YES` when the
//! conversion is valid, and a `t=` line with the temperature in
//! milli-degrees. Reads poll until the CRC line is valid, bounded so a dead
//! probe surfaces as a hardware fault instead of hanging the control loop.

use crate::error::BrewError;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const CRC_POLL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_CRC_POLLS: u32 = 50;

/// Blocking temperature source. `read_celsius` only returns once a valid
/// conversion is available, or fails fatally.
pub trait TemperatureProbe {
    fn read_celsius(&mut self) -> Result<f64, BrewError>;
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// One `w1_slave` payload, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum W1Payload {
    /// CRC line not yet `YES`; retry after a short pause.
    NotReady,
    /// CRC valid but no parsable `t=` field.
    Malformed,
    Temperature(f64),
}

pub fn parse_w1_payload(payload: &str) -> W1Payload {
    let mut lines = payload.lines();
    let (Some(crc_line), Some(data_line)) = (lines.next(), lines.next()) else {
        return W1Payload::Malformed;
    };

    if !crc_line.trim_end().ends_with("YES") {
        return W1Payload::NotReady;
    }

    match data_line.find("t=") {
        Some(pos) => match data_line[pos + 2..].trim().parse::<f64>() {
            Ok(milli) => W1Payload::Temperature(milli / 1000.0),
            Err(_) => W1Payload::Malformed,
        },
        None => W1Payload::Malformed,
    }
}

pub struct Ds18b20Probe {
    device_file: PathBuf,
}

impl Ds18b20Probe {
    /// Locate the first `28*` family device under the 1-wire devices
    /// directory.
    pub fn discover(devices_dir: &Path) -> Result<Self, BrewError> {
        let entries = fs::read_dir(devices_dir).map_err(|e| {
            BrewError::Hardware(format!(
                "cannot open 1-wire devices dir {}: {}",
                devices_dir.display(),
                e
            ))
        })?;

        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with("28") {
                let device_file = entry.path().join("w1_slave");
                info!("Using temperature probe {}", device_file.display());
                return Ok(Self { device_file });
            }
        }

        Err(BrewError::Hardware(format!(
            "no DS18B20 (28*) device found under {}",
            devices_dir.display()
        )))
    }

    pub fn from_device_file(device_file: PathBuf) -> Self {
        Self { device_file }
    }
}

impl TemperatureProbe for Ds18b20Probe {
    fn read_celsius(&mut self) -> Result<f64, BrewError> {
        for _ in 0..MAX_CRC_POLLS {
            let payload = fs::read_to_string(&self.device_file).map_err(|e| {
                BrewError::Hardware(format!(
                    "cannot read {}: {}",
                    self.device_file.display(),
                    e
                ))
            })?;

            match parse_w1_payload(&payload) {
                W1Payload::Temperature(celsius) => {
                    debug!(
                        "Probe reading: {:.3}C ({:.3}F)",
                        celsius,
                        celsius_to_fahrenheit(celsius)
                    );
                    return Ok(celsius);
                }
                W1Payload::NotReady => {
                    warn!("Probe conversion not ready, polling again");
                    thread::sleep(CRC_POLL_INTERVAL);
                }
                W1Payload::Malformed => {
                    return Err(BrewError::Hardware(format!(
                        "malformed w1_slave payload from {}",
                        self.device_file.display()
                    )));
                }
            }
        }

        Err(BrewError::Hardware(format!(
            "probe {} never produced a valid reading after {} polls",
            self.device_file.display(),
            MAX_CRC_POLLS
        )))
    }
}
