//! Heater relay drive over sysfs GPIO.
//!
//! The element is binary: any regulator output above the threshold closes
//! the relay, anything at or below opens it. The pin is forced low at
//! initialization and `force_off` gives every cleanup path an immediate,
//! state-independent way to de-energize the element.

use crate::error::BrewError;
use crate::types::HEATER_ON_THRESHOLD;
use log::{debug, error, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Single exclusively-owned heating element. The orchestrator is the sole
/// writer; implementations must be safe to command off repeatedly.
pub trait Heater {
    /// Apply a regulator output level in `[0, 100]`.
    fn apply_level(&mut self, level: f64) -> Result<(), BrewError>;
    /// Unconditionally de-energize the element.
    fn force_off(&mut self) -> Result<(), BrewError>;
    fn is_on(&self) -> bool;
}

pub struct GpioHeater {
    pin: u32,
    value_path: PathBuf,
    state: bool,
}

impl GpioHeater {
    pub fn new(pin: u32) -> Result<Self, BrewError> {
        Self::with_gpio_root(pin, Path::new("/sys/class/gpio"))
    }

    pub fn with_gpio_root(pin: u32, gpio_root: &Path) -> Result<Self, BrewError> {
        let pin_dir = gpio_root.join(format!("gpio{}", pin));

        // Export is allowed to fail if the pin is already exported.
        if !pin_dir.exists() {
            if let Ok(mut f) = fs::OpenOptions::new()
                .write(true)
                .open(gpio_root.join("export"))
            {
                let _ = write!(f, "{}", pin);
            }
        }

        fs::write(pin_dir.join("direction"), "out").map_err(|e| {
            BrewError::Hardware(format!("failed to configure GPIO{} as output: {}", pin, e))
        })?;

        let mut heater = Self {
            pin,
            value_path: pin_dir.join("value"),
            state: true, // force the initial off-write through
        };
        // Relay must start open (safety).
        heater.set(false)?;
        info!("Heater relay initialized on GPIO{} (active high, off)", pin);
        Ok(heater)
    }

    fn set(&mut self, on: bool) -> Result<(), BrewError> {
        if self.state == on {
            return Ok(());
        }
        fs::write(&self.value_path, if on { "1" } else { "0" }).map_err(|e| {
            BrewError::Hardware(format!("failed to drive GPIO{}: {}", self.pin, e))
        })?;
        self.state = on;
        info!(
            "Heater relay {} (GPIO{} {})",
            if on { "ON" } else { "OFF" },
            self.pin,
            if on { "HIGH" } else { "LOW" }
        );
        Ok(())
    }
}

impl Heater for GpioHeater {
    fn apply_level(&mut self, level: f64) -> Result<(), BrewError> {
        debug!("Heater output: {:.1}%", level);
        self.set(level > HEATER_ON_THRESHOLD)
    }

    fn force_off(&mut self) -> Result<(), BrewError> {
        // Write the pin directly, independent of tracked state.
        if let Err(e) = fs::write(&self.value_path, "0") {
            error!("CRITICAL: failed to force heater off on GPIO{}: {}", self.pin, e);
            return Err(BrewError::Hardware(format!(
                "failed to force heater off: {}",
                e
            )));
        }
        self.state = false;
        info!("Heater relay forced OFF (GPIO{} LOW)", self.pin);
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox(pin: u32) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "wort-gpio-test-{}-{}",
            pin,
            std::process::id()
        ));
        let pin_dir = root.join(format!("gpio{}", pin));
        fs::create_dir_all(&pin_dir).unwrap();
        fs::write(root.join("export"), "").unwrap();
        fs::write(pin_dir.join("value"), "1").unwrap();
        root
    }

    #[test]
    fn test_heater_starts_off() {
        let root = sandbox(17);
        let heater = GpioHeater::with_gpio_root(17, &root).unwrap();
        assert!(!heater.is_on());
        let value = fs::read_to_string(root.join("gpio17/value")).unwrap();
        assert_eq!(value, "0");
    }

    #[test]
    fn test_threshold_drives_relay() {
        let root = sandbox(18);
        let mut heater = GpioHeater::with_gpio_root(18, &root).unwrap();

        heater.apply_level(75.0).unwrap();
        assert!(heater.is_on());
        assert_eq!(fs::read_to_string(root.join("gpio18/value")).unwrap(), "1");

        // 50 exactly is not above the threshold.
        heater.apply_level(50.0).unwrap();
        assert!(!heater.is_on());
        assert_eq!(fs::read_to_string(root.join("gpio18/value")).unwrap(), "0");
    }

    #[test]
    fn test_force_off_is_unconditional() {
        let root = sandbox(19);
        let mut heater = GpioHeater::with_gpio_root(19, &root).unwrap();
        heater.apply_level(100.0).unwrap();
        heater.force_off().unwrap();
        assert!(!heater.is_on());
        // Repeated force-off stays quiet and off.
        heater.force_off().unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio19/value")).unwrap(), "0");
    }
}
