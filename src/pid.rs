//! Discrete PID temperature regulator.
//!
//! Gains are pre-scaled at construction (Ki by the sample period, Kd by its
//! inverse) so the update uses per-call error and derivative values directly.
//! Integration is suspended while the previous output sat on either output
//! limit (anti-windup), and the output is never computed more often than
//! once per sample period.

use crate::error::BrewError;
use log::debug;
use std::time::{Duration, Instant};

pub struct PidRegulator {
    kp: f64,
    ki: f64,
    kd: f64,
    sample_period: Duration,
    output_min: f64,
    output_max: f64,
    i_term: f64,
    last_input: f64,
    last_output: f64,
    last_compute: Option<Instant>,
}

impl PidRegulator {
    pub fn new(
        sample_period_secs: f64,
        kp: f64,
        ki: f64,
        kd: f64,
        output_min: f64,
        output_max: f64,
    ) -> Result<Self, BrewError> {
        if !kp.is_finite() || !ki.is_finite() || !kd.is_finite() {
            return Err(BrewError::Config(
                "PID gains must be specified and finite".to_string(),
            ));
        }
        // NaN compares false against everything; check finiteness first.
        if !sample_period_secs.is_finite() || sample_period_secs <= 0.0 {
            return Err(BrewError::Config(
                "sample period must be a positive finite number".to_string(),
            ));
        }
        if output_min >= output_max {
            return Err(BrewError::Config(format!(
                "output range [{}, {}] is empty",
                output_min, output_max
            )));
        }

        Ok(Self {
            kp,
            ki: ki * sample_period_secs,
            kd: kd / sample_period_secs,
            sample_period: Duration::from_secs_f64(sample_period_secs),
            output_min,
            output_max,
            i_term: 0.0,
            last_input: 0.0,
            last_output: 0.0,
            last_compute: None,
        })
    }

    /// Compute the heater output for the current temperature and setpoint.
    ///
    /// Called more often than once per sample period, this returns the
    /// previous output unchanged. The returned level is always within
    /// `[output_min, output_max]`.
    pub fn compute(&mut self, input: f64, setpoint: f64) -> f64 {
        let now = Instant::now();
        if let Some(last) = self.last_compute {
            if now.duration_since(last) < self.sample_period {
                return self.last_output;
            }
        }

        let error = setpoint - input;
        let d_input = input - self.last_input;

        // Only integrate while the previous output was strictly inside the
        // band; a saturated output means more integral would just wind up.
        if self.output_min < self.last_output && self.last_output < self.output_max {
            self.i_term += self.ki * error;
            self.i_term = self.i_term.clamp(self.output_min, self.output_max);
        }

        let output = self.kp * error + self.i_term - self.kd * d_input;
        self.last_output = output.clamp(self.output_min, self.output_max);
        self.last_input = input;
        self.last_compute = Some(now);

        debug!(
            "PID: input={:.2}C setpoint={:.2}C error={:.2} -> output={:.1}%",
            input, setpoint, error, self.last_output
        );

        self.last_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regulator() -> PidRegulator {
        PidRegulator::new(5.0, 100.0, 0.1, 1.0, 0.0, 100.0).unwrap()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(PidRegulator::new(0.0, 100.0, 0.1, 1.0, 0.0, 100.0).is_err());
        assert!(PidRegulator::new(-1.0, 100.0, 0.1, 1.0, 0.0, 100.0).is_err());
        assert!(PidRegulator::new(f64::NAN, 100.0, 0.1, 1.0, 0.0, 100.0).is_err());
        assert!(PidRegulator::new(f64::INFINITY, 100.0, 0.1, 1.0, 0.0, 100.0).is_err());
        assert!(PidRegulator::new(5.0, f64::NAN, 0.1, 1.0, 0.0, 100.0).is_err());
        assert!(PidRegulator::new(5.0, 100.0, 0.1, 1.0, 100.0, 0.0).is_err());
    }

    #[test]
    fn test_output_clamped_to_range() {
        let mut pid = regulator();
        // Huge positive error saturates high.
        let out = pid.compute(20.0, 90.0);
        assert_eq!(out, 100.0);

        let mut pid = regulator();
        // Huge negative error saturates low.
        let out = pid.compute(90.0, 20.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn test_reference_operating_point() {
        // 60C measured against a 65C setpoint: positive drive, within range.
        let mut pid = regulator();
        let out = pid.compute(60.0, 65.0);
        assert!(out > 0.0);
        assert!(out <= 100.0);
    }

    #[test]
    fn test_rate_limited_to_sample_period() {
        let mut pid = regulator();
        let first = pid.compute(60.0, 65.0);
        // Immediately again: well inside the 5s sample period, so the
        // previous output must come back bit-identical.
        let second = pid.compute(40.0, 65.0);
        assert_eq!(first, second);
        let third = pid.compute(99.0, 65.0);
        assert_eq!(first, third);
    }

    #[test]
    fn test_integral_suspended_while_saturated() {
        let mut pid = PidRegulator::new(0.000_001, 100.0, 5.0, 0.0, 0.0, 100.0).unwrap();
        // First computation saturates at 100.
        assert_eq!(pid.compute(20.0, 90.0), 100.0);
        std::thread::sleep(Duration::from_millis(1));
        // Saturated previous output: the i_term must not have accumulated,
        // so a zero-error call drops straight back to zero drive.
        let out = pid.compute(90.0, 90.0);
        assert!(out.abs() < 1e-9, "i_term leaked while saturated: {}", out);
    }
}
