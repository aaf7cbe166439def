//! The brewing orchestrator: sequences recipe steps, regulates the heater
//! through the PID loop, reports to the coordinator and reconciles the
//! server's status signals against local state.
//!
//! Every exit path, fatal or normal, runs through [`BrewOrchestrator::run`]'s
//! single shutdown step, which de-energizes the heater at most once.

use crate::api::BrewServer;
use crate::audit::AuditLog;
use crate::error::BrewError;
use crate::hardware::heater::Heater;
use crate::hardware::sensor::TemperatureProbe;
use crate::pid::PidRegulator;
use crate::protocol::{ReportOutcome, ServerSignal};
use crate::recipe::convert_recipe_to_steps;
use crate::system::config::BrewConfig;
use crate::types::{BrewPhase, BrewStep, PhaseTransition, MAX_CONSECUTIVE_AUTH_FAILURES};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cooperative stop signal, checked at every loop-iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All steps completed and the session was marked finished.
    Completed,
    /// The server reported `brew_status == "ended"`; remaining steps were
    /// skipped.
    ServerEnded,
    /// The cancel token was raised.
    Cancelled,
}

/// Outcome of one step (or one report) as seen by the step loop.
enum Flow {
    Continue,
    Terminate(StopReason),
}

/// Immediate effect of one decoded report signal.
#[derive(Debug, PartialEq)]
enum Reaction {
    /// Explicit go-ahead from the server.
    Proceed,
    /// Server holds the step; keep reporting until released.
    Hold,
    /// Nothing actionable (unexpected code, undelivered report).
    Ignore,
    Terminate(StopReason),
}

pub struct BrewOrchestrator<C: BrewServer> {
    client: C,
    heater: Box<dyn Heater>,
    probe: Box<dyn TemperatureProbe>,
    config: BrewConfig,
    audit: AuditLog,
    cancel: CancelToken,

    phase: BrewPhase,
    transitions: Vec<PhaseTransition>,
    consecutive_auth_failures: u32,
    heater_engaged: bool,
    shutdown_done: bool,
}

impl<C: BrewServer> BrewOrchestrator<C> {
    pub fn new(
        client: C,
        heater: Box<dyn Heater>,
        probe: Box<dyn TemperatureProbe>,
        config: BrewConfig,
        cancel: CancelToken,
    ) -> Self {
        let audit = AuditLog::new(config.audit_log_path.clone());
        Self {
            client,
            heater,
            probe,
            config,
            audit,
            cancel,
            phase: BrewPhase::Idle,
            transitions: Vec::new(),
            consecutive_auth_failures: 0,
            heater_engaged: false,
            shutdown_done: false,
        }
    }

    pub fn phase(&self) -> BrewPhase {
        self.phase
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Run the whole brewing session. The heater is guaranteed off by the
    /// time this returns, whatever the result.
    pub fn run(&mut self) -> Result<StopReason, BrewError> {
        let result = self.run_inner();
        self.shutdown();
        match &result {
            Ok(reason) => info!("Brewing run ended: {:?}", reason),
            Err(e) => error!("Brewing run failed: {}", e),
        }
        result
    }

    fn run_inner(&mut self) -> Result<StopReason, BrewError> {
        self.set_phase(BrewPhase::FetchingRecipe);
        let recipe = self.client.fetch_recipe()?;
        let recipe_id = recipe
            .recipe_id
            .ok_or_else(|| BrewError::Protocol("recipe response missing recipe_id".to_string()))?;
        let snapshot = recipe.recipe_snapshot.ok_or_else(|| {
            BrewError::Protocol("recipe response missing recipe_snapshot".to_string())
        })?;

        let steps = convert_recipe_to_steps(&snapshot);
        if steps.is_empty() {
            return Err(BrewError::Protocol(format!(
                "recipe {} converted to no steps, refusing to start",
                recipe_id
            )));
        }
        // Server-supplied numbers gate the heating loops; reject anything
        // that cannot be a temperature or a duration before touching the
        // heater.
        for (index, step) in steps.iter().enumerate() {
            if !step.target_temp_c.is_finite()
                || !step.hold_minutes.is_finite()
                || step.hold_minutes < 0.0
            {
                return Err(BrewError::Protocol(format!(
                    "recipe {} step {} has invalid fields: target {}C, hold {} min",
                    recipe_id,
                    index + 1,
                    step.target_temp_c,
                    step.hold_minutes
                )));
            }
        }
        info!("Recipe {} converted to {} steps", recipe_id, steps.len());

        self.set_phase(BrewPhase::Starting);
        self.client.start_session()?;
        info!("Brewing session started");

        let mut pid = PidRegulator::new(
            self.config.sample_period_secs,
            self.config.gains.kp,
            self.config.gains.ki,
            self.config.gains.kd,
            self.config.output_min,
            self.config.output_max,
        )?;

        let mut run_error = None;
        for (index, step) in steps.iter().enumerate() {
            match self.run_step(index, step, &mut pid) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Terminate(reason)) => return Ok(reason),
                Err(e) => {
                    // A step error aborts the whole step loop, not just the
                    // iteration, and falls through to finalization.
                    error!("Error during brewing step {}: {}", index + 1, e);
                    run_error = Some(e);
                    break;
                }
            }
        }

        self.set_phase(BrewPhase::MarkingFinished);
        self.client.update_step_status("brew_status", "ended");
        if let Err(e) = self.client.finish_session() {
            error!("Failed to mark brewing as finished: {}", e);
        }

        match run_error {
            Some(e) => Err(e),
            None => Ok(StopReason::Completed),
        }
    }

    fn run_step(
        &mut self,
        index: usize,
        step: &BrewStep,
        pid: &mut PidRegulator,
    ) -> Result<Flow, BrewError> {
        self.set_phase(BrewPhase::Heating(index));
        info!(
            "Step {} ({}): heating to {:.1}C",
            index + 1,
            step.kind,
            step.target_temp_c
        );

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested, terminating during heating");
                return Ok(Flow::Terminate(StopReason::Cancelled));
            }

            let current = self.probe.read_celsius()?;
            if current >= step.target_temp_c {
                info!(
                    "Target temperature reached: {:.2}C >= {:.1}C",
                    current, step.target_temp_c
                );
                self.client
                    .update_step_status(step.kind.status_field(), "started");
                break;
            }

            info!(
                "Heating: {:.2}C, target {:.1}C",
                current, step.target_temp_c
            );
            let output = pid.compute(current, step.target_temp_c);
            self.apply_heat(output)?;

            if let Flow::Terminate(reason) = self.handle_report(index, current, step, pid)? {
                return Ok(Flow::Terminate(reason));
            }
            thread::sleep(self.config.report_interval);
        }

        self.set_phase(BrewPhase::Holding(index));
        info!(
            "Holding {:.1}C for {:.1} minutes",
            step.target_temp_c, step.hold_minutes
        );
        let deadline = Instant::now() + Duration::from_secs_f64(step.hold_minutes * 60.0);

        while Instant::now() < deadline {
            if self.cancel.is_cancelled() {
                info!("Stop requested, terminating during hold");
                return Ok(Flow::Terminate(StopReason::Cancelled));
            }

            let current = self.probe.read_celsius()?;
            let output = pid.compute(current, step.target_temp_c);
            self.apply_heat(output)?;
            self.audit.record(current, step.target_temp_c);

            let remaining = deadline.saturating_duration_since(Instant::now());
            info!(
                "Maintaining {:.2}C (target {:.1}C), {}m{:02}s remaining",
                current,
                step.target_temp_c,
                remaining.as_secs() / 60,
                remaining.as_secs() % 60
            );

            if let Flow::Terminate(reason) = self.handle_report(index, current, step, pid)? {
                return Ok(Flow::Terminate(reason));
            }
            thread::sleep(self.config.report_interval);
        }

        self.set_phase(BrewPhase::Reporting(index));
        let current = self.probe.read_celsius()?;
        let outcome = self.client.submit_report(current);
        let needs_release = match self.interpret(&outcome)? {
            Reaction::Terminate(reason) => return Ok(Flow::Terminate(reason)),
            Reaction::Proceed => false,
            Reaction::Hold => true,
            // Without an explicit go-ahead an approval step stays put.
            Reaction::Ignore => step.approval_required,
        };

        if needs_release {
            if let Flow::Terminate(reason) = self.await_approval(index, step, pid)? {
                return Ok(Flow::Terminate(reason));
            }
        }

        self.client
            .update_step_status(step.kind.status_field(), "ended");
        info!(
            "Step {} completed: held {:.1}C for {:.1} minutes",
            index + 1,
            step.target_temp_c,
            step.hold_minutes
        );
        Ok(Flow::Continue)
    }

    /// Submit one report and act on the decoded signal. A held step routes
    /// through the approval wait before returning.
    fn handle_report(
        &mut self,
        index: usize,
        current_temp_c: f64,
        step: &BrewStep,
        pid: &mut PidRegulator,
    ) -> Result<Flow, BrewError> {
        let outcome = self.client.submit_report(current_temp_c);
        match self.interpret(&outcome)? {
            Reaction::Proceed | Reaction::Ignore => Ok(Flow::Continue),
            Reaction::Terminate(reason) => Ok(Flow::Terminate(reason)),
            Reaction::Hold => self.await_approval(index, step, pid),
        }
    }

    /// Keep regulating and re-submitting reports until the server releases
    /// the step with an explicit proceed, ends the brew, or the auth
    /// threshold trips.
    fn await_approval(
        &mut self,
        index: usize,
        step: &BrewStep,
        pid: &mut PidRegulator,
    ) -> Result<Flow, BrewError> {
        info!("Waiting for approval, step number: {}", index + 1);
        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested while waiting for approval");
                return Ok(Flow::Terminate(StopReason::Cancelled));
            }

            let current = self.probe.read_celsius()?;
            let output = pid.compute(current, step.target_temp_c);
            self.apply_heat(output)?;

            let outcome = self.client.submit_report(current);
            match self.interpret(&outcome)? {
                Reaction::Proceed => {
                    info!("Approval received, proceeding");
                    return Ok(Flow::Continue);
                }
                Reaction::Terminate(reason) => return Ok(Flow::Terminate(reason)),
                Reaction::Hold | Reaction::Ignore => {}
            }
            thread::sleep(self.config.approval_poll_interval);
        }
    }

    /// Decode a report outcome and update the consecutive-failure counter.
    /// The only error this can produce is the fatal auth-failure threshold.
    fn interpret(&mut self, outcome: &ReportOutcome) -> Result<Reaction, BrewError> {
        if ServerSignal::resets_auth_failures(outcome) && self.consecutive_auth_failures > 0 {
            info!(
                "Successful report, resetting auth-failure counter (was {})",
                self.consecutive_auth_failures
            );
            self.consecutive_auth_failures = 0;
        }

        match ServerSignal::decode(outcome) {
            ServerSignal::Proceed => Ok(Reaction::Proceed),
            ServerSignal::HoldForApproval => Ok(Reaction::Hold),
            ServerSignal::Ended => {
                info!("Brew status is 'ended', terminating brewing process");
                Ok(Reaction::Terminate(StopReason::ServerEnded))
            }
            ServerSignal::Unauthorized => {
                self.consecutive_auth_failures += 1;
                warn!(
                    "Received status 401: attempt {}/{}",
                    self.consecutive_auth_failures, MAX_CONSECUTIVE_AUTH_FAILURES
                );
                if self.consecutive_auth_failures >= MAX_CONSECUTIVE_AUTH_FAILURES {
                    Err(BrewError::AuthFailure {
                        attempts: self.consecutive_auth_failures,
                    })
                } else {
                    Ok(Reaction::Ignore)
                }
            }
            ServerSignal::Unexpected(_) => Ok(Reaction::Ignore),
            ServerSignal::Unreachable(message) => {
                warn!("Report not delivered: {}", message);
                Ok(Reaction::Ignore)
            }
        }
    }

    fn apply_heat(&mut self, level: f64) -> Result<(), BrewError> {
        self.heater_engaged = true;
        self.heater.apply_level(level)
    }

    /// The one shared cleanup action. Idempotent; skips the relay write
    /// entirely if the heater was never driven.
    fn shutdown(&mut self) {
        if self.shutdown_done {
            return;
        }
        self.shutdown_done = true;

        if self.heater_engaged {
            if let Err(e) = self.heater.force_off() {
                error!("CRITICAL: failed to turn heater off during shutdown: {}", e);
            } else {
                info!("Heater turned off");
            }
        }
        self.set_phase(BrewPhase::Terminated);
    }

    fn set_phase(&mut self, to: BrewPhase) {
        if to != self.phase {
            info!("Brew phase transition: {:?} -> {:?}", self.phase, to);
            self.transitions.push(PhaseTransition {
                from: self.phase,
                to,
            });
            self.phase = to;
        }
    }
}
