use std::fmt;

/// Kind tag carried on every brewing step. The first converted step is a
/// mash, every later one a boil, but the orchestrator only ever looks at
/// the tag itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Mash,
    Boil,
}

impl StepKind {
    /// Server-side status field updated when this step starts and ends,
    /// e.g. `mash_status = "started"`.
    pub fn status_field(&self) -> &'static str {
        match self {
            StepKind::Mash => "mash_status",
            StepKind::Boil => "boil_status",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Mash => write!(f, "mash"),
            StepKind::Boil => write!(f, "boil"),
        }
    }
}

/// One temperature-hold phase of the brewing profile. Immutable once
/// converted from the recipe snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BrewStep {
    pub target_temp_c: f64,
    pub hold_minutes: f64,
    pub approval_required: bool,
    pub kind: StepKind,
}

/// Orchestrator phase. Step-scoped phases carry the 0-indexed step number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrewPhase {
    Idle,
    FetchingRecipe,
    Starting,
    Heating(usize),
    Holding(usize),
    Reporting(usize),
    MarkingFinished,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: BrewPhase,
    pub to: BrewPhase,
}

/// Fixed boil step temperature when the recipe carries a boil time.
pub const BOIL_TEMP_C: f64 = 95.0;
/// Consecutive 401 outcomes that abort the whole run.
pub const MAX_CONSECUTIVE_AUTH_FAILURES: u32 = 5;
/// Regulator output above this drives the binary heater relay on.
pub const HEATER_ON_THRESHOLD: f64 = 50.0;
