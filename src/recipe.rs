//! Conversion of the server's recipe snapshot into brewing steps.
//!
//! Pure mapping: a mash step when both mash fields are present, a fixed
//! 95C boil step when a boil time is present. Everything else in the
//! snapshot is ignored.

use crate::types::{BrewStep, StepKind, BOIL_TEMP_C};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeResponse {
    pub recipe_id: Option<String>,
    pub recipe_snapshot: Option<RecipeSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeSnapshot {
    pub mash_temp_c: Option<f64>,
    pub mash_time_min: Option<f64>,
    pub boil_time_min: Option<f64>,
}

/// Map a recipe snapshot to the ordered step list. May be empty; the
/// orchestrator refuses to start on an empty result.
pub fn convert_recipe_to_steps(snapshot: &RecipeSnapshot) -> Vec<BrewStep> {
    let mut steps = Vec::new();

    if let (Some(mash_temp), Some(mash_time)) = (snapshot.mash_temp_c, snapshot.mash_time_min) {
        steps.push(BrewStep {
            target_temp_c: mash_temp,
            hold_minutes: mash_time,
            approval_required: false,
            kind: StepKind::Mash,
        });
    }

    if let Some(boil_time) = snapshot.boil_time_min {
        steps.push(BrewStep {
            target_temp_c: BOIL_TEMP_C,
            hold_minutes: boil_time,
            approval_required: false,
            kind: StepKind::Boil,
        });
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_snapshot_yields_mash_then_boil() {
        let snapshot = RecipeSnapshot {
            mash_temp_c: Some(67.0),
            mash_time_min: Some(60.0),
            boil_time_min: Some(90.0),
        };
        let steps = convert_recipe_to_steps(&snapshot);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].kind, StepKind::Mash);
        assert_eq!(steps[0].target_temp_c, 67.0);
        assert_eq!(steps[0].hold_minutes, 60.0);
        assert_eq!(steps[1].kind, StepKind::Boil);
        assert_eq!(steps[1].target_temp_c, BOIL_TEMP_C);
        assert_eq!(steps[1].hold_minutes, 90.0);
    }

    #[test]
    fn test_mash_requires_both_fields() {
        let snapshot = RecipeSnapshot {
            mash_temp_c: Some(67.0),
            mash_time_min: None,
            boil_time_min: Some(90.0),
        };
        let steps = convert_recipe_to_steps(&snapshot);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, StepKind::Boil);
    }

    #[test]
    fn test_empty_snapshot_yields_no_steps() {
        let steps = convert_recipe_to_steps(&RecipeSnapshot::default());
        assert!(steps.is_empty());
    }
}
