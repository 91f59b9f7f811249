//! The validated study document: configuration, fleet, demand and inflows.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::{HtsError, HtsResult};
use crate::Fleet;

/// Candidate inflows per hydro and stage.
///
/// Indexed `[hydro][stage][candidate]`, hydro order matching the fleet. The
/// first stage is deterministic: only the first candidate is ever used. The
/// candidate count must be uniform across hydros within a stage so a single
/// opening index selects a joint realization for the whole fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InflowTable {
    values: Vec<Vec<Vec<f64>>>,
}

impl InflowTable {
    pub fn new(values: Vec<Vec<Vec<f64>>>) -> Self {
        Self { values }
    }

    pub fn num_hydros(&self) -> usize {
        self.values.len()
    }

    /// Candidates offered at a stage (taken from the first hydro; validation
    /// guarantees uniformity).
    pub fn candidate_count(&self, stage: usize) -> usize {
        self.values
            .first()
            .and_then(|h| h.get(stage))
            .map_or(0, Vec::len)
    }

    /// Inflow of one hydro at one stage for one candidate index.
    pub fn value(&self, hydro: usize, stage: usize, candidate: usize) -> f64 {
        self.values[hydro][stage][candidate]
    }

    /// Joint inflow vector (one entry per hydro) for a candidate index.
    pub fn joint(&self, stage: usize, candidate: usize) -> Vec<f64> {
        self.values
            .iter()
            .map(|h| h[stage][candidate])
            .collect()
    }

    pub fn validate_into(&self, config: &Config, fleet: &Fleet, diag: &mut Diagnostics) {
        if self.values.len() != fleet.hydros.len() {
            diag.add_error(
                "dimensions",
                &format!(
                    "inflow table covers {} hydros, fleet has {}",
                    self.values.len(),
                    fleet.hydros.len()
                ),
            );
            return;
        }
        for (h, (per_stage, hydro)) in self.values.iter().zip(&fleet.hydros).enumerate() {
            let entity = format!("Hydro {} ({})", hydro.id.value(), hydro.name);
            if per_stage.len() < config.stage_count {
                diag.add_error_with_entity(
                    "dimensions",
                    &format!(
                        "inflow table has {} stages, study needs {}",
                        per_stage.len(),
                        config.stage_count
                    ),
                    &entity,
                );
                continue;
            }
            for (s, candidates) in per_stage.iter().take(config.stage_count).enumerate() {
                let reference = self.values[0][s].len();
                if h > 0 && candidates.len() != reference {
                    diag.add_error_with_entity(
                        "dimensions",
                        &format!(
                            "stage {} offers {} candidates, expected {} (uniform across hydros)",
                            s,
                            candidates.len(),
                            reference
                        ),
                        &entity,
                    );
                }
                let required = if s == 0 { 1 } else { config.branch_count };
                if candidates.len() < required {
                    diag.add_error_with_entity(
                        "dimensions",
                        &format!(
                            "stage {} offers {} candidates, at least {} required",
                            s,
                            candidates.len(),
                            required
                        ),
                        &entity,
                    );
                }
            }
        }
    }
}

/// A complete, immutable study ready to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub config: Config,
    pub fleet: Fleet,
    /// Expected demand per stage (MWavg)
    pub demand: Vec<f64>,
    pub inflows: InflowTable,
}

impl Study {
    /// Validate the whole document against the data-model invariants.
    /// Returns all problems at once as a single fatal error.
    pub fn validate(&self) -> HtsResult<()> {
        let mut diag = Diagnostics::new();
        self.config.validate_into(&mut diag);
        self.fleet.validate_into(&mut diag);
        if self.demand.len() != self.config.stage_count {
            diag.add_error(
                "dimensions",
                &format!(
                    "demand vector has {} stages, config says {}",
                    self.demand.len(),
                    self.config.stage_count
                ),
            );
        }
        if let Some((stage, value)) = self
            .demand
            .iter()
            .enumerate()
            .find(|(_, d)| **d < 0.0)
            .map(|(s, d)| (s, *d))
        {
            diag.add_error(
                "bounds",
                &format!("demand at stage {} is negative ({})", stage, value),
            );
        }
        self.inflows
            .validate_into(&self.config, &self.fleet, &mut diag);
        if diag.has_errors() {
            return Err(HtsError::Input(diag.summary()));
        }
        Ok(())
    }

    /// Storage vector at the start of the horizon, in hydro order.
    pub fn initial_storages(&self) -> Vec<f64> {
        self.fleet
            .hydros
            .iter()
            .map(|h| h.initial_storage)
            .collect()
    }
}
