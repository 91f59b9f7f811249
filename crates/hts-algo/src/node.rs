//! Per-position state of a scenario tree or comb.

use hts_core::CutPool;
use serde::{Deserialize, Serialize};

use crate::stage::StageSolution;

/// State attached to one (stage, position) of a tree or comb: the inflow
/// realization, the most recent solved values, and the accumulated cuts.
///
/// Solved values are overwritten on every outer iteration; cuts only grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    /// Inflow realization, one entry per hydro
    pub inflows: Vec<f64>,
    /// Storage handed to the last solve, one entry per hydro
    pub initial_storage: Vec<f64>,
    /// Solved final storage per hydro
    pub final_storage: Vec<f64>,
    /// Solved turbined volume per hydro
    pub turbined: Vec<f64>,
    /// Solved spilled volume per hydro
    pub spilled: Vec<f64>,
    /// Water value per hydro (negated hydro-balance dual)
    pub water_values: Vec<f64>,
    /// Solved dispatch per thermal unit
    pub thermal_dispatch: Vec<f64>,
    pub deficit: f64,
    /// Marginal operation cost (absolute load-balance dual)
    pub cmo: f64,
    pub immediate_cost: f64,
    /// Value of the future-cost surrogate (alpha)
    pub future_cost: f64,
    pub total_cost: f64,
    /// Cuts attached to this position
    pub cuts: CutPool,
}

impl NodeState {
    pub fn new(inflows: Vec<f64>) -> Self {
        Self {
            inflows,
            initial_storage: Vec::new(),
            final_storage: Vec::new(),
            turbined: Vec::new(),
            spilled: Vec::new(),
            water_values: Vec::new(),
            thermal_dispatch: Vec::new(),
            deficit: 0.0,
            cmo: 0.0,
            immediate_cost: 0.0,
            future_cost: 0.0,
            total_cost: 0.0,
            cuts: CutPool::new(),
        }
    }

    /// Store the outcome of a stage solve, overwriting previous values.
    pub fn record(&mut self, solution: StageSolution) {
        self.initial_storage = solution.initial_storage;
        self.final_storage = solution.final_storage;
        self.turbined = solution.turbined;
        self.spilled = solution.spilled;
        self.water_values = solution.water_values;
        self.thermal_dispatch = solution.thermal_dispatch;
        self.deficit = solution.deficit;
        self.cmo = solution.cmo;
        self.immediate_cost = solution.immediate_cost;
        self.future_cost = solution.future_cost;
        self.total_cost = solution.total_cost;
    }

    /// Whether a solve has been recorded yet.
    pub fn is_solved(&self) -> bool {
        !self.final_storage.is_empty()
    }
}
