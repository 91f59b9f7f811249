//! Study results: per-trajectory series and convergence history.

use hts_core::{Config, CutPool, Fleet};
use serde::{Deserialize, Serialize};

use crate::node::NodeState;

/// Time series of one operated trajectory, organized per variable.
///
/// Per-hydro and per-thermal series are indexed `[plant][stage]`; the
/// remaining series are `[stage]`. With `post_study_repeats > 0` the base
/// horizon is repeated at the tail of every series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub inflows: Vec<Vec<f64>>,
    pub final_storage: Vec<Vec<f64>>,
    pub turbined: Vec<Vec<f64>>,
    pub spilled: Vec<Vec<f64>>,
    pub water_values: Vec<Vec<f64>>,
    pub thermal_dispatch: Vec<Vec<f64>>,
    pub deficit: Vec<f64>,
    pub cmo: Vec<f64>,
    pub immediate_cost: Vec<f64>,
    pub future_cost: Vec<f64>,
    pub total_cost: Vec<f64>,
}

impl Scenario {
    /// Assemble a scenario from the solved nodes of one trajectory,
    /// repeating the base horizon `repeats` extra times.
    pub fn from_nodes(nodes: &[&NodeState], n_hydros: usize, n_thermals: usize, repeats: usize) -> Self {
        let stages = nodes.len() * (repeats + 1);
        let mut scenario = Scenario {
            inflows: vec![Vec::with_capacity(stages); n_hydros],
            final_storage: vec![Vec::with_capacity(stages); n_hydros],
            turbined: vec![Vec::with_capacity(stages); n_hydros],
            spilled: vec![Vec::with_capacity(stages); n_hydros],
            water_values: vec![Vec::with_capacity(stages); n_hydros],
            thermal_dispatch: vec![Vec::with_capacity(stages); n_thermals],
            deficit: Vec::with_capacity(stages),
            cmo: Vec::with_capacity(stages),
            immediate_cost: Vec::with_capacity(stages),
            future_cost: Vec::with_capacity(stages),
            total_cost: Vec::with_capacity(stages),
        };
        for _ in 0..=repeats {
            for node in nodes {
                for h in 0..n_hydros {
                    scenario.inflows[h].push(node.inflows[h]);
                    scenario.final_storage[h].push(node.final_storage[h]);
                    scenario.turbined[h].push(node.turbined[h]);
                    scenario.spilled[h].push(node.spilled[h]);
                    scenario.water_values[h].push(node.water_values[h]);
                }
                for t in 0..n_thermals {
                    scenario.thermal_dispatch[t].push(node.thermal_dispatch[t]);
                }
                scenario.deficit.push(node.deficit);
                scenario.cmo.push(node.cmo);
                scenario.immediate_cost.push(node.immediate_cost);
                scenario.future_cost.push(node.future_cost);
                scenario.total_cost.push(node.total_cost);
            }
        }
        scenario
    }

    pub fn stage_len(&self) -> usize {
        self.deficit.len()
    }

    /// Element-wise mean over a set of scenarios of identical shape.
    pub fn mean_of(scenarios: &[Scenario]) -> Option<Scenario> {
        let first = scenarios.first()?;
        let n = scenarios.len() as f64;
        let mean_series = |select: &dyn Fn(&Scenario) -> &Vec<f64>| -> Vec<f64> {
            let mut acc = vec![0.0; select(first).len()];
            for scenario in scenarios {
                for (a, v) in acc.iter_mut().zip(select(scenario)) {
                    *a += v / n;
                }
            }
            acc
        };
        let mean_nested = |select: &dyn Fn(&Scenario) -> &Vec<Vec<f64>>| -> Vec<Vec<f64>> {
            (0..select(first).len())
                .map(|p| {
                    let mut acc = vec![0.0; select(first)[p].len()];
                    for scenario in scenarios {
                        for (a, v) in acc.iter_mut().zip(&select(scenario)[p]) {
                            *a += v / n;
                        }
                    }
                    acc
                })
                .collect()
        };
        Some(Scenario {
            inflows: mean_nested(&|s| &s.inflows),
            final_storage: mean_nested(&|s| &s.final_storage),
            turbined: mean_nested(&|s| &s.turbined),
            spilled: mean_nested(&|s| &s.spilled),
            water_values: mean_nested(&|s| &s.water_values),
            thermal_dispatch: mean_nested(&|s| &s.thermal_dispatch),
            deficit: mean_series(&|s| &s.deficit),
            cmo: mean_series(&|s| &s.cmo),
            immediate_cost: mean_series(&|s| &s.immediate_cost),
            future_cost: mean_series(&|s| &s.future_cost),
            total_cost: mean_series(&|s| &s.total_cost),
        })
    }
}

/// Everything a finished study hands to the reporting collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyResult {
    pub config: Config,
    pub fleet: Fleet,
    /// One entry per evaluated trajectory of the final simulation
    pub scenarios: Vec<Scenario>,
    /// Upper cost estimates, one per iteration plus the final simulation
    pub z_sup: Vec<f64>,
    /// Lower cost estimates, aligned with `z_sup`
    pub z_inf: Vec<f64>,
    /// SDDP confidence intervals, aligned with the iteration entries
    pub confidence_intervals: Vec<(f64, f64)>,
    /// Accumulated cuts by (stage, node position)
    pub cuts: Vec<Vec<CutPool>>,
    /// Deterministic-equivalent objective (Single-LP only)
    pub objective: Option<f64>,
    pub converged: bool,
    pub iterations: usize,
}

impl StudyResult {
    /// Mean scenario across all evaluated trajectories.
    pub fn mean_scenario(&self) -> Option<Scenario> {
        Scenario::mean_of(&self.scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(total: f64) -> NodeState {
        let mut node = NodeState::new(vec![1.0]);
        node.initial_storage = vec![20.0];
        node.final_storage = vec![10.0];
        node.turbined = vec![5.0];
        node.spilled = vec![0.0];
        node.water_values = vec![2.0];
        node.thermal_dispatch = vec![3.0, 4.0];
        node.deficit = 0.0;
        node.cmo = 10.0;
        node.immediate_cost = total / 2.0;
        node.future_cost = total / 2.0;
        node.total_cost = total;
        node
    }

    #[test]
    fn test_from_nodes_shapes() {
        let a = node(100.0);
        let b = node(200.0);
        let scenario = Scenario::from_nodes(&[&a, &b], 1, 2, 0);
        assert_eq!(scenario.stage_len(), 2);
        assert_eq!(scenario.final_storage[0], vec![10.0, 10.0]);
        assert_eq!(scenario.thermal_dispatch.len(), 2);
        assert_eq!(scenario.total_cost, vec![100.0, 200.0]);
    }

    #[test]
    fn test_post_study_repetition() {
        let a = node(100.0);
        let scenario = Scenario::from_nodes(&[&a], 1, 2, 2);
        assert_eq!(scenario.stage_len(), 3);
        assert_eq!(scenario.total_cost, vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_mean_scenario() {
        let a = Scenario::from_nodes(&[&node(100.0)], 1, 2, 0);
        let b = Scenario::from_nodes(&[&node(300.0)], 1, 2, 0);
        let mean = Scenario::mean_of(&[a, b]).unwrap();
        assert!((mean.total_cost[0] - 200.0).abs() < 1e-12);
        assert!((mean.final_storage[0][0] - 10.0).abs() < 1e-12);
    }
}
