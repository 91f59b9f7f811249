//! Deterministic-equivalent engine: one monolithic LP over the whole tree.
//!
//! Every (stage, node) position gets its own dispatch variables; hydro
//! balances chain a node's storage to its parent's, and the objective weighs
//! each node by `1/nodes_at_stage`, the probability mass of a uniform tree.
//! There is no future-cost surrogate and no iteration: the LP is solved once
//! and per-node primals and duals are read back into the tree.

use hts_core::{HtsError, HtsResult, Study};
use hts_solve::{LinearProgram, VarId};
use tracing::{debug, info};

use crate::stage::SPILL_PENALTY;
use crate::tree::InflowTree;

struct NodeVars {
    vf: Vec<VarId>,
    vt: Vec<VarId>,
    vv: Vec<VarId>,
    gt: Vec<VarId>,
    deficit: VarId,
    balance_rows: Vec<usize>,
    load_row: usize,
}

/// Build and solve the deterministic equivalent; returns the populated tree
/// and the expected-cost objective.
pub fn run(study: &Study) -> HtsResult<(InflowTree, f64)> {
    let mut tree = InflowTree::build(study);
    let n_hydro = study.fleet.hydros.len();
    let stage_count = tree.stage_count();
    let mut lp = LinearProgram::new();

    // Variables and bounds, stage-major then node-major.
    let mut vars: Vec<Vec<NodeVars>> = Vec::with_capacity(stage_count);
    for stage in 0..stage_count {
        let weight = 1.0 / tree.nodes_at(stage) as f64;
        let mut stage_vars = Vec::with_capacity(tree.nodes_at(stage));
        for _ in 0..tree.nodes_at(stage) {
            let vf: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
            let vt: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
            let vv: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
            let gt: Vec<_> = study
                .fleet
                .thermals
                .iter()
                .map(|_| lp.add_variable())
                .collect();
            let deficit = lp.add_variable();

            for (h, hydro) in study.fleet.hydros.iter().enumerate() {
                lp.set_bounds(vf[h], Some(hydro.min_storage), Some(hydro.max_storage));
                lp.set_bounds(vt[h], Some(0.0), Some(hydro.max_turbine));
                lp.set_bounds(vv[h], Some(0.0), None);
                lp.set_objective(vv[h], SPILL_PENALTY * weight);
            }
            for (t, thermal) in study.fleet.thermals.iter().enumerate() {
                lp.set_bounds(gt[t], Some(0.0), Some(thermal.capacity));
                lp.set_objective(gt[t], thermal.marginal_cost * weight);
            }
            lp.set_bounds(deficit, Some(0.0), None);
            lp.set_objective(deficit, study.config.deficit_cost * weight);

            stage_vars.push(NodeVars {
                vf,
                vt,
                vv,
                gt,
                deficit,
                balance_rows: Vec::new(),
                load_row: 0,
            });
        }
        vars.push(stage_vars);
    }

    // Constraints, in the same deterministic order as the variables.
    for stage in 0..stage_count {
        for node in 0..tree.nodes_at(stage) {
            let inflows = tree.node(stage, node).inflows.clone();
            let parent = tree.parent_index(node);
            for h in 0..n_hydro {
                let this = &vars[stage][node];
                let mut coeffs = vec![(this.vf[h], 1.0), (this.vt[h], 1.0), (this.vv[h], 1.0)];
                let rhs = if stage == 0 {
                    study.fleet.hydros[h].initial_storage + inflows[h]
                } else {
                    coeffs.push((vars[stage - 1][parent].vf[h], -1.0));
                    inflows[h]
                };
                let row = lp.add_eq(coeffs, rhs);
                vars[stage][node].balance_rows.push(row);
            }
            let this = &vars[stage][node];
            let mut balance: Vec<_> = study
                .fleet
                .hydros
                .iter()
                .enumerate()
                .map(|(h, hydro)| (this.vt[h], hydro.productivity))
                .collect();
            balance.extend(this.gt.iter().map(|&g| (g, 1.0)));
            balance.push((this.deficit, 1.0));
            let row = lp.add_eq(balance, study.demand[stage]);
            vars[stage][node].load_row = row;
        }
    }

    debug!(
        variables = lp.num_variables(),
        equalities = lp.num_equalities(),
        "deterministic equivalent assembled"
    );
    let solution = hts_solve::solve(&lp)
        .map_err(|e| HtsError::Solver(format!("deterministic equivalent: {}", e)))?;
    info!(objective = solution.objective, "deterministic equivalent solved");

    // Read per-node values back into the tree.
    for stage in 0..stage_count {
        for node_idx in 0..tree.nodes_at(stage) {
            let this = &vars[stage][node_idx];
            let parent = tree.parent_index(node_idx);
            let initial_storage: Vec<f64> = if stage == 0 {
                study.initial_storages()
            } else {
                vars[stage - 1][parent]
                    .vf
                    .iter()
                    .map(|&v| solution.value(v))
                    .collect()
            };
            let thermal_dispatch: Vec<f64> =
                this.gt.iter().map(|&v| solution.value(v)).collect();
            let spilled: Vec<f64> = this.vv.iter().map(|&v| solution.value(v)).collect();
            let deficit = solution.value(this.deficit);
            let immediate_cost = study
                .fleet
                .thermals
                .iter()
                .zip(&thermal_dispatch)
                .map(|(thermal, g)| thermal.marginal_cost * g)
                .sum::<f64>()
                + study.config.deficit_cost * deficit
                + SPILL_PENALTY * spilled.iter().sum::<f64>();

            let node = tree.node_mut(stage, node_idx);
            node.initial_storage = initial_storage;
            node.final_storage = this.vf.iter().map(|&v| solution.value(v)).collect();
            node.turbined = this.vt.iter().map(|&v| solution.value(v)).collect();
            node.spilled = spilled;
            node.water_values = this
                .balance_rows
                .iter()
                .map(|&row| -solution.eq_duals[row])
                .collect();
            node.thermal_dispatch = thermal_dispatch;
            node.deficit = deficit;
            node.cmo = solution.eq_duals[this.load_row].abs();
            node.immediate_cost = immediate_cost;
            node.future_cost = 0.0;
            node.total_cost = immediate_cost;
        }
    }

    Ok((tree, solution.objective))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{Config, Fleet, Hydro, HydroId, InflowTable, Method, Thermal, ThermalId};

    fn one_stage_study(demand: f64, max_turbine: f64) -> Study {
        let mut fleet = Fleet::new();
        fleet.add_hydro(
            Hydro::new(HydroId::new(1), "UHE 1".to_string())
                .with_storage(20.0, 0.0, 100.0)
                .with_turbine(1.0, max_turbine),
        );
        fleet.add_thermal(
            Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(100.0, 10.0),
        );
        Study {
            config: Config {
                study_name: "single".to_string(),
                method: Method::SingleLp,
                stage_count: 1,
                branch_count: 1,
                trajectory_count: 1,
                tail_fraction: 0.0,
                tail_weight: 0.0,
                confidence_z: 1.96,
                seed: 0,
                post_study_repeats: 0,
                min_iter: 1,
                max_iter: 50,
                deficit_cost: 1000.0,
                resample: false,
                single_lp_convergence_pair: false,
            },
            fleet,
            demand: vec![demand],
            inflows: InflowTable::new(vec![vec![vec![10.0]]]),
        }
    }

    #[test]
    fn test_one_stage_all_hydro() {
        let study = one_stage_study(30.0, 50.0);
        let (tree, objective) = run(&study).unwrap();
        let node = tree.node(0, 0);
        assert!(node.final_storage[0].abs() < 1e-4);
        assert!((node.turbined[0] - 30.0).abs() < 1e-4);
        assert!(node.spilled[0].abs() < 1e-4);
        assert!(node.thermal_dispatch[0].abs() < 1e-4);
        assert!(node.deficit.abs() < 1e-4);
        assert!(objective.abs() < 1e-3);
    }

    #[test]
    fn test_one_stage_storage_floor_forces_thermal() {
        // Demand 60 with only 30 units of water available: storage cannot go
        // negative, so hydro tops out at 30 and thermal covers the rest.
        let study = one_stage_study(60.0, 40.0);
        let (tree, objective) = run(&study).unwrap();
        let node = tree.node(0, 0);
        assert!((node.turbined[0] - 30.0).abs() < 1e-4);
        assert!((node.thermal_dispatch[0] - 30.0).abs() < 1e-4);
        assert!(node.deficit.abs() < 1e-4);
        assert!((objective - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_two_stage_tree_dimensions() {
        let mut study = one_stage_study(30.0, 50.0);
        study.config.stage_count = 2;
        study.config.branch_count = 2;
        study.demand = vec![30.0, 30.0];
        study.inflows = InflowTable::new(vec![vec![vec![10.0], vec![5.0, 15.0]]]);
        let (tree, _) = run(&study).unwrap();
        assert_eq!(tree.nodes_at(0), 1);
        assert_eq!(tree.nodes_at(1), 2);
        for k in 0..2 {
            let node = tree.node(1, k);
            assert!(node.is_solved());
            // Storage chains from the root's final storage.
            assert!((node.initial_storage[0] - tree.node(0, 0).final_storage[0]).abs() < 1e-6);
        }
    }
}
