//! Dual dynamic programming (nested Benders) over the deterministic tree.
//!
//! Each outer iteration sweeps the tree forward in stage order, solving every
//! node's stage subproblem with its parent's storage, then — if the bounds
//! have not met — sweeps backward generating one Benders cut per node from
//! the subproblem duals. A parent's subproblem sees the position-wise average
//! of its children's cut lists, which is well defined because the backward
//! pass appends exactly one cut per node per iteration.

use hts_core::{Cut, HtsError, HtsResult, Study};
use tracing::{debug, info, warn};

use crate::stage::{average_cuts, benders_cut, solve_stage, FutureCost};
use crate::tree::InflowTree;

/// Absolute gap under which the upper and lower bounds are considered met.
pub const DDP_TOLERANCE: f64 = 1e-3;

/// Outcome of a DDP run: the populated tree and the bound history.
#[derive(Debug)]
pub struct DdpOutcome {
    pub tree: InflowTree,
    pub z_sup: Vec<f64>,
    pub z_inf: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Run DDP to convergence or `max_iter`.
pub fn run(study: &Study) -> HtsResult<DdpOutcome> {
    let mut tree = InflowTree::build(study);
    let stage_count = tree.stage_count();
    let initial = study.initial_storages();

    let mut z_sup_series = Vec::new();
    let mut z_inf_series = Vec::new();
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0.. {
        // Forward pass. The stage-0 subproblem is identical to the one the
        // previous backward pass just solved (its cuts only change on the
        // next backward), so it is re-solved only on the first iteration.
        for stage in 0..stage_count {
            for node_idx in 0..tree.nodes_at(stage) {
                if stage == 0 && iter > 0 {
                    continue;
                }
                solve_tree_node(study, &mut tree, stage, node_idx, &initial).map_err(|e| {
                    HtsError::Solver(format!(
                        "DDP forward, iteration {}, stage {}, node {}: {}",
                        iter + 1,
                        stage,
                        node_idx,
                        e
                    ))
                })?;
            }
        }

        // Bound estimates from the freshly solved tree.
        let mut z_sup = 0.0;
        for stage in 0..stage_count {
            let weight = 1.0 / tree.nodes_at(stage) as f64;
            for node_idx in 0..tree.nodes_at(stage) {
                z_sup += weight * tree.node(stage, node_idx).immediate_cost;
            }
        }
        let z_inf = tree.node(0, 0).total_cost;
        z_sup_series.push(z_sup);
        z_inf_series.push(z_inf);
        iterations = iter + 1;
        info!(iteration = iterations, z_sup, z_inf, "DDP bounds");

        if (z_sup - z_inf).abs() <= DDP_TOLERANCE && iterations >= study.config.min_iter {
            converged = true;
            break;
        }
        if iterations >= study.config.max_iter {
            warn!(
                iterations,
                gap = (z_sup - z_inf).abs(),
                "DDP stopped at the iteration limit without converging"
            );
            break;
        }

        // Backward pass: descending stages, descending node index. Interior
        // nodes are re-solved against their children's updated cuts; last
        // stage nodes keep their forward solution. Every node then yields
        // one new cut.
        for stage in (0..stage_count).rev() {
            for node_idx in (0..tree.nodes_at(stage)).rev() {
                if stage + 1 < stage_count {
                    solve_tree_node(study, &mut tree, stage, node_idx, &initial).map_err(
                        |e| {
                            HtsError::Solver(format!(
                                "DDP backward, iteration {}, stage {}, node {}: {}",
                                iter + 1,
                                stage,
                                node_idx,
                                e
                            ))
                        },
                    )?;
                }
                let node = tree.node(stage, node_idx);
                let cut = benders_cut(&node.water_values, &node.initial_storage, node.total_cost);
                debug!(stage, node = node_idx, intercept = cut.intercept, "new cut");
                tree.node_mut(stage, node_idx).cuts.push(cut);
            }
        }
    }

    Ok(DdpOutcome {
        tree,
        z_sup: z_sup_series,
        z_inf: z_inf_series,
        converged,
        iterations,
    })
}

/// Solve one tree node's stage subproblem in place.
fn solve_tree_node(
    study: &Study,
    tree: &mut InflowTree,
    stage: usize,
    node_idx: usize,
    initial: &[f64],
) -> Result<(), hts_solve::SolveError> {
    let vi = if stage == 0 {
        initial.to_vec()
    } else {
        tree.node(stage - 1, tree.parent_index(node_idx))
            .final_storage
            .clone()
    };
    let inflows = tree.node(stage, node_idx).inflows.clone();
    let averaged: Vec<Cut> = if stage + 1 < tree.stage_count() {
        let pools: Vec<_> = tree
            .possible_children(stage, node_idx)
            .map(|child| &tree.node(stage + 1, child).cuts)
            .collect();
        average_cuts(&pools)
    } else {
        Vec::new()
    };
    let future = if stage + 1 < tree.stage_count() {
        FutureCost::Cuts(&averaged)
    } else {
        FutureCost::Terminal
    };
    let solution = solve_stage(
        &study.fleet,
        study.demand[stage],
        study.config.deficit_cost,
        &vi,
        &inflows,
        future,
    )?;
    tree.node_mut(stage, node_idx).record(solution);
    Ok(())
}
