//! # hts-algo: Scheduling Engines
//!
//! The three solution engines for stochastic hydrothermal scheduling and
//! their shared scaffolding:
//!
//! - [`single_lp`] - the deterministic equivalent, one LP over the whole tree
//! - [`ddp`] - dual dynamic programming (nested Benders) over the tree
//! - [`sddp`] - stochastic dual dynamic programming over a sampled comb
//!
//! Shared pieces: the per-stage subproblem template ([`stage`]), the inflow
//! structures ([`tree`], [`comb`]), per-position solved state ([`node`]), the
//! final simulation ([`sim`]) and the study result ([`result`]).
//!
//! [`run_study`] is the single entry point: it validates the study, runs the
//! configured engine, evaluates the converged policy on the reference fan and
//! returns a [`StudyResult`] ready for reporting.

use hts_core::{CutPool, HtsResult, Method, Study};
use tracing::info;

pub mod comb;
pub mod ddp;
pub mod node;
pub mod result;
pub mod sddp;
pub mod sim;
pub mod single_lp;
pub mod stage;
pub mod tree;

pub use comb::InflowComb;
pub use ddp::DdpOutcome;
pub use node::NodeState;
pub use result::{Scenario, StudyResult};
pub use sddp::SddpOutcome;
pub use sim::SimulationOutcome;
pub use stage::{FutureCost, StageSolution, FUTURE_COST_WEIGHT, SPILL_PENALTY};
pub use tree::InflowTree;

/// Run a study with its configured method and produce the reportable result.
pub fn run_study(study: &Study) -> HtsResult<StudyResult> {
    study.validate()?;
    info!(
        study = %study.config.study_name,
        method = %study.config.method,
        stages = study.config.stage_count,
        "dispatching study"
    );

    match study.config.method {
        Method::SingleLp => run_single_lp(study),
        Method::Ddp => run_ddp(study),
        Method::Sddp => run_sddp(study),
    }
}

fn run_single_lp(study: &Study) -> HtsResult<StudyResult> {
    let (tree, objective) = single_lp::run(study)?;
    let scenarios = sim::scenarios_from_tree(study, &tree);
    // No iterative bounds exist; a degenerate pair is emitted only on request.
    let series = if study.config.single_lp_convergence_pair {
        vec![objective]
    } else {
        Vec::new()
    };
    Ok(StudyResult {
        config: study.config.clone(),
        fleet: study.fleet.clone(),
        scenarios,
        z_sup: series.clone(),
        z_inf: series,
        confidence_intervals: Vec::new(),
        cuts: Vec::new(),
        objective: Some(objective),
        converged: true,
        iterations: 0,
    })
}

fn run_ddp(study: &Study) -> HtsResult<StudyResult> {
    let outcome = ddp::run(study)?;
    let (final_sup, final_inf) = sim::tree_final_pair(&outcome.tree);
    let mut z_sup = outcome.z_sup;
    let mut z_inf = outcome.z_inf;
    z_sup.push(final_sup);
    z_inf.push(final_inf);

    let scenarios = sim::scenarios_from_tree(study, &outcome.tree);
    let cuts: Vec<Vec<CutPool>> = (0..outcome.tree.stage_count())
        .map(|stage| {
            (0..outcome.tree.nodes_at(stage))
                .map(|node| outcome.tree.node(stage, node).cuts.clone())
                .collect()
        })
        .collect();

    Ok(StudyResult {
        config: study.config.clone(),
        fleet: study.fleet.clone(),
        scenarios,
        z_sup,
        z_inf,
        confidence_intervals: Vec::new(),
        cuts,
        objective: None,
        converged: outcome.converged,
        iterations: outcome.iterations,
    })
}

fn run_sddp(study: &Study) -> HtsResult<StudyResult> {
    let outcome = sddp::run(study)?;
    let mut fan = outcome.comb.final_simulation_fan(study);
    let simulation = sim::simulate_fan(study, &mut fan)?;

    let mut z_sup = outcome.z_sup;
    let mut z_inf = outcome.z_inf;
    z_sup.push(simulation.z_sup);
    z_inf.push(simulation.z_inf);

    // Cut pools are shared across teeth; the first tooth is the reference.
    let cuts: Vec<Vec<CutPool>> = outcome.comb.teeth[0]
        .iter()
        .map(|node| vec![node.cuts.clone()])
        .collect();

    Ok(StudyResult {
        config: study.config.clone(),
        fleet: study.fleet.clone(),
        scenarios: simulation.scenarios,
        z_sup,
        z_inf,
        confidence_intervals: outcome.confidence,
        cuts,
        objective: None,
        converged: outcome.converged,
        iterations: outcome.iterations,
    })
}
