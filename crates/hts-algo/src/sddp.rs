//! Stochastic dual dynamic programming over the sampled inflow comb.
//!
//! Forward passes walk each tooth with its own inflows and previous-stage
//! storage; backward passes enumerate every stage opening to build one
//! aggregated cut per (tooth, stage), shared across all teeth — the
//! trajectory-specific past only affects the incoming storage. Stopping is
//! statistical: the lower bound must fall inside a confidence interval of the
//! per-tooth cost sums (risk-neutral), or the lower bound must stabilize
//! (risk-averse, where the tail-weighted bound need not stay inside the
//! risk-neutral interval).

use hts_core::{Cut, HtsError, HtsResult, Study};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::comb::InflowComb;
use crate::stage::{benders_cut, solve_stage, FutureCost};

/// Additive slack on both ends of the confidence interval.
pub const CONFIDENCE_SLACK: f64 = 1e-8;
/// Span of the last three lower bounds below which a risk-averse run stops.
pub const STABILITY_TOLERANCE: f64 = 1e-3;
/// Iterations of lower-bound history required by the risk-averse rule.
const STABILITY_WINDOW: usize = 3;

/// Outcome of an SDDP run: the comb (with shared cut pools) and the
/// convergence history.
#[derive(Debug)]
pub struct SddpOutcome {
    pub comb: InflowComb,
    pub z_sup: Vec<f64>,
    pub z_inf: Vec<f64>,
    pub confidence: Vec<(f64, f64)>,
    pub converged: bool,
    pub iterations: usize,
}

/// Run SDDP to statistical convergence or `max_iter`.
pub fn run(study: &Study) -> HtsResult<SddpOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(study.config.seed);
    let mut comb = InflowComb::sample(study, &mut rng)?;
    let stage_count = comb.stage_count();
    let initial = study.initial_storages();

    let mut z_sup_series: Vec<f64> = Vec::new();
    let mut z_inf_series: Vec<f64> = Vec::new();
    let mut confidence: Vec<(f64, f64)> = Vec::new();
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0.. {
        if study.config.resample && iter > 0 {
            comb.resample(study, &mut rng);
        }

        // Forward pass, stage-major over the teeth.
        for stage in 0..stage_count {
            for tooth in 0..comb.tooth_count() {
                let vi = if stage == 0 {
                    initial.clone()
                } else {
                    comb.teeth[tooth][stage - 1].final_storage.clone()
                };
                let inflows = comb.teeth[tooth][stage].inflows.clone();
                let solution = {
                    let future = if stage + 1 < stage_count {
                        FutureCost::Cuts(comb.teeth[tooth][stage + 1].cuts.as_slice())
                    } else {
                        FutureCost::Terminal
                    };
                    solve_stage(
                        &study.fleet,
                        study.demand[stage],
                        study.config.deficit_cost,
                        &vi,
                        &inflows,
                        future,
                    )
                }
                .map_err(|e| {
                    HtsError::Solver(format!(
                        "SDDP forward, iteration {}, stage {}, tooth {}: {}",
                        iter + 1,
                        stage,
                        tooth,
                        e
                    ))
                })?;
                comb.teeth[tooth][stage].record(solution);
            }
        }

        // Convergence statistics over the teeth.
        let n_teeth = comb.tooth_count() as f64;
        let z_inf = comb
            .teeth
            .iter()
            .map(|tooth| tooth[0].total_cost)
            .sum::<f64>()
            / n_teeth;
        let tooth_costs: Vec<f64> = comb
            .teeth
            .iter()
            .map(|tooth| tooth.iter().map(|node| node.immediate_cost).sum())
            .collect();
        let z_sup = tooth_costs.iter().sum::<f64>() / n_teeth;
        let variance = tooth_costs
            .iter()
            .map(|c| (c - z_sup) * (c - z_sup))
            .sum::<f64>()
            / n_teeth;
        let sigma = variance.sqrt();
        let lower = (z_sup - study.config.confidence_z * sigma - CONFIDENCE_SLACK).max(1e-3);
        let upper = z_sup + study.config.confidence_z * sigma + CONFIDENCE_SLACK;

        z_inf_series.push(z_inf);
        z_sup_series.push(z_sup);
        confidence.push((lower, upper));
        iterations = iter + 1;
        info!(
            iteration = iterations,
            z_sup, z_inf, lower, upper, "SDDP bounds"
        );

        let stable = if study.config.risk_averse() {
            iterations >= STABILITY_WINDOW && {
                let tail = &z_inf_series[iterations - STABILITY_WINDOW..];
                let max = tail.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let min = tail.iter().cloned().fold(f64::INFINITY, f64::min);
                max - min < STABILITY_TOLERANCE
            }
        } else {
            z_inf >= lower && z_inf <= upper
        };
        if stable && iterations >= study.config.min_iter {
            converged = true;
            break;
        }
        if iterations >= study.config.max_iter {
            warn!(
                iterations,
                z_inf, "SDDP stopped at the iteration limit without converging"
            );
            break;
        }

        // Backward pass: every opening re-solved per (tooth, stage), the
        // aggregated cut shared with every tooth at that stage.
        for stage in (0..stage_count).rev() {
            for tooth in 0..comb.tooth_count() {
                let vi = if stage == 0 {
                    initial.clone()
                } else {
                    comb.teeth[tooth][stage - 1].final_storage.clone()
                };
                let mut raw: Vec<Cut> = Vec::with_capacity(comb.openings[stage].len());
                for position in 0..comb.openings[stage].len() {
                    let inflows = comb.opening_inflows(study, stage, position);
                    let solution = {
                        let future = if stage + 1 < stage_count {
                            FutureCost::Cuts(comb.teeth[tooth][stage + 1].cuts.as_slice())
                        } else {
                            FutureCost::Terminal
                        };
                        solve_stage(
                            &study.fleet,
                            study.demand[stage],
                            study.config.deficit_cost,
                            &vi,
                            &inflows,
                            future,
                        )
                    }
                    .map_err(|e| {
                        HtsError::Solver(format!(
                            "SDDP backward, iteration {}, stage {}, tooth {}, opening {}: {}",
                            iter + 1,
                            stage,
                            tooth,
                            position,
                            e
                        ))
                    })?;
                    raw.push(benders_cut(
                        &solution.water_values,
                        &vi,
                        solution.total_cost,
                    ));
                }
                let aggregated = aggregate_cuts(study, raw);
                debug!(stage, tooth, intercept = aggregated.intercept, "new cut");
                for shared in comb.teeth.iter_mut() {
                    shared[stage].cuts.push(aggregated.clone());
                }
            }
        }
    }

    Ok(SddpOutcome {
        comb,
        z_sup: z_sup_series,
        z_inf: z_inf_series,
        confidence,
        converged,
        iterations,
    })
}

/// Combine the raw per-opening cuts of one (tooth, stage) into the cut that
/// is actually imposed: the arithmetic mean, optionally blended with the mean
/// of the costliest openings (the tail) in risk-averse mode.
fn aggregate_cuts(study: &Study, mut raw: Vec<Cut>) -> Cut {
    let mean = mean_cut(&raw);
    if !study.config.risk_averse() {
        return mean;
    }
    let tail_count = (study.config.tail_fraction * study.config.branch_count as f64).floor()
        as usize;
    let tail_count = tail_count.min(raw.len());
    if tail_count == 0 {
        return mean;
    }
    raw.sort_by(|a, b| {
        b.provenance
            .partial_cmp(&a.provenance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let tail = mean_cut(&raw[..tail_count]);
    let w = study.config.tail_weight;
    let slope: Vec<f64> = mean
        .slope
        .iter()
        .zip(&tail.slope)
        .map(|(m, t)| (1.0 - w) * m + w * t)
        .collect();
    Cut::new(
        slope,
        (1.0 - w) * mean.intercept + w * tail.intercept,
        (1.0 - w) * mean.provenance + w * tail.provenance,
    )
}

fn mean_cut(cuts: &[Cut]) -> Cut {
    let n = cuts.len() as f64;
    let dims = cuts.first().map_or(0, |c| c.slope.len());
    let mut slope = vec![0.0; dims];
    let mut intercept = 0.0;
    let mut provenance = 0.0;
    for cut in cuts {
        for (acc, s) in slope.iter_mut().zip(&cut.slope) {
            *acc += s / n;
        }
        intercept += cut.intercept / n;
        provenance += cut.provenance / n;
    }
    Cut::new(slope, intercept, provenance)
}
