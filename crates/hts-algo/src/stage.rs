//! The per-stage dispatch subproblem shared by the DDP and SDDP engines.
//!
//! One stage solves, for a given incoming storage vector and inflow
//! realization:
//!
//! ```text
//! minimize    Σ_t cost_t·gt[t] + deficit_cost·deficit
//!             + 0.01·Σ_h vv[h] + 1.0·alpha
//!
//! subject to  vf[h] + vt[h] + vv[h] = vi[h] + inflow[h]      (per hydro)
//!             Σ_h prod_h·vt[h] + Σ_t gt[t] + deficit = demand
//!             min_storage ≤ vf ≤ max_storage
//!             0 ≤ vt ≤ max_turbine,  vv ≥ 0
//!             0 ≤ gt ≤ capacity,  deficit ≥ 0
//!             alpha ≥ 0
//!             alpha ≥ slope·vf + intercept                   (per cut)
//! ```
//!
//! Equality order is normative: hydro balances in declaration order, then the
//! load balance. The engines read duals positionally — the water value at
//! hydro h is the negated dual of balance h, the marginal operation cost is
//! the absolute dual of the load balance.

use hts_core::{Cut, Fleet};
use hts_solve::{LinearProgram, SolveError};

/// Spillage penalty coefficient, a tie-breaker against wasting water.
pub const SPILL_PENALTY: f64 = 0.01;
/// Weight of the future-cost surrogate in the stage objective.
pub const FUTURE_COST_WEIGHT: f64 = 1.0;

/// Future-cost description of a stage subproblem.
#[derive(Debug, Clone, Copy)]
pub enum FutureCost<'a> {
    /// Last stage: `alpha ≥ 0` only, no cut rows
    Terminal,
    /// Interior stage: `alpha ≥ 0` plus one row per cut
    Cuts(&'a [Cut]),
}

/// Solved values of one stage subproblem.
#[derive(Debug, Clone)]
pub struct StageSolution {
    pub initial_storage: Vec<f64>,
    pub final_storage: Vec<f64>,
    pub turbined: Vec<f64>,
    pub spilled: Vec<f64>,
    pub water_values: Vec<f64>,
    pub thermal_dispatch: Vec<f64>,
    pub deficit: f64,
    pub cmo: f64,
    pub immediate_cost: f64,
    pub future_cost: f64,
    pub total_cost: f64,
}

/// Build and solve one stage subproblem.
pub fn solve_stage(
    fleet: &Fleet,
    demand: f64,
    deficit_cost: f64,
    initial_storage: &[f64],
    inflows: &[f64],
    future: FutureCost<'_>,
) -> Result<StageSolution, SolveError> {
    let n_hydro = fleet.hydros.len();
    let mut lp = LinearProgram::new();

    let vf: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
    let vt: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
    let vv: Vec<_> = (0..n_hydro).map(|_| lp.add_variable()).collect();
    let gt: Vec<_> = fleet.thermals.iter().map(|_| lp.add_variable()).collect();
    let deficit = lp.add_variable();
    let alpha = lp.add_variable();

    for (t, thermal) in fleet.thermals.iter().enumerate() {
        lp.set_objective(gt[t], thermal.marginal_cost);
    }
    lp.set_objective(deficit, deficit_cost);
    for h in 0..n_hydro {
        lp.set_objective(vv[h], SPILL_PENALTY);
    }
    lp.set_objective(alpha, FUTURE_COST_WEIGHT);

    // Hydro balance per hydro, in declaration order (dual index = hydro index)
    for (h, hydro) in fleet.hydros.iter().enumerate() {
        lp.add_eq(
            vec![(vf[h], 1.0), (vt[h], 1.0), (vv[h], 1.0)],
            initial_storage[h] + inflows[h],
        );
        lp.set_bounds(vf[h], Some(hydro.min_storage), Some(hydro.max_storage));
        lp.set_bounds(vt[h], Some(0.0), Some(hydro.max_turbine));
        lp.set_bounds(vv[h], Some(0.0), None);
    }

    // Load balance (dual index = n_hydro)
    let mut balance: Vec<_> = fleet
        .hydros
        .iter()
        .enumerate()
        .map(|(h, hydro)| (vt[h], hydro.productivity))
        .collect();
    balance.extend(gt.iter().map(|&g| (g, 1.0)));
    balance.push((deficit, 1.0));
    lp.add_eq(balance, demand);

    for (t, thermal) in fleet.thermals.iter().enumerate() {
        lp.set_bounds(gt[t], Some(0.0), Some(thermal.capacity));
    }
    lp.set_bounds(deficit, Some(0.0), None);
    lp.set_bounds(alpha, Some(0.0), None);

    // Future-cost rows: alpha ≥ slope·vf + intercept
    if let FutureCost::Cuts(cuts) = future {
        for cut in cuts {
            let mut coeffs: Vec<_> = cut
                .slope
                .iter()
                .enumerate()
                .map(|(h, &s)| (vf[h], s))
                .collect();
            coeffs.push((alpha, -1.0));
            lp.add_ineq(coeffs, -cut.intercept);
        }
    }

    let solution = hts_solve::solve(&lp)?;

    let future_cost = solution.value(alpha);
    let total_cost = solution.objective;
    Ok(StageSolution {
        initial_storage: initial_storage.to_vec(),
        final_storage: vf.iter().map(|&v| solution.value(v)).collect(),
        turbined: vt.iter().map(|&v| solution.value(v)).collect(),
        spilled: vv.iter().map(|&v| solution.value(v)).collect(),
        water_values: (0..n_hydro).map(|h| -solution.eq_duals[h]).collect(),
        thermal_dispatch: gt.iter().map(|&v| solution.value(v)).collect(),
        deficit: solution.value(deficit),
        cmo: solution.eq_duals[n_hydro].abs(),
        immediate_cost: total_cost - future_cost,
        future_cost,
        total_cost,
    })
}

/// Benders cut from a solved subproblem: the subgradient of its objective
/// with respect to the incoming storage vector, anchored at the incumbent.
pub fn benders_cut(water_values: &[f64], initial_storage: &[f64], total_cost: f64) -> Cut {
    let slope: Vec<f64> = water_values.iter().map(|wv| -wv).collect();
    let intercept = total_cost
        - initial_storage
            .iter()
            .zip(&slope)
            .map(|(vi, s)| vi * s)
            .sum::<f64>();
    Cut::new(slope, intercept, total_cost)
}

/// Position-wise average of sibling cut lists, used when a parent's LP
/// approximates the expected future cost over its children.
///
/// Symmetric construction keeps sibling lists the same length (the backward
/// pass appends one cut per node per iteration), so index k pairs
/// corresponding cuts. Deduplication can drop a repeated cut in one sibling
/// near a fixed point; pairing stops at the shortest list so a straggler
/// never misaligns the average.
pub fn average_cuts(children: &[&hts_core::CutPool]) -> Vec<Cut> {
    let Some(first) = children.first() else {
        return Vec::new();
    };
    let n = children.len() as f64;
    let paired = children
        .iter()
        .map(|pool| pool.len())
        .min()
        .unwrap_or(0);
    (0..paired)
        .map(|k| {
            let mut slope = vec![0.0; first.get(k).map_or(0, |c| c.slope.len())];
            let mut intercept = 0.0;
            let mut provenance = 0.0;
            for pool in children {
                let cut = &pool.as_slice()[k];
                for (acc, s) in slope.iter_mut().zip(&cut.slope) {
                    *acc += s / n;
                }
                intercept += cut.intercept / n;
                provenance += cut.provenance / n;
            }
            Cut::new(slope, intercept, provenance)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{CutPool, Hydro, HydroId, Thermal, ThermalId};

    fn single_hydro_fleet(max_turbine: f64) -> Fleet {
        let mut fleet = Fleet::new();
        fleet.add_hydro(
            Hydro::new(HydroId::new(1), "UHE 1".to_string())
                .with_storage(20.0, 0.0, 100.0)
                .with_turbine(1.0, max_turbine),
        );
        fleet.add_thermal(
            Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(100.0, 10.0),
        );
        fleet
    }

    #[test]
    fn test_hydro_covers_demand() {
        // 20 stored + 10 inflow against a 30 MW load: all hydro, no cost.
        let fleet = single_hydro_fleet(50.0);
        let sol = solve_stage(&fleet, 30.0, 1000.0, &[20.0], &[10.0], FutureCost::Terminal)
            .unwrap();
        assert!((sol.final_storage[0]).abs() < 1e-4);
        assert!((sol.turbined[0] - 30.0).abs() < 1e-4);
        assert!(sol.spilled[0].abs() < 1e-4);
        assert!(sol.thermal_dispatch[0].abs() < 1e-4);
        assert!(sol.deficit.abs() < 1e-4);
        assert!(sol.total_cost.abs() < 1e-3);
    }

    #[test]
    fn test_thermal_marginal_when_water_short() {
        // Demand 60, storage limits turbining to 30: thermal makes up 30 at
        // cost 10, and an extra unit of water would displace it.
        let fleet = single_hydro_fleet(40.0);
        let sol = solve_stage(&fleet, 60.0, 1000.0, &[20.0], &[10.0], FutureCost::Terminal)
            .unwrap();
        assert!((sol.turbined[0] - 30.0).abs() < 1e-4);
        assert!((sol.thermal_dispatch[0] - 30.0).abs() < 1e-4);
        assert!(sol.deficit.abs() < 1e-4);
        assert!((sol.total_cost - 300.0).abs() < 1e-3);
        assert!((sol.water_values[0] - 10.0).abs() < 1e-4);
        assert!((sol.cmo - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_deficit_absorbs_shortfall() {
        // Demand beyond every resource: deficit is the only slack left.
        let fleet = single_hydro_fleet(50.0);
        let sol = solve_stage(&fleet, 200.0, 1000.0, &[20.0], &[10.0], FutureCost::Terminal)
            .unwrap();
        assert!((sol.deficit - 70.0).abs() < 1e-3);
        assert!((sol.cmo - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_cut_rows_floor_alpha() {
        // A flat cut alpha >= 500 must appear in the objective.
        let fleet = single_hydro_fleet(50.0);
        let cuts = [Cut::new(vec![0.0], 500.0, 500.0)];
        let sol = solve_stage(
            &fleet,
            30.0,
            1000.0,
            &[20.0],
            &[10.0],
            FutureCost::Cuts(&cuts),
        )
        .unwrap();
        assert!((sol.future_cost - 500.0).abs() < 1e-3);
        assert!((sol.total_cost - 500.0).abs() < 1e-2);
        assert!(sol.immediate_cost.abs() < 1e-2);
    }

    #[test]
    fn test_sloped_cut_values_storage() {
        // alpha >= -20·vf + 2000 makes stored water worth 20/unit, above the
        // thermal cost of 10, so the stage stores instead of turbining.
        let fleet = single_hydro_fleet(50.0);
        let cuts = [Cut::new(vec![-20.0], 2000.0, 2000.0)];
        let sol = solve_stage(
            &fleet,
            30.0,
            1000.0,
            &[20.0],
            &[10.0],
            FutureCost::Cuts(&cuts),
        )
        .unwrap();
        assert!((sol.final_storage[0] - 30.0).abs() < 1e-3);
        assert!(sol.turbined[0].abs() < 1e-3);
        assert!((sol.thermal_dispatch[0] - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_benders_cut_reproduces_cost_at_incumbent() {
        let fleet = single_hydro_fleet(40.0);
        let sol = solve_stage(&fleet, 60.0, 1000.0, &[20.0], &[10.0], FutureCost::Terminal)
            .unwrap();
        let cut = benders_cut(&sol.water_values, &sol.initial_storage, sol.total_cost);
        // At the incumbent storage the cut is tight: slope·vi + intercept = cost.
        let value = cut.evaluate(&sol.initial_storage);
        assert!((value - sol.total_cost).abs() < 1e-4);
        assert!((cut.slope[0] + sol.water_values[0]).abs() < 1e-9);
    }

    #[test]
    fn test_average_cuts_by_position() {
        let mut a = CutPool::new();
        let mut b = CutPool::new();
        a.push(Cut::new(vec![-10.0], 100.0, 100.0));
        b.push(Cut::new(vec![-20.0], 300.0, 300.0));
        let avg = average_cuts(&[&a, &b]);
        assert_eq!(avg.len(), 1);
        assert!((avg[0].slope[0] + 15.0).abs() < 1e-12);
        assert!((avg[0].intercept - 200.0).abs() < 1e-12);
    }
}
