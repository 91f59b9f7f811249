//! Engine-level tests on small fleets with hand-checkable optima.

use hts_algo::{ddp, run_study, sddp};
use hts_core::{
    Config, Fleet, Hydro, HydroId, InflowTable, Method, Study, Thermal, ThermalId,
};

fn base_config(method: Method) -> Config {
    Config {
        study_name: "fixture".to_string(),
        method,
        stage_count: 1,
        branch_count: 1,
        trajectory_count: 1,
        tail_fraction: 0.0,
        tail_weight: 0.0,
        confidence_z: 1.96,
        seed: 23,
        post_study_repeats: 0,
        min_iter: 1,
        max_iter: 50,
        deficit_cost: 1000.0,
        resample: false,
        single_lp_convergence_pair: false,
    }
}

/// Single hydro (20 stored, 10 inflow, productivity 1, turbine 50) and one
/// thermal (100 MW at $10).
fn small_fleet(max_turbine: f64) -> Fleet {
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
fn one_stage_dispatch_is_all_hydro() {
    let study = Study {
        config: base_config(Method::SingleLp),
        fleet: small_fleet(50.0),
        demand: vec![30.0],
        inflows: InflowTable::new(vec![vec![vec![10.0]]]),
    };
    let result = run_study(&study).unwrap();
    assert!(result.converged);
    let scenario = &result.scenarios[0];
    assert!(scenario.final_storage[0][0].abs() < 1e-4);
    assert!((scenario.turbined[0][0] - 30.0).abs() < 1e-4);
    assert!(scenario.spilled[0][0].abs() < 1e-4);
    assert!(scenario.thermal_dispatch[0][0].abs() < 1e-4);
    assert!(scenario.deficit[0].abs() < 1e-4);
    assert!(result.objective.unwrap().abs() < 1e-3);
    // Convergence series stays empty unless the degenerate pair is requested.
    assert!(result.z_sup.is_empty());
}

#[test]
fn one_stage_storage_floor_forces_thermal() {
    // Demand 60 with the turbine capped at 40: only 30 units of water exist,
    // so the storage floor binds first and thermal covers the other half.
    let study = Study {
        config: base_config(Method::SingleLp),
        fleet: small_fleet(40.0),
        demand: vec![60.0],
        inflows: InflowTable::new(vec![vec![vec![10.0]]]),
    };
    let result = run_study(&study).unwrap();
    let scenario = &result.scenarios[0];
    assert!((scenario.turbined[0][0] - 30.0).abs() < 1e-4);
    assert!((scenario.thermal_dispatch[0][0] - 30.0).abs() < 1e-4);
    assert!(scenario.deficit[0].abs() < 1e-4);
    assert!((result.objective.unwrap() - 300.0).abs() < 1e-3);
}

#[test]
fn single_lp_degenerate_pair_on_request() {
    let mut config = base_config(Method::SingleLp);
    config.single_lp_convergence_pair = true;
    let study = Study {
        config,
        fleet: small_fleet(40.0),
        demand: vec![60.0],
        inflows: InflowTable::new(vec![vec![vec![10.0]]]),
    };
    let result = run_study(&study).unwrap();
    assert_eq!(result.z_sup.len(), 1);
    assert_eq!(result.z_sup, result.z_inf);
}

/// Two hydros, three thermals, two stages, two openings.
fn ddp_sanity_study() -> Study {
    let mut fleet = Fleet::new();
    fleet.add_hydro(
        Hydro::new(HydroId::new(1), "UHE 1".to_string())
            .with_storage(30.0, 0.0, 100.0)
            .with_turbine(1.0, 40.0),
    );
    fleet.add_hydro(
        Hydro::new(HydroId::new(2), "UHE 2".to_string())
            .with_storage(20.0, 0.0, 80.0)
            .with_turbine(0.8, 30.0),
    );
    fleet.add_thermal(
        Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(30.0, 8.0),
    );
    fleet.add_thermal(
        Thermal::new(ThermalId::new(2), "UTE 2".to_string()).with_dispatch(30.0, 15.0),
    );
    fleet.add_thermal(
        Thermal::new(ThermalId::new(3), "UTE 3".to_string()).with_dispatch(40.0, 30.0),
    );
    let mut config = base_config(Method::Ddp);
    config.stage_count = 2;
    config.branch_count = 2;
    config.max_iter = 10;
    Study {
        config,
        fleet,
        demand: vec![80.0, 90.0],
        inflows: InflowTable::new(vec![
            vec![vec![20.0], vec![10.0, 35.0]],
            vec![vec![15.0], vec![5.0, 25.0]],
        ]),
    }
}

#[test]
fn ddp_two_stage_converges_within_ten_iterations() {
    let outcome = ddp::run(&ddp_sanity_study()).unwrap();
    assert!(outcome.converged, "no convergence in 10 iterations");
    let last = outcome.iterations - 1;
    assert!((outcome.z_sup[last] - outcome.z_inf[last]).abs() < 1e-3);
    // Interior nodes accumulate at most one cut per iteration.
    for stage in 0..outcome.tree.stage_count() {
        for node in 0..outcome.tree.nodes_at(stage) {
            assert!(outcome.tree.node(stage, node).cuts.len() <= outcome.iterations);
        }
    }
}

#[test]
fn ddp_cut_pools_hold_no_duplicates() {
    let outcome = ddp::run(&ddp_sanity_study()).unwrap();
    for stage in 0..outcome.tree.stage_count() {
        for node in 0..outcome.tree.nodes_at(stage) {
            let cuts = outcome.tree.node(stage, node).cuts.as_slice();
            for (i, a) in cuts.iter().enumerate() {
                for b in &cuts[i + 1..] {
                    assert!(!a.approx_eq(b), "duplicate cut at stage {stage}");
                }
            }
        }
    }
}

#[test]
fn ddp_matches_deterministic_equivalent() {
    let mut study = ddp_sanity_study();
    let ddp_outcome = ddp::run(&study).unwrap();
    study.config.method = Method::SingleLp;
    let lp_result = run_study(&study).unwrap();
    let lp_objective = lp_result.objective.unwrap();
    let ddp_z_inf = *ddp_outcome.z_inf.last().unwrap();
    let scale = lp_objective.abs().max(1.0);
    assert!(
        (ddp_z_inf - lp_objective).abs() / scale < 1e-2,
        "DDP lower bound {} far from LP optimum {}",
        ddp_z_inf,
        lp_objective
    );
}

/// Shared fixture where the SDDP comb can cover the full tree: candidate
/// counts equal `branch_count`, so the opening sets are forced to the same
/// realizations the DDP tree enumerates.
fn shared_fixture(method: Method) -> Study {
    let mut fleet = Fleet::new();
    fleet.add_hydro(
        Hydro::new(HydroId::new(1), "UHE 1".to_string())
            .with_storage(50.0, 0.0, 100.0)
            .with_turbine(1.0, 60.0),
    );
    fleet.add_thermal(
        Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(50.0, 10.0),
    );
    fleet.add_thermal(
        Thermal::new(ThermalId::new(2), "UTE 2".to_string()).with_dispatch(50.0, 25.0),
    );
    let mut config = base_config(method);
    config.stage_count = 2;
    config.branch_count = 2;
    config.trajectory_count = 2; // branch_count^(stage_count - 1)
    config.min_iter = 5;
    config.max_iter = 30;
    config.deficit_cost = 500.0;
    Study {
        config,
        fleet,
        demand: vec![70.0, 70.0],
        inflows: InflowTable::new(vec![vec![vec![30.0], vec![10.0, 40.0]]]),
    }
}

#[test]
fn sddp_covering_comb_matches_ddp() {
    let sddp_outcome = sddp::run(&shared_fixture(Method::Sddp)).unwrap();
    let ddp_outcome = ddp::run(&shared_fixture(Method::Ddp)).unwrap();
    let sddp_z = *sddp_outcome.z_inf.last().unwrap();
    let ddp_z = *ddp_outcome.z_inf.last().unwrap();
    let scale = ddp_z.abs().max(1.0);
    assert!(
        (sddp_z - ddp_z).abs() / scale < 0.01,
        "SDDP z_inf {} deviates from DDP z_inf {}",
        sddp_z,
        ddp_z
    );
}

#[test]
fn sddp_is_deterministic_for_a_fixed_seed() {
    let study = shared_fixture(Method::Sddp);
    let a = run_study(&study).unwrap();
    let b = run_study(&study).unwrap();
    assert_eq!(a.z_sup, b.z_sup);
    assert_eq!(a.z_inf, b.z_inf);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.cuts.len(), b.cuts.len());
    for (stage_a, stage_b) in a.cuts.iter().zip(&b.cuts) {
        for (pool_a, pool_b) in stage_a.iter().zip(stage_b) {
            assert_eq!(pool_a.len(), pool_b.len());
            for (ca, cb) in pool_a.iter().zip(pool_b.iter()) {
                assert_eq!(ca.slope, cb.slope);
                assert_eq!(ca.intercept, cb.intercept);
            }
        }
    }
}

#[test]
fn sddp_risk_neutral_final_bound_inside_interval() {
    let study = shared_fixture(Method::Sddp);
    let outcome = sddp::run(&study).unwrap();
    if outcome.converged {
        let last = outcome.iterations - 1;
        let (lower, upper) = outcome.confidence[last];
        assert!(outcome.z_inf[last] >= lower);
        assert!(outcome.z_inf[last] <= upper);
    }
}

/// Tail weighting must not release more water in the first stage than the
/// risk-neutral policy: shifting cut weight toward costly openings raises
/// the marginal value of stored water.
#[test]
fn tail_weighting_preserves_first_stage_water() {
    let build = |tail_fraction: f64, tail_weight: f64| {
        let mut fleet = Fleet::new();
        fleet.add_hydro(
            Hydro::new(HydroId::new(1), "UHE 1".to_string())
                .with_storage(40.0, 0.0, 120.0)
                .with_turbine(1.0, 60.0),
        );
        fleet.add_thermal(
            Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(60.0, 12.0),
        );
        let mut config = base_config(Method::Sddp);
        config.stage_count = 3;
        config.branch_count = 5;
        config.trajectory_count = 4;
        config.tail_fraction = tail_fraction;
        config.tail_weight = tail_weight;
        config.min_iter = 3;
        config.max_iter = 20;
        config.deficit_cost = 800.0;
        Study {
            config,
            fleet,
            demand: vec![60.0, 60.0, 60.0],
            inflows: InflowTable::new(vec![vec![
                vec![25.0],
                vec![0.0, 10.0, 20.0, 30.0, 40.0],
                vec![0.0, 10.0, 20.0, 30.0, 40.0],
            ]]),
        }
    };

    let neutral = run_study(&build(0.0, 0.0)).unwrap();
    let averse = run_study(&build(0.2, 0.5)).unwrap();
    let storage = |result: &hts_algo::StudyResult| {
        let mean = result.mean_scenario().unwrap();
        mean.final_storage[0][0]
    };
    assert!(
        storage(&averse) >= storage(&neutral) - 1e-4,
        "risk-averse policy released more first-stage water ({} < {})",
        storage(&averse),
        storage(&neutral)
    );
}
