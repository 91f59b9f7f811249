//! Sampled inflow comb used by the SDDP engine.
//!
//! The comb is a set of independently sampled forward trajectories (teeth)
//! plus, per stage, a distinguished set of openings the backward pass
//! enumerates. Sampling is two-phase and fully driven by one seeded
//! generator:
//!
//! 1. per stage > 0, draw `branch_count` distinct candidate indices without
//!    replacement (the stage-opening set; stage 0 keeps its single
//!    deterministic opening);
//! 2. draw `trajectory_count` distinct sequences, one opening per stage,
//!    rejecting duplicates and giving up after 10,000 attempts.

use hts_core::{HtsError, HtsResult, Study};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

use crate::node::NodeState;

/// Attempts allowed when drawing distinct forward trajectories.
const TRAJECTORY_ATTEMPT_CAP: usize = 10_000;

/// The sampled comb: per-stage opening sets and the forward teeth.
#[derive(Debug, Clone)]
pub struct InflowComb {
    /// Candidate indices forming each stage's opening set; `openings[0] == [0]`
    pub openings: Vec<Vec<usize>>,
    /// Opening sequence of each tooth (kept for resampling and reporting)
    pub sequences: Vec<Vec<usize>>,
    /// teeth[d][s]: the stage-s node of tooth d
    pub teeth: Vec<Vec<NodeState>>,
}

impl InflowComb {
    /// Sample the comb for a study. Consumes randomness only from `rng`.
    pub fn sample(study: &Study, rng: &mut ChaCha8Rng) -> HtsResult<Self> {
        let stage_count = study.config.stage_count;
        let branch_count = study.config.branch_count;

        // Phase 1: stage-opening selection, without replacement.
        let mut openings: Vec<Vec<usize>> = Vec::with_capacity(stage_count);
        openings.push(vec![0]);
        for stage in 1..stage_count {
            let candidates = study.inflows.candidate_count(stage);
            let mut pool: Vec<usize> = (0..candidates).collect();
            pool.shuffle(rng);
            pool.truncate(branch_count);
            openings.push(pool);
        }

        // Phase 2: distinct forward sequences through the opening sets.
        let mut sequences: Vec<Vec<usize>> = Vec::with_capacity(study.config.trajectory_count);
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut attempts = 0usize;
        while sequences.len() < study.config.trajectory_count {
            if attempts >= TRAJECTORY_ATTEMPT_CAP {
                return Err(HtsError::Sampling(format!(
                    "could not draw {} distinct trajectories in {} attempts \
                     ({} stage openings per stage)",
                    study.config.trajectory_count, TRAJECTORY_ATTEMPT_CAP, branch_count
                )));
            }
            attempts += 1;
            let seq: Vec<usize> = openings
                .iter()
                .map(|set| set[rng.gen_range(0..set.len())])
                .collect();
            if seen.insert(seq.clone()) {
                sequences.push(seq);
            }
        }

        let teeth = sequences
            .iter()
            .map(|seq| Self::tooth_from_sequence(study, seq))
            .collect();

        Ok(Self {
            openings,
            sequences,
            teeth,
        })
    }

    fn tooth_from_sequence(study: &Study, sequence: &[usize]) -> Vec<NodeState> {
        sequence
            .iter()
            .enumerate()
            .map(|(stage, &candidate)| NodeState::new(study.inflows.joint(stage, candidate)))
            .collect()
    }

    /// Redraw every node's opening uniformly from its stage's opening set.
    /// Cuts and solved values are preserved; only the inflow changes.
    pub fn resample(&mut self, study: &Study, rng: &mut ChaCha8Rng) {
        for (d, tooth) in self.teeth.iter_mut().enumerate() {
            for (stage, node) in tooth.iter_mut().enumerate() {
                let set = &self.openings[stage];
                let candidate = set[rng.gen_range(0..set.len())];
                self.sequences[d][stage] = candidate;
                node.inflows = study.inflows.joint(stage, candidate);
            }
        }
    }

    pub fn stage_count(&self) -> usize {
        self.openings.len()
    }

    pub fn tooth_count(&self) -> usize {
        self.teeth.len()
    }

    /// Joint inflow vector of the opening at `position` within stage's set.
    pub fn opening_inflows(&self, study: &Study, stage: usize, position: usize) -> Vec<f64> {
        study.inflows.joint(stage, self.openings[stage][position])
    }

    /// Every sequence of the exhaustive product fan over the stage-opening
    /// sets, used by the final simulation.
    pub fn product_sequences(&self) -> Vec<Vec<usize>> {
        let mut sequences: Vec<Vec<usize>> = vec![Vec::new()];
        for set in &self.openings {
            let mut next = Vec::with_capacity(sequences.len() * set.len());
            for seq in &sequences {
                for &candidate in set {
                    let mut extended = seq.clone();
                    extended.push(candidate);
                    next.push(extended);
                }
            }
            sequences = next;
        }
        sequences
    }

    /// Build the final-simulation fan: one tooth per product sequence, with
    /// the converged per-stage cut pools copied from the first tooth.
    pub fn final_simulation_fan(&self, study: &Study) -> Vec<Vec<NodeState>> {
        self.product_sequences()
            .iter()
            .map(|seq| {
                let mut tooth = Self::tooth_from_sequence(study, seq);
                for (stage, node) in tooth.iter_mut().enumerate() {
                    node.cuts = self.teeth[0][stage].cuts.clone();
                }
                tooth
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{Config, Fleet, Hydro, HydroId, InflowTable, Method, Thermal, ThermalId};
    use rand::SeedableRng;

    fn sample_study(trajectory_count: usize) -> Study {
        let mut fleet = Fleet::new();
        fleet.add_hydro(
            Hydro::new(HydroId::new(1), "UHE 1".to_string())
                .with_storage(20.0, 0.0, 100.0)
                .with_turbine(1.0, 50.0),
        );
        fleet.add_thermal(
            Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(100.0, 10.0),
        );
        Study {
            config: Config {
                study_name: "comb".to_string(),
                method: Method::Sddp,
                stage_count: 3,
                branch_count: 2,
                trajectory_count,
                tail_fraction: 0.0,
                tail_weight: 0.0,
                confidence_z: 1.96,
                seed: 7,
                post_study_repeats: 0,
                min_iter: 1,
                max_iter: 50,
                deficit_cost: 500.0,
                resample: false,
                single_lp_convergence_pair: false,
            },
            fleet,
            demand: vec![30.0; 3],
            inflows: InflowTable::new(vec![vec![
                vec![10.0],
                vec![0.0, 5.0, 10.0, 15.0, 20.0],
                vec![2.0, 4.0, 6.0, 8.0, 10.0],
            ]]),
        }
    }

    #[test]
    fn test_opening_sets_shape() {
        let study = sample_study(2);
        let mut rng = ChaCha8Rng::seed_from_u64(study.config.seed);
        let comb = InflowComb::sample(&study, &mut rng).unwrap();
        assert_eq!(comb.openings[0], vec![0]);
        for stage in 1..3 {
            assert_eq!(comb.openings[stage].len(), 2);
            let distinct: HashSet<_> = comb.openings[stage].iter().collect();
            assert_eq!(distinct.len(), 2);
            assert!(comb.openings[stage].iter().all(|&c| c < 5));
        }
    }

    #[test]
    fn test_teeth_are_distinct() {
        let study = sample_study(4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let comb = InflowComb::sample(&study, &mut rng).unwrap();
        let distinct: HashSet<_> = comb.sequences.iter().collect();
        assert_eq!(distinct.len(), 4);
        assert_eq!(comb.teeth.len(), 4);
        for tooth in &comb.teeth {
            assert_eq!(tooth.len(), 3);
        }
    }

    #[test]
    fn test_sampling_exhaustion_is_fatal() {
        // Only 2·2 = 4 distinct sequences exist; asking for 5 must fail.
        let study = sample_study(5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = InflowComb::sample(&study, &mut rng).unwrap_err();
        assert!(matches!(err, HtsError::Sampling(_)));
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let study = sample_study(3);
        let mut rng_a = ChaCha8Rng::seed_from_u64(study.config.seed);
        let mut rng_b = ChaCha8Rng::seed_from_u64(study.config.seed);
        let a = InflowComb::sample(&study, &mut rng_a).unwrap();
        let b = InflowComb::sample(&study, &mut rng_b).unwrap();
        assert_eq!(a.openings, b.openings);
        assert_eq!(a.sequences, b.sequences);
    }

    #[test]
    fn test_product_fan_covers_all_sequences() {
        let study = sample_study(2);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let comb = InflowComb::sample(&study, &mut rng).unwrap();
        let product = comb.product_sequences();
        assert_eq!(product.len(), 4);
        let distinct: HashSet<_> = product.iter().collect();
        assert_eq!(distinct.len(), 4);
        for seq in &product {
            assert_eq!(seq[0], 0);
        }
    }

    #[test]
    fn test_resample_stays_within_openings() {
        let study = sample_study(2);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut comb = InflowComb::sample(&study, &mut rng).unwrap();
        comb.resample(&study, &mut rng);
        for seq in &comb.sequences {
            for (stage, candidate) in seq.iter().enumerate() {
                assert!(comb.openings[stage].contains(candidate));
            }
        }
    }
}
