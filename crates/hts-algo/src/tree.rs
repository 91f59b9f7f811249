//! Deterministic inflow tree used by the Single-LP and DDP engines.
//!
//! Stage 0 holds a single node with the deterministic first inflow; every
//! node in stage s > 0 has `branch_count` children. Nodes live in per-stage
//! arenas and are addressed by integer index, so parent/child navigation is
//! index arithmetic:
//!
//! - parent of node k at stage s > 0: `k / branch_count`
//! - children of node n at stage s: `[branch_count·n, branch_count·n + branch_count)`
//! - inflow of node k: candidate `k % branch_count` of its stage
//!
//! The numbering is shared contract between the engines: the Single-LP
//! indexes all nodes at once and the DDP averages cuts across siblings, and
//! both must agree on which realization is which.

use hts_core::Study;
use std::ops::Range;

use crate::node::NodeState;

/// Per-stage arenas of tree nodes.
#[derive(Debug, Clone)]
pub struct InflowTree {
    branch_count: usize,
    stages: Vec<Vec<NodeState>>,
}

impl InflowTree {
    /// Build the tree from a study, truncating the inflow table to the first
    /// candidate at stage 0 and the first `branch_count` candidates later.
    pub fn build(study: &Study) -> Self {
        let branch_count = study.config.branch_count;
        let mut stages = Vec::with_capacity(study.config.stage_count);
        let mut count = 1usize;
        for stage in 0..study.config.stage_count {
            let mut nodes = Vec::with_capacity(count);
            for k in 0..count {
                let candidate = if stage == 0 { 0 } else { k % branch_count };
                nodes.push(NodeState::new(study.inflows.joint(stage, candidate)));
            }
            stages.push(nodes);
            count *= branch_count;
        }
        Self {
            branch_count,
            stages,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn nodes_at(&self, stage: usize) -> usize {
        self.stages[stage].len()
    }

    /// Index of the parent node in the previous stage.
    pub fn parent_index(&self, node: usize) -> usize {
        node / self.branch_count
    }

    /// Contiguous index range of a node's children in the next stage.
    pub fn possible_children(&self, stage: usize, node: usize) -> Range<usize> {
        if stage + 1 >= self.stages.len() {
            return 0..0;
        }
        let start = self.branch_count * node;
        start..start + self.branch_count
    }

    pub fn node(&self, stage: usize, index: usize) -> &NodeState {
        &self.stages[stage][index]
    }

    pub fn node_mut(&mut self, stage: usize, index: usize) -> &mut NodeState {
        &mut self.stages[stage][index]
    }

    /// All root-to-leaf paths, each as a list of (stage, node index).
    pub fn leaf_paths(&self) -> Vec<Vec<usize>> {
        let last = self.stages.len() - 1;
        (0..self.stages[last].len())
            .map(|leaf| {
                let mut path = vec![0; self.stages.len()];
                let mut node = leaf;
                for stage in (0..self.stages.len()).rev() {
                    path[stage] = node;
                    node = self.parent_index(node);
                }
                path
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hts_core::{Config, Fleet, Hydro, HydroId, InflowTable, Method, Study, Thermal, ThermalId};

    fn sample_study(stage_count: usize, branch_count: usize) -> Study {
        let mut fleet = Fleet::new();
        fleet.add_hydro(
            Hydro::new(HydroId::new(1), "UHE 1".to_string())
                .with_storage(20.0, 0.0, 100.0)
                .with_turbine(1.0, 50.0),
        );
        fleet.add_thermal(
            Thermal::new(ThermalId::new(1), "UTE 1".to_string()).with_dispatch(100.0, 10.0),
        );
        let per_stage: Vec<Vec<f64>> = (0..stage_count)
            .map(|s| (0..4).map(|c| (s * 10 + c) as f64).collect())
            .collect();
        Study {
            config: Config {
                study_name: "tree".to_string(),
                method: Method::Ddp,
                stage_count,
                branch_count,
                trajectory_count: 1,
                tail_fraction: 0.0,
                tail_weight: 0.0,
                confidence_z: 1.96,
                seed: 0,
                post_study_repeats: 0,
                min_iter: 1,
                max_iter: 50,
                deficit_cost: 500.0,
                resample: false,
                single_lp_convergence_pair: false,
            },
            fleet,
            demand: vec![30.0; stage_count],
            inflows: InflowTable::new(vec![per_stage]),
        }
    }

    #[test]
    fn test_node_counts_per_stage() {
        let tree = InflowTree::build(&sample_study(4, 3));
        assert_eq!(tree.nodes_at(0), 1);
        assert_eq!(tree.nodes_at(1), 3);
        assert_eq!(tree.nodes_at(2), 9);
        assert_eq!(tree.nodes_at(3), 27);
    }

    #[test]
    fn test_parent_and_children_agree() {
        let tree = InflowTree::build(&sample_study(3, 2));
        for stage in 1..tree.stage_count() {
            for k in 0..tree.nodes_at(stage) {
                let parent = tree.parent_index(k);
                assert!(tree.possible_children(stage - 1, parent).contains(&k));
            }
        }
        assert_eq!(tree.possible_children(0, 0), 0..2);
        assert_eq!(tree.possible_children(1, 1), 2..4);
        assert_eq!(tree.possible_children(2, 0), 0..0);
    }

    #[test]
    fn test_inflow_truncation() {
        let tree = InflowTree::build(&sample_study(3, 2));
        // Stage 0: first candidate only.
        assert_eq!(tree.node(0, 0).inflows, vec![0.0]);
        // Stage 1: candidates cycle modulo branch_count.
        assert_eq!(tree.node(1, 0).inflows, vec![10.0]);
        assert_eq!(tree.node(1, 1).inflows, vec![11.0]);
        // Stage 2 node 3: candidate 3 % 2 = 1.
        assert_eq!(tree.node(2, 3).inflows, vec![21.0]);
    }

    #[test]
    fn test_leaf_paths() {
        let tree = InflowTree::build(&sample_study(3, 2));
        let paths = tree.leaf_paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[3], vec![0, 1, 3]);
        assert_eq!(paths[2], vec![0, 1, 2]);
    }
}
