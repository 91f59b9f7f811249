//! Study configuration and solution method selection.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;

/// Solution method for the scheduling problem.
///
/// The method drives the formulation and the complexity of the optimization:
///
/// - `SingleLp`: one deterministic-equivalent linear program over the whole
///   scenario tree
/// - `Ddp`: dual dynamic programming (nested Benders) over the tree
/// - `Sddp`: stochastic dual dynamic programming over a sampled comb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[serde(rename = "SINGLE_LP")]
    SingleLp,
    Ddp,
    Sddp,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::SingleLp => "SINGLE_LP",
            Method::Ddp => "DDP",
            Method::Sddp => "SDDP",
        };
        write!(f, "{}", name)
    }
}

/// General configuration of a scheduling study.
///
/// Constructed once per run from the study document and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub study_name: String,
    pub method: Method,
    /// Number of stages in the planning horizon
    pub stage_count: usize,
    /// Openings (inflow realizations) per stage after the first
    pub branch_count: usize,
    /// Forward trajectories sampled for SDDP
    #[serde(default = "default_one")]
    pub trajectory_count: usize,
    /// Fraction of openings forming the cost tail in risk-averse aggregation
    #[serde(default)]
    pub tail_fraction: f64,
    /// Weight of the tail mean in the aggregated cut
    #[serde(default)]
    pub tail_weight: f64,
    /// Width of the SDDP confidence interval, in standard deviations
    #[serde(default = "default_confidence_z")]
    pub confidence_z: f64,
    /// Seed for the comb sampling generator
    #[serde(default)]
    pub seed: u64,
    /// Extra repetitions of the base horizon in reported scenario series
    #[serde(default)]
    pub post_study_repeats: usize,
    #[serde(default = "default_one")]
    pub min_iter: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Cost of unserved energy ($/MWavg)
    pub deficit_cost: f64,
    /// Redraw every comb node's opening each SDDP iteration
    #[serde(default)]
    pub resample: bool,
    /// Emit a degenerate (objective, objective) convergence pair for SingleLp
    #[serde(default)]
    pub single_lp_convergence_pair: bool,
}

fn default_one() -> usize {
    1
}

fn default_confidence_z() -> f64 {
    1.96
}

fn default_max_iter() -> usize {
    50
}

impl Config {
    /// Risk-averse cut aggregation is active only when both tail knobs are set.
    pub fn risk_averse(&self) -> bool {
        self.tail_fraction > 0.0 && self.tail_weight > 0.0
    }

    /// Validate configuration invariants.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.study_name.is_empty() {
            diag.add_error("config", "study_name must not be empty");
        }
        if self.stage_count < 1 {
            diag.add_error("config", "stage_count must be at least 1");
        }
        if self.branch_count < 1 {
            diag.add_error("config", "branch_count must be at least 1");
        }
        if self.trajectory_count < 1 {
            diag.add_error("config", "trajectory_count must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.tail_fraction) {
            diag.add_error("config", "tail_fraction must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.tail_weight) {
            diag.add_error("config", "tail_weight must lie in [0, 1]");
        }
        if self.confidence_z < 0.0 {
            diag.add_error("config", "confidence_z must be non-negative");
        }
        if self.min_iter < 1 || self.min_iter > self.max_iter {
            diag.add_error("config", "iteration bounds must satisfy 1 <= min_iter <= max_iter");
        }
        if self.deficit_cost <= 0.0 {
            diag.add_error("config", "deficit_cost must be positive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            study_name: "test".to_string(),
            method: Method::Sddp,
            stage_count: 3,
            branch_count: 2,
            trajectory_count: 4,
            tail_fraction: 0.0,
            tail_weight: 0.0,
            confidence_z: 1.96,
            seed: 42,
            post_study_repeats: 0,
            min_iter: 1,
            max_iter: 50,
            deficit_cost: 500.0,
            resample: false,
            single_lp_convergence_pair: false,
        }
    }

    #[test]
    fn test_risk_averse_requires_both_knobs() {
        let mut cfg = sample_config();
        assert!(!cfg.risk_averse());
        cfg.tail_fraction = 0.2;
        assert!(!cfg.risk_averse());
        cfg.tail_weight = 0.5;
        assert!(cfg.risk_averse());
    }

    #[test]
    fn test_validate_ok() {
        let cfg = sample_config();
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_validate_iteration_bounds() {
        let mut cfg = sample_config();
        cfg.min_iter = 10;
        cfg.max_iter = 5;
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("min_iter")));
    }

    #[test]
    fn test_validate_deficit_cost() {
        let mut cfg = sample_config();
        cfg.deficit_cost = 0.0;
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_method_from_json() {
        let method: Method = serde_json::from_str("\"SDDP\"").unwrap();
        assert_eq!(method, Method::Sddp);
        let method: Method = serde_json::from_str("\"SINGLE_LP\"").unwrap();
        assert_eq!(method, Method::SingleLp);
        assert_eq!(Method::Ddp.to_string(), "DDP");
    }
}
