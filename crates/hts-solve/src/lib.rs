//! # hts-solve: LP solver adapter
//!
//! A thin façade over a linear-programming backend, exposing the single
//! operation the scheduling engines need: solve a linear program described
//! abstractly (variables, linear objective, equality and inequality rows) and
//! return primal values, the objective, and the dual multiplier of every
//! equality row.
//!
//! ## Contract
//!
//! - Equality rows keep their insertion order; callers address their duals by
//!   positional index. Inequality duals are not exposed.
//! - Equality duals follow the shadow-price convention
//!   `dual[i] = ∂objective/∂rhs[i]`.
//! - A non-optimal outcome is an error, not a degraded solution. The engines
//!   treat infeasible/unbounded subproblems as fatal.
//!
//! The backend is [Clarabel](https://clarabel.org), a pure-Rust interior
//! point solver, so no native libraries are required.

mod backend;
mod problem;

pub use backend::solve;
pub use problem::{LinearProgram, Row, VarId};

use thiserror::Error;

/// Failure modes of a solve.
#[derive(Error, Debug, Clone)]
pub enum SolveError {
    /// No point satisfies the constraints
    #[error("problem is infeasible")]
    Infeasible,

    /// The objective decreases without bound
    #[error("problem is unbounded")]
    Unbounded,

    /// The backend stopped without a conclusive status
    #[error("solver did not reach an optimum: {0}")]
    Numerical(String),

    /// The problem description could not be handed to the backend
    #[error("solver setup failed: {0}")]
    Setup(String),
}

/// An optimal solution to a [`LinearProgram`].
#[derive(Debug, Clone)]
pub struct Solution {
    /// Value of every variable, indexed by [`VarId`]
    pub primal: Vec<f64>,
    /// Shadow price of every equality row, in insertion order
    pub eq_duals: Vec<f64>,
    /// Objective value at the optimum
    pub objective: f64,
}

impl Solution {
    /// Primal value of one variable.
    pub fn value(&self, var: VarId) -> f64 {
        self.primal[var.index()]
    }
}
