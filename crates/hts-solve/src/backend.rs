//! Clarabel backend: assembly and invocation.
//!
//! Clarabel solves the conic program
//!
//! ```text
//! minimize    (1/2)x'Px + q'x
//! subject to  Ax + s = b,  s ∈ K
//! ```
//!
//! An LP maps onto it with P = 0 and K a product of a Zero cone (equality
//! rows) and a Nonnegative cone (inequality rows, `Ax <= b`). Rows are laid
//! out equalities first so equality duals sit at the head of `z` in insertion
//! order.
//!
//! Dual sign: stationarity gives `q + A'z = 0`, so the shadow price of row i
//! (`∂objective/∂b[i]`) is `-z[i]`; the adapter negates `z` before returning.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use crate::problem::{LinearProgram, Row};
use crate::{Solution, SolveError};

/// Solve a linear program, returning primal values, equality duals and the
/// objective value.
pub fn solve(lp: &LinearProgram) -> Result<Solution, SolveError> {
    let n_var = lp.num_variables();
    let m_eq = lp.eqs.len();

    // Column-wise accumulation of the constraint matrix; converted to CSC
    // after all rows are placed.
    let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
    let mut rhs: Vec<f64> = Vec::new();

    let push_row = |row: &Row, cols: &mut Vec<Vec<(usize, f64)>>, rhs: &mut Vec<f64>| {
        let row_idx = rhs.len();
        for &(var, coeff) in &row.coeffs {
            cols[var.index()].push((row_idx, coeff));
        }
        rhs.push(row.rhs);
    };

    // Equality rows first: their position in `rhs` is their dual index.
    for row in &lp.eqs {
        push_row(row, &mut cols, &mut rhs);
    }
    // Explicit inequality rows, then variable bounds lowered to rows.
    for row in &lp.ineqs {
        push_row(row, &mut cols, &mut rhs);
    }
    for (var, bound) in lp.upper.iter().enumerate() {
        if let Some(upper) = bound {
            let row_idx = rhs.len();
            cols[var].push((row_idx, 1.0));
            rhs.push(*upper);
        }
    }
    for (var, bound) in lp.lower.iter().enumerate() {
        if let Some(lower) = bound {
            let row_idx = rhs.len();
            cols[var].push((row_idx, -1.0));
            rhs.push(-lower);
        }
    }

    let m_total = rhs.len();
    let m_ineq = m_total - m_eq;
    let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
    if m_eq > 0 {
        cones.push(SupportedConeT::ZeroConeT(m_eq));
    }
    if m_ineq > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(m_ineq));
    }

    // Convert to CSC: sort each column by row index and concatenate.
    let mut col_ptr = Vec::with_capacity(n_var + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    let mut nnz = 0;
    for col in cols.iter_mut() {
        col_ptr.push(nnz);
        col.sort_by_key(|(r, _)| *r);
        for &(r, v) in col.iter() {
            row_idx.push(r);
            values.push(v);
            nnz += 1;
        }
    }
    col_ptr.push(nnz);

    let a_mat = CscMatrix::new(m_total, n_var, col_ptr, row_idx, values);
    // No quadratic term: P is the empty n×n matrix.
    let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());
    let q = lp.objective.clone();

    let settings = DefaultSettingsBuilder::default()
        .verbose(false)
        .build()
        .map_err(|e| SolveError::Setup(format!("settings: {:?}", e)))?;

    let mut solver = DefaultSolver::new(&p_mat, &q, &a_mat, &rhs, &cones, settings)
        .map_err(|e| SolveError::Setup(format!("{:?}", e)))?;
    solver.solve();

    let sol = &solver.solution;
    match sol.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => {}
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            return Err(SolveError::Infeasible);
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            return Err(SolveError::Unbounded);
        }
        status => return Err(SolveError::Numerical(format!("{:?}", status))),
    }

    Ok(Solution {
        primal: sol.x.clone(),
        eq_duals: sol.z[..m_eq].iter().map(|z| -z).collect(),
        objective: sol.obj_val,
    })
}
