//! Abstract description of a linear program.

/// Handle to a variable of a [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One linear row: `Σ coeff·x (= | <=) rhs`.
#[derive(Debug, Clone)]
pub struct Row {
    pub coeffs: Vec<(VarId, f64)>,
    pub rhs: f64,
}

/// A linear program under construction.
///
/// Variables are free on creation; bounds are recorded separately and lowered
/// to inequality rows when the problem is assembled for the backend. Equality
/// rows keep insertion order because their duals are consumed positionally.
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    pub(crate) objective: Vec<f64>,
    pub(crate) lower: Vec<Option<f64>>,
    pub(crate) upper: Vec<Option<f64>>,
    pub(crate) eqs: Vec<Row>,
    pub(crate) ineqs: Vec<Row>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a free variable with zero objective coefficient.
    pub fn add_variable(&mut self) -> VarId {
        self.objective.push(0.0);
        self.lower.push(None);
        self.upper.push(None);
        VarId(self.objective.len() - 1)
    }

    /// Set the objective coefficient of a variable.
    pub fn set_objective(&mut self, var: VarId, coeff: f64) {
        self.objective[var.0] = coeff;
    }

    /// Bound a variable; `None` leaves the corresponding side free.
    pub fn set_bounds(&mut self, var: VarId, lower: Option<f64>, upper: Option<f64>) {
        self.lower[var.0] = lower;
        self.upper[var.0] = upper;
    }

    /// Append an equality row `Σ coeff·x = rhs`; returns its positional index
    /// for dual lookup.
    pub fn add_eq(&mut self, coeffs: Vec<(VarId, f64)>, rhs: f64) -> usize {
        self.eqs.push(Row { coeffs, rhs });
        self.eqs.len() - 1
    }

    /// Append an inequality row `Σ coeff·x <= rhs`.
    pub fn add_ineq(&mut self, coeffs: Vec<(VarId, f64)>, rhs: f64) {
        self.ineqs.push(Row { coeffs, rhs });
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    pub fn num_equalities(&self) -> usize {
        self.eqs.len()
    }
}
