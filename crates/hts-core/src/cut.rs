//! Benders cut value object and per-node cut pools.

use serde::{Deserialize, Serialize};

/// Per-component tolerance under which two cuts are considered the same.
pub const CUT_TOLERANCE: f64 = 1e-18;

/// A linear lower bound on the future-cost function:
/// `alpha >= slope · vf + intercept`.
///
/// `slope` has one coefficient per hydro, in hydro declaration order. The
/// `provenance` cost is the objective of the subproblem that generated the
/// cut; it is used only to order cuts when selecting the cost tail, never in
/// the constraint itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cut {
    pub slope: Vec<f64>,
    pub intercept: f64,
    pub provenance: f64,
}

impl Cut {
    pub fn new(slope: Vec<f64>, intercept: f64, provenance: f64) -> Self {
        Self {
            slope,
            intercept,
            provenance,
        }
    }

    /// Tolerance-based equality on (slope, intercept).
    ///
    /// Provenance is deliberately ignored: two numerically identical
    /// hyperplanes constrain alpha identically regardless of which
    /// subproblem produced them.
    pub fn approx_eq(&self, other: &Cut) -> bool {
        if self.slope.len() != other.slope.len() {
            return false;
        }
        for (a, b) in self.slope.iter().zip(other.slope.iter()) {
            if (a - b).abs() > CUT_TOLERANCE {
                return false;
            }
        }
        (self.intercept - other.intercept).abs() <= CUT_TOLERANCE
    }

    /// Evaluate the right-hand side at a storage vector.
    pub fn evaluate(&self, storage: &[f64]) -> f64 {
        self.slope
            .iter()
            .zip(storage.iter())
            .map(|(s, v)| s * v)
            .sum::<f64>()
            + self.intercept
    }
}

/// The cuts attached to one position of a tree or comb.
///
/// Cuts accumulate monotonically; insertion deduplicates with a linear
/// tolerance scan so numerically identical hyperplanes never pile up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutPool {
    cuts: Vec<Cut>,
}

impl CutPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cut unless an equivalent one is already present.
    /// Returns whether the cut was inserted.
    pub fn push(&mut self, cut: Cut) -> bool {
        if self.cuts.iter().any(|c| c.approx_eq(&cut)) {
            return false;
        }
        self.cuts.push(cut);
        true
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cut> {
        self.cuts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Cut> {
        self.cuts.get(index)
    }

    pub fn as_slice(&self) -> &[Cut] {
        &self.cuts
    }
}
