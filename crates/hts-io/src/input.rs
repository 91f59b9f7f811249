//! Study document reader.
//!
//! A study is one JSON document carrying the configuration, the plant fleet,
//! the per-stage demand and the inflow table:
//!
//! ```json
//! {
//!   "config": {
//!     "study_name": "toy", "method": "SDDP",
//!     "stage_count": 3, "branch_count": 2, "trajectory_count": 4,
//!     "seed": 42, "deficit_cost": 500.0
//!   },
//!   "fleet": {
//!     "hydros": [{ "id": 1, "name": "Reservoir A", "initial_storage": 20.0,
//!                  "min_storage": 0.0, "max_storage": 100.0,
//!                  "productivity": 1.0, "max_turbine": 50.0 }],
//!     "thermals": [{ "id": 1, "name": "GT 1", "capacity": 100.0,
//!                    "marginal_cost": 10.0 }]
//!   },
//!   "demand": [30.0, 30.0, 30.0],
//!   "inflows": [[[10.0], [5.0, 15.0], [2.0, 12.0]]]
//! }
//! ```
//!
//! The document is validated as a whole before it is returned; every
//! violated invariant is reported in one error.

use anyhow::{Context, Result};
use hts_core::Study;
use std::fs;
use std::path::Path;

/// Read and validate a study document from a file.
///
/// `.json` files are parsed as the JSON document; anything else goes through
/// the fixed-width text format of [`crate::text`].
pub fn read_study(path: &Path) -> Result<Study> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading study file: {}", path.display()))?;
    let study = if path.extension().is_some_and(|ext| ext == "json") {
        read_study_str(&content)
    } else {
        crate::text::parse_study_text(&content)
    };
    study.with_context(|| format!("in study file: {}", path.display()))
}

/// Parse and validate a study document from a string.
pub fn read_study_str(content: &str) -> Result<Study> {
    let study: Study =
        serde_json::from_str(content).context("parsing study document")?;
    study.validate().context("validating study document")?;
    Ok(study)
}
