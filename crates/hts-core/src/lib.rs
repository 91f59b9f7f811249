//! # hts-core: Hydrothermal Scheduling Core
//!
//! Fundamental data structures for stochastic hydrothermal scheduling studies.
//!
//! ## Design Philosophy
//!
//! A study operates on a **fleet** of plants rather than a network: hydro
//! reservoirs coupled in time through their storage, and thermal units coupled
//! to them only through the per-stage load balance. There is no transmission
//! model, so the fleet is a flat, ordered collection:
//!
//! - **Hydros**: reservoirs with storage bounds, productivity and turbine limits
//! - **Thermals**: units with a capacity and a linear marginal cost
//!
//! Ordering is significant. Hydro declaration order fixes the order of the
//! hydro-balance rows in every stage subproblem, and dual multipliers are
//! consumed positionally by the solution engines.
//!
//! ## Quick Start
//!
//! ```rust
//! use hts_core::*;
//!
//! let mut fleet = Fleet::new();
//! fleet.add_hydro(
//!     Hydro::new(HydroId::new(1), "Reservoir A".to_string())
//!         .with_storage(20.0, 0.0, 100.0)
//!         .with_turbine(1.0, 50.0),
//! );
//! fleet.add_thermal(
//!     Thermal::new(ThermalId::new(1), "GT 1".to_string())
//!         .with_dispatch(100.0, 10.0),
//! );
//!
//! let stats = fleet.stats();
//! assert_eq!(stats.num_hydros, 1);
//! assert_eq!(stats.num_thermals, 1);
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Study configuration and solution method selection
//! - [`cut`] - Benders cut value object and per-node cut pools
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`error`] - Unified error type for the HTS ecosystem
//! - [`study`] - Inflow table and the validated study document

use serde::{Deserialize, Serialize};

pub mod config;
pub mod cut;
pub mod diagnostics;
pub mod error;
pub mod study;

pub use config::{Config, Method};
pub use cut::{Cut, CutPool, CUT_TOLERANCE};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{HtsError, HtsResult};
pub use study::{InflowTable, Study};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HydroId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThermalId(usize);

impl HydroId {
    #[inline]
    pub fn new(value: usize) -> Self {
        HydroId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl ThermalId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ThermalId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// A hydro plant: a reservoir with an attached turbine.
///
/// Volumes are in hm³ and generation in MW-average; `productivity` converts
/// turbined volume into generated energy (MWavg per hm³).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hydro {
    pub id: HydroId,
    pub name: String,
    /// Storage at the start of the first stage (hm³)
    pub initial_storage: f64,
    /// Minimum operative storage (hm³)
    pub min_storage: f64,
    /// Maximum operative storage (hm³)
    pub max_storage: f64,
    /// Generation per unit of turbined volume (MWavg/hm³)
    pub productivity: f64,
    /// Maximum turbined volume per stage (hm³)
    pub max_turbine: f64,
}

impl Hydro {
    /// Create a hydro with zeroed physical parameters.
    pub fn new(id: HydroId, name: String) -> Self {
        Self {
            id,
            name,
            initial_storage: 0.0,
            min_storage: 0.0,
            max_storage: 0.0,
            productivity: 0.0,
            max_turbine: 0.0,
        }
    }

    /// Set initial storage and the operative storage range (hm³).
    pub fn with_storage(mut self, initial: f64, min: f64, max: f64) -> Self {
        self.initial_storage = initial;
        self.min_storage = min;
        self.max_storage = max;
        self
    }

    /// Set productivity (MWavg/hm³) and the per-stage turbine limit (hm³).
    pub fn with_turbine(mut self, productivity: f64, max_turbine: f64) -> Self {
        self.productivity = productivity;
        self.max_turbine = max_turbine;
        self
    }
}

/// A thermal unit with a linear generation cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thermal {
    pub id: ThermalId,
    pub name: String,
    /// Maximum generation (MWavg)
    pub capacity: f64,
    /// Cost per unit of generation ($/MWavg)
    pub marginal_cost: f64,
}

impl Thermal {
    /// Create a thermal unit with zeroed dispatch parameters.
    pub fn new(id: ThermalId, name: String) -> Self {
        Self {
            id,
            name,
            capacity: 0.0,
            marginal_cost: 0.0,
        }
    }

    /// Set capacity (MWavg) and marginal cost ($/MWavg).
    pub fn with_dispatch(mut self, capacity: f64, marginal_cost: f64) -> Self {
        self.capacity = capacity;
        self.marginal_cost = marginal_cost;
        self
    }
}

/// The ordered plant fleet of a study.
///
/// Hydro order fixes the hydro-balance row order in every stage subproblem,
/// so it must not change after construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fleet {
    pub hydros: Vec<Hydro>,
    pub thermals: Vec<Thermal>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hydro(&mut self, hydro: Hydro) {
        self.hydros.push(hydro);
    }

    pub fn add_thermal(&mut self, thermal: Thermal) {
        self.thermals.push(thermal);
    }

    /// Compute basic statistics about the fleet
    pub fn stats(&self) -> FleetStats {
        let mut stats = FleetStats::default();
        for hydro in &self.hydros {
            stats.num_hydros += 1;
            stats.total_storage_capacity += hydro.max_storage - hydro.min_storage;
            stats.total_hydro_capacity += hydro.productivity * hydro.max_turbine;
        }
        for thermal in &self.thermals {
            stats.num_thermals += 1;
            stats.total_thermal_capacity += thermal.capacity;
        }
        stats
    }

    /// Validate fleet data for issues that cause solver failures or
    /// meaningless studies.
    ///
    /// Populates the provided `Diagnostics` with any warnings/errors found.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.hydros.is_empty() {
            diag.add_error("structure", "Fleet has no hydro plants");
        }
        for hydro in &self.hydros {
            let entity = format!("Hydro {} ({})", hydro.id.value(), hydro.name);
            if hydro.max_storage < hydro.min_storage {
                diag.add_error_with_entity(
                    "bounds",
                    &format!(
                        "max_storage ({}) below min_storage ({})",
                        hydro.max_storage, hydro.min_storage
                    ),
                    &entity,
                );
            }
            if hydro.initial_storage < hydro.min_storage
                || hydro.initial_storage > hydro.max_storage
            {
                diag.add_error_with_entity(
                    "bounds",
                    &format!(
                        "initial_storage ({}) outside [{}, {}]",
                        hydro.initial_storage, hydro.min_storage, hydro.max_storage
                    ),
                    &entity,
                );
            }
            if hydro.productivity <= 0.0 {
                diag.add_error_with_entity("physical", "productivity must be positive", &entity);
            }
            if hydro.max_turbine <= 0.0 {
                diag.add_error_with_entity("physical", "max_turbine must be positive", &entity);
            }
        }
        for thermal in &self.thermals {
            let entity = format!("Thermal {} ({})", thermal.id.value(), thermal.name);
            if thermal.capacity < 0.0 {
                diag.add_error_with_entity("physical", "capacity must be non-negative", &entity);
            }
            if thermal.marginal_cost < 0.0 {
                diag.add_error_with_entity(
                    "physical",
                    "marginal_cost must be non-negative",
                    &entity,
                );
            }
        }
        if self.thermals.is_empty() {
            diag.add_warning("structure", "Fleet has no thermal units");
        }
    }
}

/// Statistics about a fleet's size and capacity
#[derive(Debug, Clone, Default)]
pub struct FleetStats {
    pub num_hydros: usize,
    pub num_thermals: usize,
    /// Sum of usable reservoir ranges (hm³)
    pub total_storage_capacity: f64,
    /// Generation with every turbine at its limit (MWavg)
    pub total_hydro_capacity: f64,
    pub total_thermal_capacity: f64,
}

impl std::fmt::Display for FleetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hydros ({:.0} MWavg), {} thermals ({:.0} MWavg), {:.0} hm3 usable storage",
            self.num_hydros,
            self.total_hydro_capacity,
            self.num_thermals,
            self.total_thermal_capacity,
            self.total_storage_capacity
        )
    }
}
