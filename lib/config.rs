//! TOML description of a detector run.
//!
//! ```toml
//! n_atoms = 11
//! scenario = "microwave"   # or "terahertz"
//! strategy = "eigen"       # "direct" | "eigen" | "rk4"
//!
//! [field]
//! b_field = 1.0            # T
//! temperature = 4.0        # K
//!
//! [initial]
//! kind = "local"           # or "collective"
//! site = 5                 # defaults to the center
//!
//! [time]
//! max_factor = 10.0        # grid covers [0, max_factor * T_a]
//! points = 100
//!
//! [numerics]
//! memory_budget = 8589934592
//! tolerances = { norm = 1e-8 }
//! step = { step_bound = 0.01, max_substeps = 50000000 }
//! ```
//!
//! Everything but `n_atoms` may be omitted.

use std::path::Path;
use serde::Deserialize;
use crate::{
    detector::{ AvalancheSim, TimeSpan },
    error::AvalancheResult,
    evolution::{ EvolveOptions, StepControl, Strategy },
    field::FieldCorrection,
    hilbert::InitialState,
    operators::DEFAULT_MEMORY_BUDGET,
    params::{ DetectorParams, Scenario },
    tolerances::Tolerances,
};

/// Operating conditions of the detector. Omitted entirely for an
/// uncorrected run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Magnetic field [T].
    pub b_field: f64,
    /// Temperature [K].
    pub temperature: f64,
}

/// Choice of initial state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InitialConfig {
    Local {
        #[serde(default)]
        site: Option<usize>,
    },
    Collective,
}

impl Default for InitialConfig {
    fn default() -> Self { Self::Local { site: None } }
}

impl From<InitialConfig> for InitialState {
    fn from(cfg: InitialConfig) -> Self {
        match cfg {
            InitialConfig::Local { site } => Self::Local(site),
            InitialConfig::Collective => Self::Collective,
        }
    }
}

/// Numerical settings.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NumericsConfig {
    pub tolerances: Tolerances,
    /// Bytes available for dense operators.
    pub memory_budget: u64,
    pub step: StepControl,
}

impl Default for NumericsConfig {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            memory_budget: DEFAULT_MEMORY_BUDGET as u64,
            step: StepControl::default(),
        }
    }
}

/// Complete description of a run, as read from TOML.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SimConfig {
    pub n_atoms: usize,
    #[serde(default)]
    pub scenario: Scenario,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub field: Option<FieldConfig>,
    #[serde(default)]
    pub initial: InitialConfig,
    #[serde(default)]
    pub time: TimeSpan,
    #[serde(default)]
    pub numerics: NumericsConfig,
}

impl SimConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml_str(s: &str) -> AvalancheResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML config file.
    pub fn from_file<P>(path: P) -> AvalancheResult<Self>
    where P: AsRef<Path>
    {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Uncorrected parameters of the configured scenario.
    pub fn params(&self) -> AvalancheResult<DetectorParams> {
        DetectorParams::from_scenario(self.scenario, self.n_atoms)
    }

    /// Evolution options, including the memory budget.
    pub fn options(&self) -> EvolveOptions {
        EvolveOptions {
            strategy: self.strategy,
            tolerances: self.numerics.tolerances,
            step: self.numerics.step,
            memory_budget: self.numerics.memory_budget.into(),
        }
    }

    /// Build the configured simulation.
    ///
    /// Fails if the field correction or any numerical setting is invalid.
    pub fn build(&self) -> AvalancheResult<AvalancheSim> {
        let sim
            = AvalancheSim::new(self.params()?)
            .with_initial_state(self.initial.into())
            .with_options(self.options().validated()?);
        match self.field {
            Some(FieldConfig { b_field, temperature }) => {
                Ok(sim.with_correction(FieldCorrection::new(b_field, temperature)?))
            },
            None => Ok(sim),
        }
    }
}
