//! Physical constants and domain-calibrated coefficients.

// g-factors [dimensionless]
pub const G_S: f64 = 2.0; // |r⟩, nS_{1/2}
pub const G_P: f64 = 1.5; // |e⟩, nP, fine-structure averaged

// Thermal excitation gap [Hz]; the 68S -> 70P transition
pub const THERMAL_GAP_FREQ: f64 = 54.0e9;

// Spontaneous rate scale for thermal excitation [1/s]
pub const THERMAL_RATE_SCALE: f64 = 1.0e3;

// Interaction suppression from field-induced state mixing. These are empirical
// fits and must be validated externally before being changed.
pub const MIXING_FIELD_THRESHOLD: f64 = 0.5; // T
pub const MIXING_FIELD_SCALE: f64 = 1.0; // T
pub const MIXING_ALPHA: f64 = 0.1;
pub const INTERACTION_FLOOR: f64 = 0.5;

// Rabi frequency reduction from state mixing, also empirical
pub const RABI_MIXING_COEFF: f64 = 0.05; // 1/T^2
pub const RABI_FLOOR: f64 = 0.7;

/// Read-only table of fundamental constants in SI units.
///
/// Passed by value into anything that converts between physical units so
/// that tests can substitute their own values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhysConsts {
    /// Reduced Planck constant [J s]
    pub hbar: f64,
    /// Bohr magneton [J / T]
    pub mu_b: f64,
    /// Boltzmann constant [J / K]
    pub k_b: f64,
    /// Speed of light [m / s]
    pub c: f64,
    /// Elementary charge [C]
    pub e: f64,
}

impl Default for PhysConsts {
    fn default() -> Self {
        Self {
            hbar: 1.054571817e-34,
            mu_b: 9.274009994e-24,
            k_b: 1.380649e-23,
            c: 299792458.0,
            e: 1.602176634e-19,
        }
    }
}

impl PhysConsts {
    /// Planck constant [J s]
    pub fn h(&self) -> f64 { std::f64::consts::TAU * self.hbar }

    /// Bohr magneton in angular frequency per tesla [rad / (s T)]
    pub fn mu_b_angular(&self) -> f64 { self.mu_b / self.hbar }
}
