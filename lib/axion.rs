//! Axion-to-photon conversion in a magnetized cavity, as a source of the
//! photons the detector is meant to count.

use crate::{
    consts::PhysConsts,
    error::{ check_finite, AvalancheResult },
    field::FieldCorrection,
};

/// Target conversion power in the cavity [W].
pub const CONVERSION_POWER: f64 = 1.0e-22;

/// Axion mass and cavity conditions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxionParams {
    mass_uev: f64,
    b_field: f64,
    cavity_volume_l: f64,
    consts: PhysConsts,
}

impl Default for AxionParams {
    fn default() -> Self {
        Self {
            mass_uev: 20.0,
            b_field: 5.0,
            cavity_volume_l: 1.0,
            consts: PhysConsts::default(),
        }
    }
}

impl AxionParams {
    /// Create a new `AxionParams` from an axion mass [µeV], a cavity field
    /// [T], and a cavity volume [L].
    pub fn new(mass_uev: f64, b_field: f64, cavity_volume_l: f64)
        -> AvalancheResult<Self>
    {
        Ok(Self {
            mass_uev: check_finite("mass_uev", mass_uev)?,
            b_field: check_finite("b_field", b_field)?,
            cavity_volume_l: check_finite("cavity_volume_l", cavity_volume_l)?,
            consts: PhysConsts::default(),
        })
    }

    /// Use a substituted constants table.
    pub fn with_consts(mut self, consts: PhysConsts) -> Self {
        self.consts = consts;
        self
    }

    /// Axion mass [µeV].
    pub fn mass_uev(&self) -> f64 { self.mass_uev }

    /// Cavity field [T].
    pub fn b_field(&self) -> f64 { self.b_field }

    /// Cavity volume [L].
    pub fn cavity_volume_l(&self) -> f64 { self.cavity_volume_l }

    /// Axion rest energy [J].
    pub fn rest_energy(&self) -> f64 { self.mass_uev * 1e-6 * self.consts.e }

    /// Axion mass [kg].
    pub fn mass_kg(&self) -> f64 { self.rest_energy() / self.consts.c.powi(2) }

    /// Frequency of the converted photon, `m c² / h` [Hz].
    pub fn photon_frequency(&self) -> f64 {
        self.rest_energy() / self.consts.h()
    }

    /// Conversion power [W]; fixed at [`CONVERSION_POWER`].
    pub fn conversion_power(&self) -> f64 { CONVERSION_POWER }

    /// Rate of converted photons [1/s].
    pub fn photon_rate(&self) -> f64 {
        self.conversion_power() / (self.consts.h() * self.photon_frequency())
    }

    /// Field correction for a detector sitting in the cavity field at
    /// `temperature` [K].
    pub fn field_correction(&self, temperature: f64)
        -> AvalancheResult<FieldCorrection>
    {
        FieldCorrection::with_consts(self.b_field, temperature, self.consts)
    }
}
