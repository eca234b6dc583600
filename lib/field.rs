//! Corrections to the bare Hamiltonian coefficients from an external magnetic
//! field and a finite operating temperature.
//!
//! The interaction-suppression and Rabi-mixing formulas are empirical fits; see
//! the calibration constants in [`crate::consts`].

use tracing::debug;
use crate::{
    consts::{
        self,
        PhysConsts,
        G_P,
        G_S,
    },
    error::{ AvalancheError, AvalancheResult },
    params::{ Coefficients, DetectorParams },
};

/// A rule mapping a bare parameter set to the one actually used to build the
/// Hamiltonian.
pub trait Correction: Send + Sync {
    /// Apply the correction, producing a new parameter set.
    fn correct(&self, base: &DetectorParams) -> AvalancheResult<DetectorParams>;

    /// Background (dark) excitation rate [1/s] under the conditions the
    /// correction describes.
    fn dark_rate(&self) -> f64 { 0.0 }
}

/// The identity correction: zero field, zero temperature.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NoCorrection;

impl Correction for NoCorrection {
    fn correct(&self, base: &DetectorParams) -> AvalancheResult<DetectorParams> {
        Ok(base.clone())
    }
}

/// Multiplicative suppression of Rydberg interactions at field `b` [T].
///
/// No correction below [`consts::MIXING_FIELD_THRESHOLD`]; above it,
/// `1 - α (B / B₀)²`, never less than [`consts::INTERACTION_FLOOR`].
pub fn interaction_scaling(b: f64) -> f64 {
    if b.abs() < consts::MIXING_FIELD_THRESHOLD {
        1.0
    } else {
        (1.0 - consts::MIXING_ALPHA * (b / consts::MIXING_FIELD_SCALE).powi(2))
            .max(consts::INTERACTION_FLOOR)
    }
}

/// Multiplicative reduction of the drive strength at field `b` [T], never less
/// than [`consts::RABI_FLOOR`].
pub fn drive_scaling(b: f64) -> f64 {
    (1.0 - consts::RABI_MIXING_COEFF * b.powi(2)).max(consts::RABI_FLOOR)
}

/// Boltzmann-suppressed thermal excitation rate [1/s] at `temperature` [K].
///
/// Exactly zero at zero temperature. Negative or non-finite temperatures are
/// rejected.
pub fn thermal_excitation_rate(temperature: f64, pc: &PhysConsts)
    -> AvalancheResult<f64>
{
    if !temperature.is_finite() || temperature < 0.0 {
        return Err(AvalancheError::InvalidTemperature(temperature));
    }
    if temperature == 0.0 { return Ok(0.0); }
    let gap = pc.h() * consts::THERMAL_GAP_FREQ;
    let boltzmann = (-gap / (pc.k_b * temperature)).exp();
    Ok(consts::THERMAL_RATE_SCALE * boltzmann)
}

/// Correction for operation in a magnetic field `b_field` [T] at
/// `temperature` [K].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FieldCorrection {
    b_field: f64,
    temperature: f64,
    consts: PhysConsts,
    thermal_rate: f64,
}

impl FieldCorrection {
    /// Create a new `FieldCorrection` with CODATA constants.
    pub fn new(b_field: f64, temperature: f64) -> AvalancheResult<Self> {
        Self::with_consts(b_field, temperature, PhysConsts::default())
    }

    /// Create a new `FieldCorrection` with a substituted constants table.
    pub fn with_consts(b_field: f64, temperature: f64, consts: PhysConsts)
        -> AvalancheResult<Self>
    {
        if !b_field.is_finite() {
            return Err(AvalancheError::InvalidCoefficient {
                name: "b_field",
                value: b_field,
            });
        }
        let thermal_rate = thermal_excitation_rate(temperature, &consts)?;
        Ok(Self { b_field, temperature, consts, thermal_rate })
    }

    /// Magnetic field [T].
    pub fn b_field(&self) -> f64 { self.b_field }

    /// Temperature [K].
    pub fn temperature(&self) -> f64 { self.temperature }

    /// Zeeman shift of the |r⟩ (S) state [rad/s].
    pub fn zeeman_r(&self) -> f64 {
        G_S * self.consts.mu_b_angular() * self.b_field
    }

    /// Zeeman shift of the |e⟩ (P) state [rad/s].
    pub fn zeeman_e(&self) -> f64 {
        G_P * self.consts.mu_b_angular() * self.b_field
    }

    /// Differential Zeeman shift added to the detuning [rad/s].
    pub fn detuning_shift(&self) -> f64 { self.zeeman_r() - self.zeeman_e() }

    /// Interaction suppression factor at this field.
    pub fn interaction_scaling(&self) -> f64 {
        interaction_scaling(self.b_field)
    }

    /// Drive reduction factor at this field.
    pub fn drive_scaling(&self) -> f64 { drive_scaling(self.b_field) }

    /// Thermal excitation rate at this temperature [1/s].
    pub fn thermal_rate(&self) -> f64 { self.thermal_rate }
}

impl Correction for FieldCorrection {
    fn correct(&self, base: &DetectorParams) -> AvalancheResult<DetectorParams> {
        let Coefficients { drive, detuning, interaction } = base.coefficients();
        let v_scale = self.interaction_scaling();
        let interaction_b = interaction * v_scale;
        // the detuning keeps its offset from facilitation while V moves
        let detuning_b
            = detuning - (interaction_b - interaction) + self.detuning_shift();
        let coeffs = Coefficients {
            drive: drive * self.drive_scaling(),
            detuning: detuning_b,
            interaction: interaction_b,
        };
        debug!(
            b_field = self.b_field,
            temperature = self.temperature,
            v_scale,
            drive_scale = self.drive_scaling(),
            detuning_shift = self.detuning_shift(),
            "applying field correction"
        );
        base.with_corrections(
            coeffs,
            base.v_ee() * v_scale,
            base.v_er() * v_scale,
        )
    }

    fn dark_rate(&self) -> f64 { self.thermal_rate() }
}
