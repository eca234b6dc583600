//! Physical parameters of the avalanche detector.
//!
//! All frequencies and coupling strengths are in units of angular frequency
//! (rad/s) and all times in seconds.

use std::f64::consts::TAU;
use serde::Deserialize;
use crate::{
    error::{ check_finite, AvalancheResult },
    operators::check_atoms,
};

/// Lattice spacing of the tweezer array [m].
pub const LATTICE_SPACING: f64 = 6.0e-6;

/// Transition scheme used by the detector.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// 68S_{1/2} → 70P_{1/2}, absorbing at ~54 GHz.
    #[default]
    Microwave,
    /// 45S_{1/2} → 70P_{1/2}, absorbing at ~1 THz.
    Terahertz,
}

impl Scenario {
    /// Frequency of the absorbed photon.
    pub fn photon_freq(&self) -> f64 {
        match *self {
            Self::Microwave => TAU * 54.0e9,
            Self::Terahertz => TAU * 1.0e12,
        }
    }

    /// `(V_ee, V_er)` for the secondary Rydberg state.
    fn secondary_interactions(&self) -> (f64, f64) {
        match *self {
            Self::Microwave => (TAU * 9.0e6, TAU * 1.0e6),
            Self::Terahertz => (TAU * 5.0e6, TAU * 0.5e6),
        }
    }
}

/// Coefficients of the amplification Hamiltonian.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coefficients {
    /// Drive (Rabi) strength Ω on the |g⟩ ↔ |r⟩ transition.
    pub drive: f64,
    /// Detuning Δ of the drive.
    pub detuning: f64,
    /// Nearest-neighbor |r⟩|r⟩ interaction V.
    pub interaction: f64,
}

impl Coefficients {
    /// Facilitated coefficients, with `Δ = -V`.
    pub fn facilitated(drive: f64, interaction: f64) -> Self {
        Self { drive, detuning: -interaction, interaction }
    }

    /// `Δ + V`; zero when the facilitation condition holds.
    pub fn facilitation_mismatch(&self) -> f64 {
        self.detuning + self.interaction
    }

    pub(crate) fn validated(self) -> AvalancheResult<Self> {
        check_finite("drive", self.drive)?;
        check_finite("detuning", self.detuning)?;
        check_finite("interaction", self.interaction)?;
        Ok(self)
    }
}

/// Complete, immutable parameter set for one run.
///
/// The optimal amplification time `T_a = N / Ω` is derived once at
/// construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorParams {
    pub(crate) n_atoms: usize,
    pub(crate) coeffs: Coefficients,
    pub(crate) v_ee: f64,
    pub(crate) v_er: f64,
    pub(crate) omega_ge: f64,
    pub(crate) photon_freq: f64,
    pub(crate) optimal_time: f64,
}

impl DetectorParams {
    /// Create a new parameter set from explicit Hamiltonian coefficients.
    ///
    /// Secondary-state quantities default to those of
    /// [`Scenario::Microwave`].
    pub fn new(n_atoms: usize, coeffs: Coefficients)
        -> AvalancheResult<Self>
    {
        let scenario = Scenario::Microwave;
        let (v_ee, v_er) = scenario.secondary_interactions();
        Self::assemble(
            n_atoms,
            coeffs,
            v_ee,
            v_er,
            TAU * 30.0e6,
            scenario.photon_freq(),
        )
    }

    /// Create the parameter set of a preset scenario, with the drive detuned
    /// to the facilitation condition.
    pub fn from_scenario(scenario: Scenario, n_atoms: usize)
        -> AvalancheResult<Self>
    {
        let (v_ee, v_er) = scenario.secondary_interactions();
        Self::assemble(
            n_atoms,
            Coefficients::facilitated(TAU * 0.2e6, TAU * 12.5e6),
            v_ee,
            v_er,
            TAU * 30.0e6,
            scenario.photon_freq(),
        )
    }

    fn assemble(
        n_atoms: usize,
        coeffs: Coefficients,
        v_ee: f64,
        v_er: f64,
        omega_ge: f64,
        photon_freq: f64,
    ) -> AvalancheResult<Self>
    {
        check_atoms(n_atoms)?;
        let coeffs = coeffs.validated()?;
        let optimal_time = n_atoms as f64 / coeffs.drive;
        Ok(Self {
            n_atoms,
            coeffs,
            v_ee,
            v_er,
            omega_ge,
            photon_freq,
            optimal_time,
        })
    }

    /// Return a copy with new coefficients and secondary interactions, the
    /// optimal time re-derived from the new drive strength.
    pub(crate) fn with_corrections(
        &self,
        coeffs: Coefficients,
        v_ee: f64,
        v_er: f64,
    ) -> AvalancheResult<Self>
    {
        Self::assemble(
            self.n_atoms,
            coeffs,
            check_finite("v_ee", v_ee)?,
            check_finite("v_er", v_er)?,
            self.omega_ge,
            self.photon_freq,
        )
    }

    /// Number of atoms in the chain.
    pub fn n_atoms(&self) -> usize { self.n_atoms }

    /// Hamiltonian coefficients.
    pub fn coefficients(&self) -> Coefficients { self.coeffs }

    /// Drive strength Ω_gr.
    pub fn drive(&self) -> f64 { self.coeffs.drive }

    /// Detuning Δ_gr.
    pub fn detuning(&self) -> f64 { self.coeffs.detuning }

    /// Interaction strength V_rr.
    pub fn interaction(&self) -> f64 { self.coeffs.interaction }

    /// Interaction strength V_ee between secondary Rydberg states.
    pub fn v_ee(&self) -> f64 { self.v_ee }

    /// Cross interaction strength V_er.
    pub fn v_er(&self) -> f64 { self.v_er }

    /// Rabi frequency Ω_ge of the π-pulse preceding amplification.
    pub fn omega_ge(&self) -> f64 { self.omega_ge }

    /// Frequency of the detected photon.
    pub fn photon_freq(&self) -> f64 { self.photon_freq }

    /// Lattice spacing of the array.
    pub fn lattice_spacing(&self) -> f64 { LATTICE_SPACING }

    /// Optimal amplification time `T_a = N / Ω`.
    pub fn optimal_time(&self) -> f64 { self.optimal_time }

    /// `Δ + V`; zero when the facilitation condition holds.
    pub fn facilitation_mismatch(&self) -> f64 {
        self.coeffs.facilitation_mismatch()
    }
}
