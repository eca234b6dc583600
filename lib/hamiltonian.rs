//! Hamiltonian builder for a facilitated-excitation chain.

use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::{ debug, warn };
use crate::{
    error::AvalancheResult,
    operators::{
        check_atoms,
        check_budget,
        check_hermitian,
        dense_bytes,
        dim,
        number,
        pair_op,
        sigma_x,
        site_op,
        DEFAULT_MEMORY_BUDGET,
    },
    params::{ Coefficients, DetectorParams },
};

// dense matrices alive at once while summing a term into `H`: `H`, the
// partial sum, and one embedded site operator
const BUILD_MATRICES: u128 = 3;

/// Builder for the `N`-atom amplification Hamiltonian
/// ```math
/// \begin{align*}
///     H
///         &= \Omega \sum_j (\sigma_j^+ + \sigma_j^-)
///         \\
///         &+ \Delta \sum_j n_j
///         \\
///         &+ V \sum_{j < N - 1} n_j n_{j + 1}
/// \end{align*}
/// ```
/// on an open chain, where the first line is the drive, the second the
/// detuning, and the third nearest-neighbor Rydberg interactions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HBuilderAvalanche {
    pub(crate) n_atoms: usize,
    pub(crate) coeffs: Coefficients,
    pub(crate) herm_tol: f64,
    pub(crate) memory_budget: u128,
}

impl HBuilderAvalanche {
    /// Create a new `HBuilderAvalanche`.
    pub fn new(n_atoms: usize, coeffs: Coefficients) -> AvalancheResult<Self> {
        check_atoms(n_atoms)?;
        let coeffs = coeffs.validated()?;
        Ok(Self {
            n_atoms,
            coeffs,
            herm_tol: 1e-10,
            memory_budget: DEFAULT_MEMORY_BUDGET,
        })
    }

    /// Create a new `HBuilderAvalanche` from a full parameter set.
    pub fn from_params(params: &DetectorParams) -> Self {
        Self {
            n_atoms: params.n_atoms(),
            coeffs: params.coefficients(),
            herm_tol: 1e-10,
            memory_budget: DEFAULT_MEMORY_BUDGET,
        }
    }

    /// Set the relative tolerance of the Hermiticity check.
    pub fn with_hermitian_tol(mut self, tol: f64) -> Self {
        self.herm_tol = tol;
        self
    }

    /// Set the memory budget for construction, in bytes.
    pub fn with_memory_budget(mut self, bytes: u128) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Bytes held at once while building the Hamiltonian.
    pub fn memory_estimate(&self) -> u128 {
        dense_bytes(dim(self.n_atoms), BUILD_MATRICES)
    }

    /// Number of atoms.
    pub fn n_atoms(&self) -> usize { self.n_atoms }

    /// Coefficients of the three terms.
    pub fn coefficients(&self) -> Coefficients { self.coeffs }

    /// Unscaled drive term `Σ_j (σ⁺_j + σ⁻_j)`.
    pub fn drive_term(&self) -> AvalancheResult<nd::Array2<C64>> {
        let sx = sigma_x();
        self.sum_terms((0..self.n_atoms).map(|j| site_op(self.n_atoms, j, &sx)))
    }

    /// Unscaled detuning term `Σ_j n_j`.
    pub fn detuning_term(&self) -> AvalancheResult<nd::Array2<C64>> {
        let nr = number();
        self.sum_terms((0..self.n_atoms).map(|j| site_op(self.n_atoms, j, &nr)))
    }

    /// Unscaled interaction term `Σ_j n_j n_{j+1}`; zero for a single atom.
    pub fn interaction_term(&self) -> AvalancheResult<nd::Array2<C64>> {
        let nr = number();
        self.sum_terms(
            (0..self.n_atoms.saturating_sub(1))
            .map(|j| pair_op(self.n_atoms, j, &nr, j + 1, &nr))
        )
    }

    fn sum_terms<I>(&self, terms: I) -> AvalancheResult<nd::Array2<C64>>
    where I: Iterator<Item = AvalancheResult<nd::Array2<C64>>>
    {
        let d = dim(self.n_atoms);
        check_budget(d, dense_bytes(d, 2), self.memory_budget)?;
        terms.fold(
            Ok(nd::Array2::zeros((d, d))),
            |acc, term| { let mut acc = acc?; acc += &term?; Ok(acc) },
        )
    }

    /// Compute the time-independent Hamiltonian.
    ///
    /// Fails before allocating if construction would exceed the memory budget,
    /// and afterward if the result is not Hermitian to within tolerance, which
    /// can only happen through a construction defect.
    pub fn gen_static(&self) -> AvalancheResult<nd::Array2<C64>> {
        check_budget(dim(self.n_atoms), self.memory_estimate(), self.memory_budget)?;
        let Coefficients { drive, detuning, interaction } = self.coeffs;
        debug!(
            n_atoms = self.n_atoms,
            dim = dim(self.n_atoms),
            drive,
            detuning,
            interaction,
            "building Hamiltonian"
        );
        if self.coeffs.facilitation_mismatch().abs() > drive.abs() {
            warn!(
                mismatch = self.coeffs.facilitation_mismatch(),
                drive,
                "facilitation condition violated; avalanche growth suppressed"
            );
        }
        let mut H: nd::Array2<C64> = self.drive_term()? * C64::from(drive);
        H.scaled_add(C64::from(detuning), &self.detuning_term()?);
        H.scaled_add(C64::from(interaction), &self.interaction_term()?);
        check_hermitian(&H, self.herm_tol)?;
        Ok(H)
    }
}
