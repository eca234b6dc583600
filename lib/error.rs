//! Error types shared across the crate.

use thiserror::Error;

/// Everything that can go wrong between a parameter set and a signal
/// trajectory.
///
/// Variants fall into three groups: precondition violations (rejected before
/// any computation), numerical-consistency failures (the math came out wrong
/// beyond floating-point noise), and resource exhaustion (a dense
/// computation that would not fit).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AvalancheError {
    /* preconditions **********************************************************/

    /// A chain must hold at least one atom.
    #[error("atom count must be at least 1")]
    NoAtoms,

    /// A site index lies outside `[0, n_atoms)`.
    #[error("site index {site} is out of range for a {n_atoms}-atom chain")]
    SiteOutOfRange { site: usize, n_atoms: usize },

    /// A two-site operator was asked to act twice on the same site.
    #[error("site {0} given twice for a two-site operator")]
    DuplicateSite(usize),

    /// The time grid has no points.
    #[error("time grid is empty")]
    EmptyTimeGrid,

    /// A time value is negative, NaN, or infinite.
    #[error("time grid value {value} at index {index} is not a finite non-negative number")]
    InvalidTime { index: usize, value: f64 },

    /// The time grid steps backward.
    #[error("time grid decreases at index {index}: {prev} -> {next}")]
    NonMonotonicTime { index: usize, prev: f64, next: f64 },

    /// Temperatures must be non-negative and finite.
    #[error("temperature must be a finite non-negative number, got {0} K")]
    InvalidTemperature(f64),

    /// A physical coefficient is NaN or infinite.
    #[error("coefficient `{name}` is not finite: {value}")]
    InvalidCoefficient { name: &'static str, value: f64 },

    /// A numerical setting is negative, NaN, or out of range.
    #[error("numerical setting `{name}` is invalid: {value}")]
    InvalidSetting { name: &'static str, value: f64 },

    /// A state vector has zero norm and cannot be normalized.
    #[error("state vector has zero norm")]
    ZeroNorm,

    /// An operator and a state (or two operators) disagree on dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /* numerical consistency **************************************************/

    /// An operator that must be Hermitian is not, beyond tolerance.
    #[error("operator is not Hermitian: max |H - H†| = {defect:e} (tolerance {tol:e})")]
    NotHermitian { defect: f64, tol: f64 },

    /// An evolved state lost unitarity.
    #[error("state norm drifted to {norm} at t = {time} (tolerance {tol:e})")]
    NormDrift { time: f64, norm: f64, tol: f64 },

    /// An expectation value of a Hermitian operator came out complex.
    #[error("expectation value for site {site} at time index {time_index} has imaginary part {imag:e}")]
    ComplexExpectation { site: usize, time_index: usize, imag: f64 },

    /// An occupation probability fell outside `[0, 1]`.
    #[error("occupation {value} for site {site} at time index {time_index} is outside [0, 1]")]
    UnphysicalSignal { site: usize, time_index: usize, value: f64 },

    /* resources **************************************************************/

    /// The chain is longer than dense construction can ever support.
    #[error("{n_atoms} atoms exceeds the maximum of {max} for dense simulation")]
    TooManyAtoms { n_atoms: usize, max: usize },

    /// Dense matrices of dimension `dim` would not fit in the memory budget.
    #[error("dense computation at dimension {dim} needs ~{required} bytes, over the budget of {budget} bytes")]
    MemoryBudget { dim: usize, required: u128, budget: u128 },

    /// The Runge-Kutta integrator would need more substeps than allowed.
    #[error("integration needs {required} substeps, over the budget of {budget}")]
    StepBudget { required: u128, budget: u128 },

    /* foreign ****************************************************************/

    /// Diagonalization failure from the LAPACK backend.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),

    /// Malformed configuration file.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("npz write error: {0}")]
    Npz(#[from] ndarray_npy::WriteNpzError),
}

/// Result alias used throughout the crate.
pub type AvalancheResult<T> = Result<T, AvalancheError>;

/// Reject non-finite coefficients by name.
pub(crate) fn check_finite(name: &'static str, value: f64)
    -> AvalancheResult<f64>
{
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AvalancheError::InvalidCoefficient { name, value })
    }
}
