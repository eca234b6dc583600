//! Exact propagation via the spectral matrix exponential.
//!
//! For Hermitian `H = V E V†`, `exp(-i H t) = V exp(-i E t) V†`; the
//! decomposition is computed once and reused for every time point.

use ndarray as nd;
use ndarray_linalg::{ Eigh, UPLO };
use num_complex::Complex64 as C64;
use crate::error::{ AvalancheError, AvalancheResult };

/// Eigendecomposition of a Hermitian Hamiltonian.
#[derive(Clone, Debug)]
pub struct Spectral {
    E: nd::Array1<f64>,
    V: nd::Array2<C64>,
    V_dag: nd::Array2<C64>,
}

impl Spectral {
    /// Diagonalize `H`, which is assumed to be Hermitian; only its lower
    /// triangle is read.
    pub fn new(H: &nd::Array2<C64>) -> AvalancheResult<Self> {
        let (E, V): (nd::Array1<f64>, nd::Array2<C64>) = H.eigh(UPLO::Lower)?;
        let V_dag = V.t().mapv(|a| a.conj());
        Ok(Self { E, V, V_dag })
    }

    /// Eigenvalues in ascending order.
    pub fn energies(&self) -> &nd::Array1<f64> { &self.E }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize { self.E.len() }

    fn phases(&self, t: f64) -> nd::Array1<C64> {
        self.E.mapv(|e| (-C64::i() * e * t).exp())
    }

    /// The full propagator `U(t) = exp(-i H t)`.
    pub fn unitary(&self, t: f64) -> nd::Array2<C64> {
        (&self.V * &self.phases(t)).dot(&self.V_dag)
    }

    /// Coordinates of `psi` in the eigenbasis.
    pub fn project(&self, psi: &nd::Array1<C64>)
        -> AvalancheResult<nd::Array1<C64>>
    {
        if psi.len() != self.dim() {
            return Err(AvalancheError::DimensionMismatch {
                expected: self.dim(),
                got: psi.len(),
            });
        }
        Ok(self.V_dag.dot(psi))
    }

    /// State at time `t` from its eigenbasis coordinates at `t = 0`.
    pub fn reconstruct(&self, t: f64, c: &nd::Array1<C64>) -> nd::Array1<C64> {
        self.V.dot(&(c * &self.phases(t)))
    }
}

/// Compute `exp(-i H t)` for Hermitian `H`.
pub fn expm_hermitian(H: &nd::Array2<C64>, t: f64)
    -> AvalancheResult<nd::Array2<C64>>
{
    Ok(Spectral::new(H)?.unitary(t))
}
