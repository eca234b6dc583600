//! Fourth-order Runge-Kutta integration of the Schrödinger equation for a
//! time-independent Hamiltonian.
//!
//! Each interval between requested time points is cut into substeps short
//! enough that `h Λ` stays below a fixed bound, where `Λ` is the largest
//! absolute row sum of `H` (an upper bound on its spectral radius). States are
//! never renormalized, so any loss of unitarity stays visible to the caller.

use ndarray as nd;
use num_complex::Complex64 as C64;
use serde::Deserialize;
use crate::error::{ AvalancheError, AvalancheResult };

/// Substep control for the integrator.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StepControl {
    /// Upper bound on `h Λ` for each substep.
    pub step_bound: f64,
    /// Largest number of substeps allowed over a whole run.
    pub max_substeps: u64,
}

impl Default for StepControl {
    fn default() -> Self {
        Self { step_bound: 0.01, max_substeps: 50_000_000 }
    }
}

impl StepControl {
    /// Require a finite, positive step bound and a non-zero substep budget.
    pub fn validated(self) -> AvalancheResult<Self> {
        if !self.step_bound.is_finite() || self.step_bound <= 0.0 {
            return Err(AvalancheError::InvalidSetting {
                name: "step_bound",
                value: self.step_bound,
            });
        }
        if self.max_substeps == 0 {
            return Err(AvalancheError::InvalidSetting {
                name: "max_substeps",
                value: 0.0,
            });
        }
        Ok(self)
    }
}

/// Largest absolute row sum of `H`.
pub fn row_sum_bound(H: &nd::Array2<C64>) -> f64 {
    H.rows().into_iter()
        .map(|row| row.iter().map(|h| h.norm()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Number of substeps needed to cover an interval of length `dt`.
pub fn substeps(dt: f64, lambda: f64, step: &StepControl) -> u64 {
    if dt <= 0.0 { return 0; }
    ((dt * lambda / step.step_bound).ceil() as u64).max(1)
}

/// Total number of substeps needed to go from `t = 0` through every point of
/// `time`.
pub fn total_substeps(time: &nd::Array1<f64>, lambda: f64, step: &StepControl)
    -> u128
{
    [0.0].iter().chain(time.iter())
        .zip(time.iter())
        .map(|(tk, tkp1)| substeps(tkp1 - tk, lambda, step) as u128)
        .sum()
}

/// Reject runs that would need more than `step.max_substeps` substeps.
pub fn check_step_budget(
    time: &nd::Array1<f64>,
    lambda: f64,
    step: &StepControl,
) -> AvalancheResult<()>
{
    let required = total_substeps(time, lambda, step);
    if required > step.max_substeps as u128 {
        Err(AvalancheError::StepBudget {
            required,
            budget: step.max_substeps as u128,
        })
    } else {
        Ok(())
    }
}

fn rhs(H: &nd::Array2<C64>, psi: &nd::Array1<C64>) -> nd::Array1<C64> {
    -C64::i() * H.dot(psi)
}

/// Advance `psi` by a single RK4 step of length `h`.
pub fn rk4_step(H: &nd::Array2<C64>, psi: &nd::Array1<C64>, h: f64)
    -> nd::Array1<C64>
{
    let k1 = rhs(H, psi);
    let k2 = rhs(H, &(psi + &k1 * C64::from(h / 2.0)));
    let k3 = rhs(H, &(psi + &k2 * C64::from(h / 2.0)));
    let k4 = rhs(H, &(psi + &k3 * C64::from(h)));
    psi + (k1 + k2 * C64::from(2.0) + k3 * C64::from(2.0) + k4)
        * C64::from(h / 6.0)
}

/// Advance `psi` over an interval of length `dt`, using as many substeps as
/// `step` requires for a Hamiltonian with row-sum bound `lambda`.
pub fn propagate(
    H: &nd::Array2<C64>,
    psi: &nd::Array1<C64>,
    dt: f64,
    lambda: f64,
    step: &StepControl,
) -> nd::Array1<C64>
{
    let n = substeps(dt, lambda, step);
    if n == 0 { return psi.clone(); }
    let h = dt / n as f64;
    (0..n).fold(psi.clone(), |acc, _| rk4_step(H, &acc, h))
}

/// Integrate the Schrödinger equation from `psi0` at `t = 0` through every
/// point of `time`, returning states as columns.
///
/// `time` must be non-negative and non-decreasing.
pub fn evolve(
    psi0: &nd::Array1<C64>,
    H: &nd::Array2<C64>,
    time: &nd::Array1<f64>,
    step: &StepControl,
) -> nd::Array2<C64>
{
    let lambda = row_sum_bound(H);
    let mut psi: nd::Array2<C64> = nd::Array2::zeros((psi0.len(), time.len()));
    let mut t_old: f64 = 0.0;
    let mut psi_old: nd::Array1<C64> = psi0.clone();
    for (&tk, mut psik) in time.iter().zip(psi.columns_mut()) {
        psi_old = propagate(H, &psi_old, tk - t_old, lambda, step);
        psik.assign(&psi_old);
        t_old = tk;
    }
    psi
}
