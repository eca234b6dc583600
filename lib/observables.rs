//! Site-resolved excitation signals extracted from a state trajectory.

use std::path::Path;
use ndarray as nd;
use ndarray_npy::NpzWriter;
use num_complex::Complex64 as C64;
use crate::{
    error::{ AvalancheError, AvalancheResult },
    evolution::Trajectory,
    operators::{ check_site, dim, number_ops, DEFAULT_MEMORY_BUDGET },
    tolerances::Tolerances,
};

/// Compute `⟨ψ|A|ψ⟩`.
pub fn expectation<S, T>(
    A: &nd::ArrayBase<S, nd::Ix2>,
    psi: &nd::ArrayBase<T, nd::Ix1>,
) -> C64
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    psi.iter().zip(A.dot(psi).iter())
        .map(|(a, b)| a.conj() * b)
        .sum()
}

// take the real part of an occupation, checking that it is real and a
// probability
fn as_occupation(
    value: C64,
    site: usize,
    time_index: usize,
    tol: &Tolerances,
) -> AvalancheResult<f64>
{
    if value.im.abs() > tol.imag {
        return Err(AvalancheError::ComplexExpectation {
            site,
            time_index,
            imag: value.im,
        });
    }
    let p = value.re;
    if !(-tol.probability..=1.0 + tol.probability).contains(&p) {
        return Err(AvalancheError::UnphysicalSignal {
            site,
            time_index,
            value: p,
        });
    }
    Ok(p)
}

/// Per-site number operators `n_j`, built once and reused for every time
/// point.
#[derive(Clone, Debug)]
pub struct SignalExtractor {
    n_atoms: usize,
    ops: Vec<nd::Array2<C64>>,
    tol: Tolerances,
}

impl SignalExtractor {
    /// Create a new `SignalExtractor` for an `n_atoms`-site chain, within the
    /// default memory budget.
    pub fn new(n_atoms: usize) -> AvalancheResult<Self> {
        Self::within_budget(n_atoms, DEFAULT_MEMORY_BUDGET)
    }

    /// Create a new `SignalExtractor` whose number operators must fit in
    /// `budget` bytes.
    pub fn within_budget(n_atoms: usize, budget: u128) -> AvalancheResult<Self> {
        Ok(Self {
            n_atoms,
            ops: number_ops(n_atoms, budget)?,
            tol: Tolerances::default(),
        })
    }

    /// Use a different set of tolerances.
    pub fn with_tolerances(mut self, tol: Tolerances) -> Self {
        self.tol = tol;
        self
    }

    /// Number of sites.
    pub fn n_atoms(&self) -> usize { self.n_atoms }

    /// Occupation of `site` in the state `psi`.
    pub fn occupation<S>(&self, site: usize, psi: &nd::ArrayBase<S, nd::Ix1>)
        -> AvalancheResult<f64>
    where S: nd::Data<Elem = C64>
    {
        check_site(self.n_atoms, site)?;
        if psi.len() != dim(self.n_atoms) {
            return Err(AvalancheError::DimensionMismatch {
                expected: dim(self.n_atoms),
                got: psi.len(),
            });
        }
        as_occupation(expectation(&self.ops[site], psi), site, 0, &self.tol)
    }

    /// Compute `S_j(t)` for every site and time point of `traj`.
    pub fn extract(&self, traj: &Trajectory) -> AvalancheResult<SignalTrajectory> {
        if traj.dim() != dim(self.n_atoms) {
            return Err(AvalancheError::DimensionMismatch {
                expected: dim(self.n_atoms),
                got: traj.dim(),
            });
        }
        let psi = traj.states();
        let psi_conj = psi.mapv(|a| a.conj());
        let mut site_signal: nd::Array2<f64>
            = nd::Array2::zeros((self.n_atoms, traj.len()));
        for (j, (n_j, mut row))
            in self.ops.iter().zip(site_signal.rows_mut()).enumerate()
        {
            let vals: nd::Array1<C64>
                = (&psi_conj * &n_j.dot(psi)).sum_axis(nd::Axis(0));
            for (k, (s, v)) in row.iter_mut().zip(vals.iter()).enumerate() {
                *s = as_occupation(*v, j, k, &self.tol)?;
            }
        }
        Ok(SignalTrajectory::new(traj.time().clone(), site_signal))
    }
}

/// Site-resolved signal `S_j(t)` and its sum over sites `S(t)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalTrajectory {
    time: nd::Array1<f64>,
    site_signal: nd::Array2<f64>,
    total_signal: nd::Array1<f64>,
}

impl SignalTrajectory {
    fn new(time: nd::Array1<f64>, site_signal: nd::Array2<f64>) -> Self {
        let total_signal = site_signal.sum_axis(nd::Axis(0));
        Self { time, site_signal, total_signal }
    }

    /// Time points.
    pub fn time(&self) -> &nd::Array1<f64> { &self.time }

    /// `N × T` matrix of per-site occupations.
    pub fn site_signal(&self) -> &nd::Array2<f64> { &self.site_signal }

    /// Total signal at each time point.
    pub fn total_signal(&self) -> &nd::Array1<f64> { &self.total_signal }

    /// Number of sites.
    pub fn n_atoms(&self) -> usize { self.site_signal.nrows() }

    /// Number of time points.
    pub fn len(&self) -> usize { self.time.len() }

    /// Return `true` if there are no time points.
    pub fn is_empty(&self) -> bool { self.time.is_empty() }

    /// Index of the time point closest to `t`.
    pub fn nearest_index(&self, t: f64) -> usize {
        self.time.iter().enumerate()
            .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))
            .map(|(k, _)| k)
            .unwrap_or(0)
    }

    /// Total signal at the time point closest to `t`.
    pub fn signal_at(&self, t: f64) -> f64 {
        self.total_signal[self.nearest_index(t)]
    }

    /// Signal at the time point closest to `t` relative to the initial
    /// signal, or `None` if the initial signal is zero.
    pub fn amplification(&self, t: f64) -> Option<f64> {
        let s0 = self.total_signal[0];
        (s0 > 0.0).then(|| self.signal_at(t) / s0)
    }

    /// Time and value of the largest total signal.
    pub fn peak(&self) -> (f64, f64) {
        self.time.iter().zip(self.total_signal.iter())
            .fold(
                (self.time[0], self.total_signal[0]),
                |(tm, sm), (&t, &s)| if s > sm { (t, s) } else { (tm, sm) },
            )
    }

    /// Write `time`, `site_signal`, and `total_signal` to an `.npz` archive.
    pub fn write_npz<P>(&self, path: P) -> AvalancheResult<()>
    where P: AsRef<Path>
    {
        let mut npz = NpzWriter::new(std::fs::File::create(path)?);
        npz.add_array("time", &self.time)?;
        npz.add_array("site_signal", &self.site_signal)?;
        npz.add_array("total_signal", &self.total_signal)?;
        npz.finish()?;
        Ok(())
    }
}
