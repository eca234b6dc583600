//! Unitary time evolution of a state vector under a time-independent
//! Hamiltonian.
//!
//! A [`Run`] takes `(H, ψ(0), time grid)` through the phases
//! [`Phase::Initialized`] → [`Phase::Evolving`] → [`Phase::Complete`],
//! producing one state per requested time point, in order. Three strategies
//! are available and agree to numerical precision:
//! - [`Strategy::Direct`]: materialize `U(t) = exp(-i H t)` for every time
//!   point, independently and in parallel
//! - [`Strategy::Eigen`]: same spectral decomposition, but apply the phases in
//!   the eigenbasis without forming `U(t)`
//! - [`Strategy::RungeKutta`]: integrate `dψ/dt = -i H ψ` sequentially with
//!   RK4
//!
//! Where unspecified, the last index of a 2D array corresponds to time and
//! Hamiltonians are in units of angular frequency.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use serde::Deserialize;
use tracing::{ debug, info };
use crate::{
    error::{ AvalancheError, AvalancheResult },
    hilbert::check_norm,
    operators::{ check_budget, check_hermitian, dense_bytes, DEFAULT_MEMORY_BUDGET },
    params::DetectorParams,
    tolerances::Tolerances,
};

pub mod propagator;
pub use propagator::{ Spectral, expm_hermitian };

pub mod integrate;
pub use integrate::StepControl;

/* Time grids *****************************************************************/

/// An ordered sequence of evaluation times.
///
/// Guaranteed non-empty, finite, non-negative, and non-decreasing.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid(nd::Array1<f64>);

impl TimeGrid {
    /// Validate and wrap an array of times.
    pub fn new(time: nd::Array1<f64>) -> AvalancheResult<Self> {
        if time.is_empty() { return Err(AvalancheError::EmptyTimeGrid); }
        if let Some((index, &value))
            = time.iter().enumerate().find(|(_, t)| !t.is_finite() || **t < 0.0)
        {
            return Err(AvalancheError::InvalidTime { index, value });
        }
        if let Some((index, (&prev, &next)))
            = time.iter().tuple_windows().enumerate()
            .find(|(_, (prev, next))| next < prev)
        {
            return Err(AvalancheError::NonMonotonicTime {
                index: index + 1,
                prev,
                next,
            });
        }
        Ok(Self(time))
    }

    /// `n` evenly spaced points covering `[0, t_max]`.
    pub fn linspace(t_max: f64, n: usize) -> AvalancheResult<Self> {
        Self::new(nd::Array1::linspace(0.0, t_max, n))
    }

    /// `n` evenly spaced points covering `[0, factor · T_a]`.
    pub fn for_params(params: &DetectorParams, factor: f64, n: usize)
        -> AvalancheResult<Self>
    {
        Self::linspace(factor * params.optimal_time(), n)
    }

    /// Return a reference to the underlying array.
    pub fn as_array(&self) -> &nd::Array1<f64> { &self.0 }

    /// Unwrap into the underlying array.
    pub fn into_array(self) -> nd::Array1<f64> { self.0 }

    /// Number of time points.
    pub fn len(&self) -> usize { self.0.len() }

    /// Always `false`; grids are validated non-empty.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Time of the `k`-th point.
    pub fn get(&self, k: usize) -> Option<f64> { self.0.get(k).copied() }

    /// Last (largest) time.
    pub fn t_max(&self) -> f64 { self.0[self.0.len() - 1] }

    /// Index of the grid point closest to `t`.
    pub fn nearest_index(&self, t: f64) -> usize {
        self.0.iter().enumerate()
            .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))
            .map(|(k, _)| k)
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<f64>> for TimeGrid {
    type Error = AvalancheError;

    fn try_from(time: Vec<f64>) -> AvalancheResult<Self> {
        Self::new(nd::Array1::from(time))
    }
}

/* Options ********************************************************************/

/// Selects how states are propagated in time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Full matrix exponential per time point.
    #[default]
    Direct,
    /// Phases applied in the eigenbasis.
    Eigen,
    /// Fourth-order Runge-Kutta integration.
    #[serde(rename = "rk4")]
    RungeKutta,
}

impl Strategy {
    /// Return `true` for strategies in which time points are independent.
    pub fn is_spectral(&self) -> bool {
        matches!(self, Self::Direct | Self::Eigen)
    }

    /// Number of dense matrices the size of `H` held at once while evolving,
    /// beyond `H` itself, when `workers` threads evaluate time points
    /// concurrently.
    ///
    /// The spectral strategies hold the diagonalization input along with `V`
    /// and `V†`; [`Strategy::Direct`] adds two temporaries per worker while
    /// forming `U(t)`.
    pub fn working_matrices(&self, workers: usize) -> u128 {
        match self {
            Self::Direct => 3 + 2 * workers as u128,
            Self::Eigen => 3,
            Self::RungeKutta => 0,
        }
    }
}

/// Everything a [`Run`] needs beyond its inputs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EvolveOptions {
    pub strategy: Strategy,
    pub tolerances: Tolerances,
    pub step: StepControl,
    /// Bytes available for dense working storage.
    pub memory_budget: u128,
}

impl Default for EvolveOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            tolerances: Tolerances::default(),
            step: StepControl::default(),
            memory_budget: DEFAULT_MEMORY_BUDGET,
        }
    }
}

impl EvolveOptions {
    /// Reject invalid tolerances or step control.
    pub fn validated(self) -> AvalancheResult<Self> {
        Ok(Self {
            tolerances: self.tolerances.validated()?,
            step: self.step.validated()?,
            ..self
        })
    }

    /// Bytes of working storage for evolving a state of dimension `dim`,
    /// with as many workers as the current thread pool has.
    pub fn working_memory(&self, dim: usize) -> u128 {
        let workers = rayon::current_num_threads();
        dense_bytes(dim, self.strategy.working_matrices(workers))
    }
}

impl From<Strategy> for EvolveOptions {
    fn from(strategy: Strategy) -> Self {
        Self { strategy, ..Self::default() }
    }
}

/* Trajectories ***************************************************************/

/// Ordered sequence of states, one per time point.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    time: nd::Array1<f64>,
    states: nd::Array2<C64>,
}

impl Trajectory {
    fn from_states(time: &TimeGrid, states: &[nd::Array1<C64>], dim: usize)
        -> Self
    {
        let mut arr: nd::Array2<C64> = nd::Array2::zeros((dim, states.len()));
        arr.columns_mut().into_iter()
            .zip(states)
            .for_each(|(mut col, psi)| col.assign(psi));
        Self { time: time.as_array().clone(), states: arr }
    }

    /// Time points.
    pub fn time(&self) -> &nd::Array1<f64> { &self.time }

    /// States as columns; the last axis is time.
    pub fn states(&self) -> &nd::Array2<C64> { &self.states }

    /// State at the `k`-th time point.
    pub fn state(&self, k: usize) -> nd::ArrayView1<C64> {
        self.states.column(k)
    }

    /// Number of time points.
    pub fn len(&self) -> usize { self.time.len() }

    /// Return `true` if there are no time points.
    pub fn is_empty(&self) -> bool { self.time.is_empty() }

    /// Hilbert-space dimension.
    pub fn dim(&self) -> usize { self.states.nrows() }
}

/* Runs ***********************************************************************/

/// Lifecycle of a [`Run`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Inputs validated, nothing computed yet.
    Initialized,
    /// Some, but not all, time points computed.
    Evolving,
    /// Every time point computed, or a failure occurred.
    Complete,
}

// per-strategy working data, built on the first step
enum Engine {
    Pending,
    Direct(Spectral),
    Eigen(Spectral, nd::Array1<C64>),
    RungeKutta { lambda: f64, t: f64, psi: nd::Array1<C64> },
}

/// A single, non-restartable evolution of `psi0` under `H` over a time grid.
///
/// Iterating yields states in time order; [`Run::finish`] collects whatever
/// remains into a [`Trajectory`].
pub struct Run<'a> {
    H: &'a nd::Array2<C64>,
    psi0: nd::Array1<C64>,
    time: TimeGrid,
    opts: EvolveOptions,
    phase: Phase,
    engine: Engine,
    done: Vec<nd::Array1<C64>>,
}

impl<'a> std::fmt::Debug for Run<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {{ dim: {}, time points: {}, done: {}, phase: {:?}, opts: {:?} }}",
            self.psi0.len(),
            self.time.len(),
            self.done.len(),
            self.phase,
            self.opts,
        )
    }
}

impl<'a> Run<'a> {
    /// Validate inputs and create a new `Run` in [`Phase::Initialized`].
    ///
    /// Fails if `H` is not square and Hermitian, if its dimension differs from
    /// that of `psi0`, if `psi0` is not normalized, or if the integrator would
    /// exceed its step budget.
    pub fn new(
        H: &'a nd::Array2<C64>,
        psi0: nd::Array1<C64>,
        time: TimeGrid,
        opts: EvolveOptions,
    ) -> AvalancheResult<Self>
    {
        let opts = opts.validated()?;
        if !H.is_square() {
            return Err(AvalancheError::DimensionMismatch {
                expected: H.nrows(),
                got: H.ncols(),
            });
        }
        if H.nrows() != psi0.len() {
            return Err(AvalancheError::DimensionMismatch {
                expected: H.nrows(),
                got: psi0.len(),
            });
        }
        check_hermitian(H, opts.tolerances.hermitian)?;
        check_norm(&psi0, 0.0, opts.tolerances.norm)?;
        check_budget(H.nrows(), opts.working_memory(H.nrows()), opts.memory_budget)?;
        if opts.strategy == Strategy::RungeKutta {
            let lambda = integrate::row_sum_bound(H);
            integrate::check_step_budget(time.as_array(), lambda, &opts.step)?;
        }
        Ok(Self {
            H,
            psi0,
            time,
            opts,
            phase: Phase::Initialized,
            engine: Engine::Pending,
            done: Vec::new(),
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase { self.phase }

    /// The time grid.
    pub fn time(&self) -> &TimeGrid { &self.time }

    /// Number of time points already computed.
    pub fn completed(&self) -> usize { self.done.len() }

    fn start(&mut self) -> AvalancheResult<()> {
        info!(
            dim = self.psi0.len(),
            time_points = self.time.len(),
            strategy = ?self.opts.strategy,
            "starting evolution"
        );
        self.engine
            = match self.opts.strategy {
                Strategy::Direct => Engine::Direct(Spectral::new(self.H)?),
                Strategy::Eigen => {
                    let sp = Spectral::new(self.H)?;
                    let c = sp.project(&self.psi0)?;
                    Engine::Eigen(sp, c)
                },
                Strategy::RungeKutta => Engine::RungeKutta {
                    lambda: integrate::row_sum_bound(self.H),
                    t: 0.0,
                    psi: self.psi0.clone(),
                },
            };
        self.phase = Phase::Evolving;
        Ok(())
    }

    // state at time point `k`, which must be the next one for RK4
    fn compute(&mut self, k: usize) -> AvalancheResult<nd::Array1<C64>> {
        let tk = self.time.as_array()[k];
        let psi: nd::Array1<C64>
            = match &mut self.engine {
                Engine::Pending => unreachable!("evolution engine not started"),
                Engine::Direct(sp) => sp.unitary(tk).dot(&self.psi0),
                Engine::Eigen(sp, c) => sp.reconstruct(tk, c),
                Engine::RungeKutta { lambda, t, psi } => {
                    *psi = integrate::propagate(
                        self.H, psi, tk - *t, *lambda, &self.opts.step);
                    *t = tk;
                    psi.clone()
                },
            };
        check_norm(&psi, tk, self.opts.tolerances.norm)?;
        Ok(psi)
    }

    fn fail(&mut self, err: AvalancheError) -> AvalancheError {
        self.phase = Phase::Complete;
        err
    }

    /// Compute every remaining time point and return the whole trajectory.
    ///
    /// For spectral strategies, remaining points are computed in parallel.
    pub fn finish(mut self) -> AvalancheResult<Trajectory> {
        if self.phase == Phase::Initialized {
            self.start().map_err(|e| self.fail(e))?;
        }
        if self.phase == Phase::Evolving && self.opts.strategy.is_spectral() {
            let first = self.done.len();
            let rest: Vec<nd::Array1<C64>> = {
                let this = &self;
                (first..this.time.len()).into_par_iter()
                    .map(|k| this.compute_spectral(k))
                    .collect::<AvalancheResult<Vec<_>>>()?
            };
            self.done.extend(rest);
            self.phase = Phase::Complete;
        } else {
            for res in self.by_ref() { res?; }
        }
        debug!(time_points = self.done.len(), "evolution complete");
        Ok(Trajectory::from_states(&self.time, &self.done, self.psi0.len()))
    }

    // shared-reference variant of `compute` for independent time points
    fn compute_spectral(&self, k: usize) -> AvalancheResult<nd::Array1<C64>> {
        let tk = self.time.as_array()[k];
        let psi: nd::Array1<C64>
            = match &self.engine {
                Engine::Direct(sp) => sp.unitary(tk).dot(&self.psi0),
                Engine::Eigen(sp, c) => sp.reconstruct(tk, c),
                _ => unreachable!("compute_spectral called on a sequential engine"),
            };
        check_norm(&psi, tk, self.opts.tolerances.norm)?;
        Ok(psi)
    }
}

impl<'a> Iterator for Run<'a> {
    type Item = AvalancheResult<nd::Array1<C64>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Complete { return None; }
        if self.phase == Phase::Initialized {
            if let Err(e) = self.start() { return Some(Err(self.fail(e))); }
        }
        let k = self.done.len();
        match self.compute(k) {
            Ok(psi) => {
                self.done.push(psi.clone());
                if self.done.len() == self.time.len() {
                    self.phase = Phase::Complete;
                }
                Some(Ok(psi))
            },
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}

/// Evolve `psi0` under `H` over `time` with the given options.
pub fn evolve<O>(
    H: &nd::Array2<C64>,
    psi0: nd::Array1<C64>,
    time: TimeGrid,
    opts: O,
) -> AvalancheResult<Trajectory>
where O: Into<EvolveOptions>
{
    Run::new(H, psi0, time, opts.into())?.finish()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;
    use super::*;
    use crate::{
        hamiltonian::HBuilderAvalanche,
        hilbert::InitialState,
        operators::sigma_x,
        params::Coefficients,
    };

    fn chain(n: usize) -> (nd::Array2<C64>, f64) {
        let coeffs = Coefficients::facilitated(TAU * 0.2e6, TAU * 12.5e6);
        let H = HBuilderAvalanche::new(n, coeffs).unwrap().gen_static().unwrap();
        (H, n as f64 / coeffs.drive)
    }

    #[test]
    fn grid_validation() {
        assert!(matches!(
            TimeGrid::new(nd::Array1::zeros(0)),
            Err(AvalancheError::EmptyTimeGrid),
        ));
        assert!(matches!(
            TimeGrid::try_from(vec![0.0, 2.0, 1.0]),
            Err(AvalancheError::NonMonotonicTime { index: 2, .. }),
        ));
        assert!(matches!(
            TimeGrid::try_from(vec![-1.0, 0.0]),
            Err(AvalancheError::InvalidTime { index: 0, .. }),
        ));
        assert!(matches!(
            TimeGrid::try_from(vec![0.0, f64::NAN]),
            Err(AvalancheError::InvalidTime { index: 1, .. }),
        ));
        let grid = TimeGrid::try_from(vec![0.0, 1.0, 1.0, 3.0]).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.nearest_index(2.2), 3);
        assert_eq!(grid.nearest_index(-5.0), 0);
        assert_eq!(grid.t_max(), 3.0);
    }

    #[test]
    fn strategies_agree() {
        let n = 3;
        let (H, t_a) = chain(n);
        let psi0 = InitialState::center().into_array(n).unwrap();
        let time = TimeGrid::linspace(t_a, 21).unwrap();
        let direct
            = evolve(&H, psi0.clone(), time.clone(), Strategy::Direct).unwrap();
        let eigen
            = evolve(&H, psi0.clone(), time.clone(), Strategy::Eigen).unwrap();
        let rk4
            = evolve(&H, psi0, time, Strategy::RungeKutta).unwrap();
        for (a, b) in direct.states().iter().zip(eigen.states()) {
            assert!((a - b).norm() < 1e-9);
        }
        for (a, b) in direct.states().iter().zip(rk4.states()) {
            assert!((a - b).norm() < 1e-6);
        }
    }

    #[test]
    fn evolution_is_unitary_and_deterministic() {
        let n = 4;
        let (H, t_a) = chain(n);
        let psi0 = InitialState::Collective.into_array(n).unwrap();
        let time = TimeGrid::linspace(2.0 * t_a, 15).unwrap();
        let a = evolve(&H, psi0.clone(), time.clone(), Strategy::Direct).unwrap();
        let b = evolve(&H, psi0, time, Strategy::Direct).unwrap();
        for k in 0..a.len() {
            let norm: f64 = a.state(k).iter().map(|x| x.norm_sqr()).sum();
            assert!((norm.sqrt() - 1.0).abs() < 1e-8);
        }
        for (x, y) in a.states().iter().zip(b.states()) {
            assert!((x - y).norm() <= 1e-12);
        }
    }

    #[test]
    fn run_phases() {
        let n = 2;
        let (H, t_a) = chain(n);
        let psi0 = InitialState::local(0).into_array(n).unwrap();
        let time = TimeGrid::linspace(t_a, 5).unwrap();
        let mut run = Run::new(&H, psi0.clone(), time, Strategy::RungeKutta.into())
            .unwrap();
        assert_eq!(run.phase(), Phase::Initialized);
        let first = run.next().unwrap().unwrap();
        assert_eq!(first, psi0);
        assert_eq!(run.phase(), Phase::Evolving);
        run.next().unwrap().unwrap();
        assert_eq!(run.completed(), 2);
        let traj = run.finish().unwrap();
        assert_eq!(traj.len(), 5);
        assert_eq!(traj.state(0), psi0.view());
    }

    #[test]
    fn partial_spectral_run_finishes_in_order() {
        let n = 3;
        let (H, t_a) = chain(n);
        let psi0 = InitialState::center().into_array(n).unwrap();
        let time = TimeGrid::linspace(t_a, 8).unwrap();
        let full = evolve(&H, psi0.clone(), time.clone(), Strategy::Eigen).unwrap();
        let mut run = Run::new(&H, psi0, time, Strategy::Eigen.into()).unwrap();
        run.next().unwrap().unwrap();
        run.next().unwrap().unwrap();
        let traj = run.finish().unwrap();
        for (a, b) in traj.states().iter().zip(full.states()) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn completed_run_yields_nothing() {
        let (H, t_a) = chain(1);
        let psi0 = InitialState::center().into_array(1).unwrap();
        let time = TimeGrid::linspace(t_a, 2).unwrap();
        let mut run = Run::new(&H, psi0, time, Strategy::Direct.into()).unwrap();
        assert!(run.next().is_some());
        assert!(run.next().is_some());
        assert_eq!(run.phase(), Phase::Complete);
        assert!(run.next().is_none());
    }

    #[test]
    fn norm_drift_ends_the_run() {
        // h Λ = 2 is far outside RK4's stability region
        let H = sigma_x();
        let psi0 = nd::array![C64::from(1.0), C64::from(0.0)];
        let time = TimeGrid::try_from(vec![0.0, 10.0, 20.0]).unwrap();
        let opts = EvolveOptions {
            strategy: Strategy::RungeKutta,
            step: StepControl { step_bound: 2.0, ..StepControl::default() },
            ..EvolveOptions::default()
        };
        let mut run = Run::new(&H, psi0.clone(), time.clone(), opts).unwrap();
        assert_eq!(run.next().unwrap().unwrap(), psi0);
        match run.next().unwrap().unwrap_err() {
            AvalancheError::NormDrift { time, norm, .. } => {
                assert_eq!(time, 10.0);
                assert!(norm < 0.5);
            },
            err => panic!("unexpected error: {err}"),
        }
        assert_eq!(run.phase(), Phase::Complete);
        assert_eq!(run.completed(), 1);
        assert!(run.next().is_none());
        assert!(matches!(
            evolve(&H, psi0, time, opts),
            Err(AvalancheError::NormDrift { time, .. }) if time > 0.0,
        ));
    }

    #[test]
    fn working_memory_depends_on_strategy() {
        assert_eq!(Strategy::Direct.working_matrices(4), 11);
        assert_eq!(Strategy::Eigen.working_matrices(4), 3);
        assert_eq!(Strategy::RungeKutta.working_matrices(4), 0);
        let (H, t_a) = chain(3);
        let psi0 = InitialState::center().into_array(3).unwrap();
        let time = TimeGrid::linspace(t_a, 3).unwrap();
        let opts = |strategy| EvolveOptions {
            strategy,
            memory_budget: dense_bytes(8, 3),
            ..EvolveOptions::default()
        };
        assert!(Run::new(&H, psi0.clone(), time.clone(), opts(Strategy::Eigen)).is_ok());
        assert!(matches!(
            Run::new(&H, psi0, time, opts(Strategy::Direct)),
            Err(AvalancheError::MemoryBudget { dim: 8, .. }),
        ));
    }

    #[test]
    fn rejects_bad_inputs() {
        let (H, t_a) = chain(2);
        let time = TimeGrid::linspace(t_a, 3).unwrap();
        let wrong_dim = InitialState::center().into_array(3).unwrap();
        assert!(matches!(
            Run::new(&H, wrong_dim, time.clone(), EvolveOptions::default()),
            Err(AvalancheError::DimensionMismatch { expected: 4, got: 8 }),
        ));
        let mut bad = H.clone();
        bad[[0, 1]] += C64::new(0.0, 1.0);
        let psi0 = InitialState::center().into_array(2).unwrap();
        assert!(matches!(
            Run::new(&bad, psi0.clone(), time.clone(), EvolveOptions::default()),
            Err(AvalancheError::NotHermitian { .. }),
        ));
        let unnormalized = &psi0 * C64::from(2.0);
        assert!(matches!(
            Run::new(&H, unnormalized, time.clone(), EvolveOptions::default()),
            Err(AvalancheError::NormDrift { .. }),
        ));
        let opts = EvolveOptions {
            strategy: Strategy::RungeKutta,
            step: StepControl { step_bound: 0.01, max_substeps: 10 },
            ..EvolveOptions::default()
        };
        assert!(matches!(
            Run::new(&H, psi0.clone(), time.clone(), opts),
            Err(AvalancheError::StepBudget { .. }),
        ));
        let opts = EvolveOptions {
            step: StepControl { step_bound: f64::NAN, ..StepControl::default() },
            ..EvolveOptions::default()
        };
        assert!(matches!(
            Run::new(&H, psi0, time, opts),
            Err(AvalancheError::InvalidSetting { name: "step_bound", .. }),
        ));
    }
}
