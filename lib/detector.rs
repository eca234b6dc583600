//! End-to-end detector simulation: parameter correction, Hamiltonian
//! construction, evolution, and signal analysis, plus sweeps over operating
//! conditions.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::iter::{ IntoParallelRefIterator, ParallelIterator };
use serde::Deserialize;
use tracing::info;
use crate::{
    error::AvalancheResult,
    evolution::{ EvolveOptions, Run, Strategy, TimeGrid },
    field::{ Correction, FieldCorrection, NoCorrection },
    hamiltonian::HBuilderAvalanche,
    hilbert::InitialState,
    observables::{ SignalExtractor, SignalTrajectory },
    operators::{ check_atoms, check_budget, dim, memory_estimate },
    params::DetectorParams,
};

/// Smallest total signal at `T_a` counted as a detection.
pub const DETECTION_THRESHOLD: f64 = 3.0;

/// Lower bound on the noise in the signal-to-noise ratio.
pub const NOISE_FLOOR: f64 = 1e-6;

/// Extent and resolution of a time grid, relative to the optimal time.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimeSpan {
    /// Grid covers `[0, max_factor · T_a]`.
    pub max_factor: f64,
    /// Number of grid points.
    pub points: usize,
}

impl Default for TimeSpan {
    fn default() -> Self { Self { max_factor: 10.0, points: 100 } }
}

impl TimeSpan {
    /// Build the grid for a parameter set.
    pub fn grid(&self, params: &DetectorParams) -> AvalancheResult<TimeGrid> {
        TimeGrid::for_params(params, self.max_factor, self.points)
    }
}

/// Figures of merit for a single run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DetectionSummary {
    /// Optimal time `T_a` of the corrected parameters.
    pub optimal_time: f64,
    /// Total signal at the grid point nearest `T_a`.
    pub signal: f64,
    /// Signal at `T_a` relative to the initial signal; `None` when the
    /// initial signal is zero.
    pub amplification: Option<f64>,
    /// Whether `signal` exceeds [`DETECTION_THRESHOLD`].
    pub detected: bool,
    /// Thermal dark rate [1/s].
    pub dark_rate: f64,
    /// Expected dark counts over `T_a`.
    pub noise: f64,
    /// `signal / max(noise, NOISE_FLOOR)`.
    pub snr: f64,
    /// `Δ + V` of the corrected parameters.
    pub facilitation_mismatch: f64,
}

impl DetectionSummary {
    /// Summarize `signal` for the given (corrected) parameters and dark rate.
    pub fn new(params: &DetectorParams, signal: &SignalTrajectory, dark_rate: f64)
        -> Self
    {
        let optimal_time = params.optimal_time();
        let s = signal.signal_at(optimal_time);
        let noise = dark_rate * optimal_time;
        Self {
            optimal_time,
            signal: s,
            amplification: signal.amplification(optimal_time),
            detected: s > DETECTION_THRESHOLD,
            dark_rate,
            noise,
            snr: s / noise.max(NOISE_FLOOR),
            facilitation_mismatch: params.facilitation_mismatch(),
        }
    }
}

/// Everything produced by a single run.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// Parameters after correction.
    pub params: DetectorParams,
    pub signal: SignalTrajectory,
    pub summary: DetectionSummary,
}

/// One point of a field or temperature sweep.
#[derive(Clone, Debug)]
pub struct SweepPoint {
    /// Field [T].
    pub b_field: f64,
    /// Temperature [K].
    pub temperature: f64,
    /// Parameters after correction.
    pub params: DetectorParams,
    pub signal: SignalTrajectory,
    pub summary: DetectionSummary,
}

/// A configured avalanche detector.
///
/// Each run is a pure function of the base parameters, the correction, the
/// initial state, the evolution options, and the time grid.
pub struct AvalancheSim {
    base: DetectorParams,
    correction: Box<dyn Correction>,
    initial: InitialState,
    opts: EvolveOptions,
}

impl std::fmt::Debug for AvalancheSim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvalancheSim")
            .field("base", &self.base)
            .field("initial", &self.initial)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl AvalancheSim {
    /// Create a new `AvalancheSim` with no correction, a single excitation at
    /// the center of the chain, and default evolution options.
    pub fn new(base: DetectorParams) -> Self {
        Self {
            base,
            correction: Box::new(NoCorrection),
            initial: InitialState::default(),
            opts: EvolveOptions::default(),
        }
    }

    /// Set the coefficient correction.
    pub fn with_correction<C>(mut self, correction: C) -> Self
    where C: Correction + 'static
    {
        self.correction = Box::new(correction);
        self
    }

    /// Set the initial state.
    pub fn with_initial_state(mut self, initial: InitialState) -> Self {
        self.initial = initial;
        self
    }

    /// Set the evolution strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.opts.strategy = strategy;
        self
    }

    /// Set all evolution options, including the memory budget.
    pub fn with_options(mut self, opts: EvolveOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Set the memory budget for dense operators and working storage, in
    /// bytes.
    pub fn with_memory_budget(mut self, bytes: u128) -> Self {
        self.opts.memory_budget = bytes;
        self
    }

    /// Parameters before correction.
    pub fn base_params(&self) -> &DetectorParams { &self.base }

    /// Initial state.
    pub fn initial_state(&self) -> &InitialState { &self.initial }

    /// Evolution options.
    pub fn options(&self) -> &EvolveOptions { &self.opts }

    /// Parameters after correction.
    pub fn params(&self) -> AvalancheResult<DetectorParams> {
        self.correction.correct(&self.base)
    }

    /// Dark rate under the configured correction [1/s].
    pub fn dark_rate(&self) -> f64 { self.correction.dark_rate() }

    /// Estimated peak memory of a run in bytes: the Hamiltonian and number
    /// operators plus the working storage of the configured strategy.
    pub fn memory_estimate(&self) -> u128 {
        let n = self.base.n_atoms();
        memory_estimate(n).saturating_add(self.opts.working_memory(dim(n)))
    }

    /// Build the corrected Hamiltonian.
    pub fn hamiltonian(&self) -> AvalancheResult<nd::Array2<C64>> {
        self.build(&self.params()?)
    }

    fn build(&self, params: &DetectorParams) -> AvalancheResult<nd::Array2<C64>> {
        HBuilderAvalanche::from_params(params)
            .with_hermitian_tol(self.opts.tolerances.hermitian)
            .with_memory_budget(self.opts.memory_budget)
            .gen_static()
    }

    fn simulate(
        &self,
        correction: &dyn Correction,
        time: Option<&TimeGrid>,
        span: &TimeSpan,
    ) -> AvalancheResult<Outcome>
    {
        let n = self.base.n_atoms();
        check_atoms(n)?;
        check_budget(dim(n), self.memory_estimate(), self.opts.memory_budget)?;
        let params = correction.correct(&self.base)?;
        let time
            = match time {
                Some(grid) => grid.clone(),
                None => span.grid(&params)?,
            };
        let psi0 = self.initial.into_array(n)?;
        let H = self.build(&params)?;
        let traj = Run::new(&H, psi0, time, self.opts)?.finish()?;
        let signal
            = SignalExtractor::within_budget(n, self.opts.memory_budget)?
            .with_tolerances(self.opts.tolerances)
            .extract(&traj)?;
        let summary = DetectionSummary::new(&params, &signal, correction.dark_rate());
        info!(
            n_atoms = n,
            signal = summary.signal,
            detected = summary.detected,
            snr = summary.snr,
            "run complete"
        );
        Ok(Outcome { params, signal, summary })
    }

    /// Run over an explicit time grid.
    pub fn run(&self, time: &TimeGrid) -> AvalancheResult<SignalTrajectory> {
        Ok(self.analyze(time)?.signal)
    }

    /// Run over an explicit time grid and summarize the result.
    pub fn analyze(&self, time: &TimeGrid) -> AvalancheResult<Outcome> {
        self.simulate(self.correction.as_ref(), Some(time), &TimeSpan::default())
    }

    /// Run over a grid spanning a multiple of the corrected optimal time.
    pub fn analyze_span(&self, span: &TimeSpan) -> AvalancheResult<Outcome> {
        self.simulate(self.correction.as_ref(), None, span)
    }

    fn sweep_point(&self, b_field: f64, temperature: f64, span: &TimeSpan)
        -> AvalancheResult<SweepPoint>
    {
        let correction = FieldCorrection::new(b_field, temperature)?;
        let Outcome { params, signal, summary }
            = self.simulate(&correction, None, span)?;
        Ok(SweepPoint { b_field, temperature, params, signal, summary })
    }

    /// Run independently at each field in `b_fields` [T], at fixed
    /// `temperature` [K], replacing the configured correction. Results are in
    /// input order.
    pub fn scan_field(&self, b_fields: &[f64], temperature: f64, span: &TimeSpan)
        -> AvalancheResult<Vec<SweepPoint>>
    {
        info!(points = b_fields.len(), temperature, "scanning field");
        b_fields.par_iter()
            .map(|&b| self.sweep_point(b, temperature, span))
            .collect()
    }

    /// Run independently at each temperature in `temperatures` [K], at fixed
    /// `b_field` [T], replacing the configured correction. Results are in
    /// input order.
    pub fn scan_temperature(
        &self,
        temperatures: &[f64],
        b_field: f64,
        span: &TimeSpan,
    ) -> AvalancheResult<Vec<SweepPoint>>
    {
        info!(points = temperatures.len(), b_field, "scanning temperature");
        temperatures.par_iter()
            .map(|&t| self.sweep_point(b_field, t, span))
            .collect()
    }
}
