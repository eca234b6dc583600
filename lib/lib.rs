#![allow(non_snake_case)]

//! Exact simulation of facilitated excitation avalanches in a chain of
//! two-level Rydberg atoms, as a model of a single-photon detector.

pub mod error;
pub mod consts;
pub mod tolerances;
pub mod operators;
pub mod hilbert;
pub mod params;
pub mod field;
pub mod hamiltonian;
pub mod evolution;
pub mod observables;
pub mod detector;
pub mod axion;
pub mod config;

pub use error::{ AvalancheError, AvalancheResult };
pub use consts::PhysConsts;
pub use tolerances::Tolerances;
pub use hilbert::{ InitialState, Level };
pub use params::{ Coefficients, DetectorParams, Scenario };
pub use field::{ Correction, FieldCorrection, NoCorrection };
pub use hamiltonian::HBuilderAvalanche;
pub use evolution::{
    evolve,
    EvolveOptions,
    Phase,
    Run,
    StepControl,
    Strategy,
    TimeGrid,
    Trajectory,
};
pub use observables::{ SignalExtractor, SignalTrajectory };
pub use detector::{
    AvalancheSim,
    DetectionSummary,
    Outcome,
    SweepPoint,
    TimeSpan,
};
pub use axion::AxionParams;
pub use config::SimConfig;
