use std::f64::consts::TAU;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use rydberg_avalanche::{
    field::thermal_excitation_rate,
    hilbert::StateNorm,
    operators::{ hermitian_defect, MAX_ATOMS },
    *,
};

fn facilitated(n: usize) -> DetectorParams {
    let coeffs = Coefficients {
        drive: TAU * 0.2e6,
        detuning: -TAU * 12.5e6,
        interaction: TAU * 12.5e6,
    };
    DetectorParams::new(n, coeffs).unwrap()
}

fn at_zero() -> TimeGrid { TimeGrid::try_from(vec![0.0]).unwrap() }

fn random_grid(rng: &mut StdRng, t_max: f64, n: usize) -> TimeGrid {
    let mut t: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..t_max)).collect();
    t.sort_by(f64::total_cmp);
    TimeGrid::try_from(t).unwrap()
}

#[test]
fn local_excitation_starts_at_center() {
    let sig = AvalancheSim::new(facilitated(3)).run(&at_zero()).unwrap();
    let s0 = sig.site_signal().column(0);
    assert!(s0[0].abs() < 1e-12);
    assert!((s0[1] - 1.0).abs() < 1e-12);
    assert!(s0[2].abs() < 1e-12);
    assert!((sig.total_signal()[0] - 1.0).abs() < 1e-12);
}

#[test]
fn collective_excitation_is_spread_evenly() {
    let sig = AvalancheSim::new(facilitated(3))
        .with_initial_state(InitialState::Collective)
        .run(&at_zero())
        .unwrap();
    for s in sig.site_signal().column(0) {
        assert!((s - 1.0 / 3.0).abs() < 1e-12);
    }
    assert!((sig.total_signal()[0] - 1.0).abs() < 1e-12);
}

#[test]
fn zero_field_reproduces_uncorrected_params() {
    let base = facilitated(6);
    for temperature in [0.0, 0.3, 4.0] {
        let p = FieldCorrection::new(0.0, temperature).unwrap().correct(&base).unwrap();
        let q = NoCorrection.correct(&base).unwrap();
        for (a, b) in [
            (p.drive(), q.drive()),
            (p.detuning(), q.detuning()),
            (p.interaction(), q.interaction()),
            (p.v_ee(), q.v_ee()),
            (p.v_er(), q.v_er()),
            (p.optimal_time(), q.optimal_time()),
        ] {
            assert!((a - b).abs() <= 1e-12 * b.abs().max(1.0));
        }
    }
}

#[test]
fn hamiltonian_is_hermitian_for_random_coefficients() {
    let mut rng = StdRng::seed_from_u64(10546);
    for _ in 0..20 {
        let n = rng.gen_range(1..=5);
        let coeffs = Coefficients {
            drive: rng.gen_range(-1e7..1e7),
            detuning: rng.gen_range(-1e8..1e8),
            interaction: rng.gen_range(-1e8..1e8),
        };
        let H = HBuilderAvalanche::new(n, coeffs).unwrap().gen_static().unwrap();
        assert!(hermitian_defect(&H) < 1e-10);
    }
}

#[test]
fn strategies_agree_on_random_grids() {
    let mut rng = StdRng::seed_from_u64(271828);
    let params = facilitated(3);
    let H = HBuilderAvalanche::from_params(&params).gen_static().unwrap();
    let psi0 = InitialState::center().into_array(3).unwrap();
    for _ in 0..3 {
        let time = random_grid(&mut rng, 2.0 * params.optimal_time(), 12);
        let direct = evolve(&H, psi0.clone(), time.clone(), Strategy::Direct).unwrap();
        let eigen = evolve(&H, psi0.clone(), time.clone(), Strategy::Eigen).unwrap();
        let rk4 = evolve(&H, psi0.clone(), time, Strategy::RungeKutta).unwrap();
        for ((a, b), c) in direct.states().iter().zip(eigen.states()).zip(rk4.states()) {
            assert!((a - b).norm() < 1e-6);
            assert!((a - c).norm() < 1e-6);
        }
    }
}

#[test]
fn evolution_preserves_norm() {
    let params = facilitated(4);
    let H = HBuilderAvalanche::from_params(&params).gen_static().unwrap();
    let psi0 = InitialState::Collective.into_array(4).unwrap();
    let time = TimeGrid::for_params(&params, 3.0, 16).unwrap();
    for strategy in [Strategy::Direct, Strategy::Eigen, Strategy::RungeKutta] {
        let run = Run::new(&H, psi0.clone(), time.clone(), strategy.into()).unwrap();
        let mut count = 0;
        for psi in run {
            assert!((psi.unwrap().norm() - 1.0).abs() < 1e-8);
            count += 1;
        }
        assert_eq!(count, time.len());
    }
}

#[test]
fn repeated_runs_are_identical() {
    let sim = AvalancheSim::new(facilitated(4));
    let time = TimeGrid::for_params(sim.base_params(), 2.0, 9).unwrap();
    let a = sim.run(&time).unwrap();
    let b = sim.run(&time).unwrap();
    for (x, y) in a.site_signal().iter().zip(b.site_signal()) {
        assert!((x - y).abs() <= 1e-12);
    }
}

#[test]
fn single_atom_is_trivial() {
    let params = facilitated(1);
    let b = HBuilderAvalanche::from_params(&params);
    assert_eq!(b.gen_static().unwrap().shape(), [2, 2]);
    assert!(b.interaction_term().unwrap().iter().all(|h| *h == C64::from(0.0)));
    assert_eq!(
        InitialState::center().into_array(1).unwrap(),
        InitialState::Collective.into_array(1).unwrap(),
    );
    let time = TimeGrid::linspace(params.optimal_time(), 5).unwrap();
    let sig = AvalancheSim::new(params).run(&time).unwrap();
    assert_eq!(sig.site_signal().shape(), [1, 5]);
    assert!(sig.total_signal().iter().all(|s| (0.0..=1.0 + 1e-8).contains(s)));
}

#[test]
fn signals_are_probabilities() {
    let params = facilitated(5);
    let time = TimeGrid::for_params(&params, 4.0, 20).unwrap();
    let sig = AvalancheSim::new(params)
        .with_strategy(Strategy::Eigen)
        .run(&time)
        .unwrap();
    assert!(sig.site_signal().iter().all(|s| (-1e-8..=1.0 + 1e-8).contains(s)));
    for (k, total) in sig.total_signal().iter().enumerate() {
        let sum: f64 = sig.site_signal().column(k).sum();
        assert!((total - sum).abs() < 1e-12);
    }
}

#[test]
fn thermal_rate_approaches_zero() {
    let pc = PhysConsts::default();
    assert_eq!(thermal_excitation_rate(0.0, &pc).unwrap(), 0.0);
    let mut last = f64::INFINITY;
    for k in 0..12 {
        let t = 4.0 * 0.5_f64.powi(k);
        let r = thermal_excitation_rate(t, &pc).unwrap();
        assert!(r <= last);
        last = r;
    }
    assert!(last < 1e-10);
    assert!(thermal_excitation_rate(-0.1, &pc).is_err());
}

#[test]
fn resource_limits_are_checked_before_allocation() {
    assert!(matches!(
        DetectorParams::from_scenario(Scenario::Microwave, MAX_ATOMS + 1),
        Err(AvalancheError::TooManyAtoms { .. }),
    ));
    let sim = AvalancheSim::new(DetectorParams::from_scenario(Scenario::Microwave, 14).unwrap())
        .with_memory_budget(1 << 30);
    assert!(matches!(
        sim.run(&at_zero()),
        Err(AvalancheError::MemoryBudget { dim: 16384, .. }),
    ));
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    std::fs::write(
        &path,
        r#"
            n_atoms = 3
            strategy = "eigen"

            [field]
            b_field = 0.0
            temperature = 4.0

            [time]
            max_factor = 2.0
            points = 11
        "#,
    ).unwrap();
    let cfg = SimConfig::from_file(&path).unwrap();
    let out = cfg.build().unwrap().analyze_span(&cfg.time).unwrap();
    assert_eq!(out.signal.len(), 11);
    assert!((out.signal.total_signal()[0] - 1.0).abs() < 1e-12);
    assert!(out.summary.dark_rate > 0.0);
    assert!((out.summary.noise - out.summary.dark_rate * out.summary.optimal_time).abs() < 1e-18);
    assert!(matches!(
        SimConfig::from_file(dir.path().join("missing.toml")),
        Err(AvalancheError::Io(_)),
    ));
}

#[test]
fn field_sweep_in_input_order() {
    let sim = AvalancheSim::new(facilitated(3)).with_strategy(Strategy::Eigen);
    let span = TimeSpan { max_factor: 1.0, points: 5 };
    let fields = [0.0, 2.0, 0.25];
    let pts = sim.scan_field(&fields, 1.0, &span).unwrap();
    assert_eq!(pts.len(), 3);
    for (p, b) in pts.iter().zip(fields) {
        assert_eq!(p.b_field, b);
        assert_eq!(p.temperature, 1.0);
        assert_eq!(p.signal.len(), 5);
    }
    assert_eq!(pts[0].params.interaction(), sim.base_params().interaction());
    assert!(pts[1].params.interaction() < sim.base_params().interaction());
    assert_eq!(pts[2].summary.optimal_time, pts[2].params.optimal_time());
}

#[test]
fn signal_is_written_to_npz() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signal.npz");
    let time = TimeGrid::linspace(1e-6, 4).unwrap();
    let sig = AvalancheSim::new(facilitated(2)).run(&time).unwrap();
    sig.write_npz(&path).unwrap();
    let mut npz = ndarray_npy::NpzReader::new(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(npz.len(), 3);
    let read: nd::Array1<f64> = npz.by_index(2).unwrap();
    assert_eq!(&read, sig.total_signal());
}
