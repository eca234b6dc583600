//! Basis states of a two-level atom chain and preparation of initial state
//! vectors.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::One;
use crate::{
    error::{ AvalancheError, AvalancheResult },
    operators::{ check_atoms, check_site, dim },
};

/// Tolerance on the norm of a freshly prepared state.
pub const PREP_NORM_TOL: f64 = 1e-10;

/* States *********************************************************************/

/// Internal state of a single atom.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    /// Ground state `|g⟩ = |0⟩`
    G,
    /// Rydberg state `|r⟩ = |1⟩`
    R,
}

impl Level {
    /// Index of the level in the single-site basis.
    pub fn index(&self) -> usize {
        match *self {
            Self::G => 0,
            Self::R => 1,
        }
    }

    /// Single-site state vector.
    pub fn ket(&self) -> nd::Array1<C64> {
        let mut k: nd::Array1<C64> = nd::Array1::zeros(2);
        k[self.index()] = C64::one();
        k
    }
}

/// Kronecker product of two state vectors.
pub fn kron_vec(a: &nd::Array1<C64>, b: &nd::Array1<C64>) -> nd::Array1<C64> {
    a.iter().cartesian_product(b)
        .map(|(ai, bj)| *ai * *bj)
        .collect()
}

/// State vector of a product of single-site levels.
pub fn product_state(levels: &[Level]) -> nd::Array1<C64> {
    levels.iter()
        .fold(nd::array![C64::one()], |acc, l| kron_vec(&acc, &l.ket()))
}

/// Index of a product state in the full basis.
pub fn basis_index(levels: &[Level]) -> usize {
    levels.iter()
        .fold(0, |acc, l| (acc << 1) | l.index())
}

/// Chain configuration with a single Rydberg excitation at `site`.
pub fn single_excitation(n: usize, site: usize) -> AvalancheResult<Vec<Level>> {
    check_atoms(n)?;
    check_site(n, site)?;
    Ok(
        (0..n)
        .map(|j| if j == site { Level::R } else { Level::G })
        .collect()
    )
}

/* Norms **********************************************************************/

/// Compute the norm of an object treated as a quantum state.
pub trait StateNorm {
    fn norm(&self) -> f64;
}

/// The norm of a state vector is the quadrature sum of its elements.
impl<S> StateNorm for nd::ArrayBase<S, nd::Ix1>
where S: nd::Data<Elem = C64>
{
    fn norm(&self) -> f64 { self.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt() }
}

/// Require `psi` to have unit norm to within `tol`; `time` is reported on
/// failure.
pub fn check_norm<S>(psi: &nd::ArrayBase<S, nd::Ix1>, time: f64, tol: f64)
    -> AvalancheResult<()>
where S: nd::Data<Elem = C64>
{
    let norm = psi.norm();
    if (norm - 1.0).abs() <= tol {
        Ok(())
    } else {
        Err(AvalancheError::NormDrift { time, norm, tol })
    }
}

/* Initial states *************************************************************/

/// Description of the state at `t = 0`, convertible to a state vector once the
/// chain length is known.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialState {
    /// One Rydberg excitation at a single site; `None` means the center site,
    /// `N / 2` (rounded down).
    Local(Option<usize>),
    /// Equal-weight superposition of single excitations at every site.
    Collective,
    /// A pre-constructed vector. Will be renormalized.
    Array(nd::Array1<C64>),
}

impl Default for InitialState {
    fn default() -> Self { Self::Local(None) }
}

impl From<nd::Array1<C64>> for InitialState {
    fn from(a: nd::Array1<C64>) -> Self { Self::Array(a) }
}

impl InitialState {
    /// Excitation at the center of the chain.
    pub fn center() -> Self { Self::Local(None) }

    /// Excitation at `site`.
    pub fn local(site: usize) -> Self { Self::Local(Some(site)) }

    /// Resolve the excited site of a [`Self::Local`] for an `n`-atom chain.
    ///
    /// Returns `None` for other variants.
    pub fn site(&self, n: usize) -> Option<usize> {
        match self {
            Self::Local(site) => Some(site.unwrap_or(n / 2)),
            _ => None,
        }
    }

    /// Convert to a unit-norm state vector of dimension 2^`n`.
    ///
    /// Fails if the site of a [`Self::Local`] is outside the chain, if an
    /// [`Self::Array`] has the wrong length or zero norm, or if the result is
    /// not normalized to within [`PREP_NORM_TOL`].
    pub fn into_array(&self, n: usize) -> AvalancheResult<nd::Array1<C64>> {
        check_atoms(n)?;
        let psi: nd::Array1<C64>
            = match self {
                Self::Local(site) => {
                    let k = site.unwrap_or(n / 2);
                    product_state(&single_excitation(n, k)?)
                },
                Self::Collective => {
                    let mut acc: nd::Array1<C64> = nd::Array1::zeros(dim(n));
                    for k in 0..n {
                        acc[basis_index(&single_excitation(n, k)?)]
                            += C64::one();
                    }
                    acc / C64::from((n as f64).sqrt())
                },
                Self::Array(a) => {
                    if a.len() != dim(n) {
                        return Err(AvalancheError::DimensionMismatch {
                            expected: dim(n),
                            got: a.len(),
                        });
                    }
                    let norm = a.norm();
                    if norm == 0.0 { return Err(AvalancheError::ZeroNorm); }
                    a / C64::from(norm)
                },
            };
        check_norm(&psi, 0.0, PREP_NORM_TOL)?;
        Ok(psi)
    }
}

#[cfg(test)]
mod tests {
    use num_traits::Zero;
    use super::*;

    #[test]
    fn product_state_matches_basis_index() {
        let levels = [Level::G, Level::R, Level::G, Level::R];
        let psi = product_state(&levels);
        assert_eq!(psi.len(), 16);
        assert_eq!(basis_index(&levels), 0b0101);
        assert_eq!(psi[0b0101], C64::one());
        assert_eq!(psi.iter().filter(|a| **a != C64::zero()).count(), 1);
    }

    #[test]
    fn local_defaults_to_center() {
        for n in 1..=6 {
            let psi = InitialState::center().into_array(n).unwrap();
            let expected = product_state(&single_excitation(n, n / 2).unwrap());
            assert_eq!(psi, expected);
            assert!((psi.norm() - 1.0).abs() < 1e-10);
        }
        assert_eq!(InitialState::center().site(5), Some(2));
        assert_eq!(InitialState::center().site(4), Some(2));
        assert_eq!(InitialState::Collective.site(4), None);
    }

    #[test]
    fn local_out_of_range_is_rejected() {
        assert!(matches!(
            InitialState::local(3).into_array(3),
            Err(AvalancheError::SiteOutOfRange { site: 3, n_atoms: 3 }),
        ));
    }

    #[test]
    fn collective_is_normalized_superposition() {
        for n in 1..=7 {
            let psi = InitialState::Collective.into_array(n).unwrap();
            assert!((psi.norm() - 1.0).abs() < 1e-10);
            let amp = 1.0 / (n as f64).sqrt();
            for k in 0..n {
                let idx = 1 << (n - 1 - k);
                assert!((psi[idx] - C64::from(amp)).norm() < 1e-14);
            }
            assert_eq!(psi.iter().filter(|a| a.norm() > 0.0).count(), n);
        }
    }

    #[test]
    fn local_and_collective_coincide_for_one_atom() {
        let local = InitialState::center().into_array(1).unwrap();
        let coll = InitialState::Collective.into_array(1).unwrap();
        assert_eq!(local, coll);
    }

    #[test]
    fn array_is_renormalized() {
        let a = nd::array![C64::new(3.0, 0.0), C64::new(0.0, 4.0)];
        let psi = InitialState::from(a).into_array(1).unwrap();
        assert!((psi[0] - C64::from(0.6)).norm() < 1e-15);
        assert!((psi[1] - C64::new(0.0, 0.8)).norm() < 1e-15);
        assert!(matches!(
            InitialState::Array(nd::Array1::zeros(2)).into_array(1),
            Err(AvalancheError::ZeroNorm),
        ));
        assert!(matches!(
            InitialState::Array(nd::Array1::zeros(4)).into_array(1),
            Err(AvalancheError::DimensionMismatch { expected: 2, got: 4 }),
        ));
    }
}
