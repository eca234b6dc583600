//! Single-site two-level operators and their embedding into the full `N`-atom
//! Hilbert space.
//!
//! The full space is ordered as the left-to-right Kronecker product over sites
//! `0, 1, ..., N - 1`, so site 0 corresponds to the most significant bit of a
//! basis-state index.

use ndarray::{ self as nd, linalg::kron };
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::error::{ AvalancheError, AvalancheResult };

/// Largest chain for which dense operators are ever built.
///
/// At 16 atoms a single 2^N × 2^N complex matrix already occupies 64 GiB.
pub const MAX_ATOMS: usize = 16;

/// Default memory budget for dense operators, in bytes (8 GiB).
pub const DEFAULT_MEMORY_BUDGET: u128 = 8 << 30;

/// Identity on a single site.
pub fn eye() -> nd::Array2<C64> { nd::Array2::eye(2) }

/// Raising operator `|r⟩⟨g|`.
pub fn sigma_plus() -> nd::Array2<C64> {
    nd::array![
        [C64::zero(), C64::zero()],
        [C64::one(),  C64::zero()],
    ]
}

/// Lowering operator `|g⟩⟨r|`.
pub fn sigma_minus() -> nd::Array2<C64> {
    nd::array![
        [C64::zero(), C64::one() ],
        [C64::zero(), C64::zero()],
    ]
}

/// Rydberg number operator `|r⟩⟨r|`.
pub fn number() -> nd::Array2<C64> {
    nd::array![
        [C64::zero(), C64::zero()],
        [C64::zero(), C64::one() ],
    ]
}

/// Drive coupling `σ⁺ + σ⁻`.
pub fn sigma_x() -> nd::Array2<C64> { sigma_plus() + sigma_minus() }

/// Hilbert-space dimension of an `n`-atom chain, saturating at `usize::MAX`
/// for chains too long to index.
pub fn dim(n: usize) -> usize {
    u32::try_from(n).ok()
        .and_then(|shift| 1_usize.checked_shl(shift))
        .unwrap_or(usize::MAX)
}

/// Reject atom counts for which no dense computation is possible.
pub fn check_atoms(n: usize) -> AvalancheResult<usize> {
    if n == 0 {
        Err(AvalancheError::NoAtoms)
    } else if n > MAX_ATOMS {
        Err(AvalancheError::TooManyAtoms { n_atoms: n, max: MAX_ATOMS })
    } else {
        Ok(n)
    }
}

/// Bytes held by `count` dense `dim × dim` complex matrices, saturating at
/// `u128::MAX`.
pub fn dense_bytes(dim: usize, count: u128) -> u128 {
    let d = dim as u128;
    d.checked_mul(d)
        .and_then(|d2| d2.checked_mul(count))
        .and_then(|b| b.checked_mul(std::mem::size_of::<C64>() as u128))
        .unwrap_or(u128::MAX)
}

/// Estimated memory footprint in bytes of the static operators of an
/// `n`-atom simulation: the Hamiltonian plus one number operator per site.
///
/// Working storage of the evolution comes on top of this; see
/// [`Strategy::working_matrices`][crate::evolution::Strategy::working_matrices].
pub fn memory_estimate(n: usize) -> u128 {
    dense_bytes(dim(n), (n as u128).saturating_add(1))
}

/// Fail if `required` bytes for a computation of dimension `dim` exceed
/// `budget`.
pub fn check_budget(dim: usize, required: u128, budget: u128)
    -> AvalancheResult<()>
{
    if required > budget {
        Err(AvalancheError::MemoryBudget { dim, required, budget })
    } else {
        Ok(())
    }
}

/// Check that the static operators of an `n`-atom simulation fit in `budget`
/// bytes before anything is allocated.
pub fn check_memory(n: usize, budget: u128) -> AvalancheResult<()> {
    check_atoms(n)?;
    check_budget(dim(n), memory_estimate(n), budget)
}

/// Iterated Kronecker product of a list of operators, taken left to right.
///
/// An empty list gives the 1 × 1 identity.
pub fn tensor<'a, I>(ops: I) -> nd::Array2<C64>
where I: IntoIterator<Item = nd::ArrayView2<'a, C64>>
{
    ops.into_iter()
        .fold(nd::Array2::eye(1), |acc, op| kron(&acc, &op))
}

/// Build the full-space operator acting as `site_op(j)` on every site `j` for
/// which it returns `Some`, and as `default` everywhere else.
pub fn embed<'a, F>(n: usize, site_op: F, default: nd::ArrayView2<'a, C64>)
    -> nd::Array2<C64>
where F: Fn(usize) -> Option<nd::ArrayView2<'a, C64>>
{
    tensor((0..n).map(|j| site_op(j).unwrap_or(default)))
}

/// Place `op` at site `j` of an `n`-atom chain, identity elsewhere.
pub fn site_op(n: usize, j: usize, op: &nd::Array2<C64>)
    -> AvalancheResult<nd::Array2<C64>>
{
    check_site(n, j)?;
    let id = eye();
    Ok(embed(n, |k| (k == j).then(|| op.view()), id.view()))
}

/// Place `op_i` at site `i` and `op_j` at site `j` of an `n`-atom chain,
/// identity elsewhere. `i` and `j` must differ.
pub fn pair_op(
    n: usize,
    i: usize,
    op_i: &nd::Array2<C64>,
    j: usize,
    op_j: &nd::Array2<C64>,
) -> AvalancheResult<nd::Array2<C64>>
{
    check_site(n, i)?;
    check_site(n, j)?;
    if i == j {
        return Err(AvalancheError::DuplicateSite(i));
    }
    let id = eye();
    Ok(
        embed(
            n,
            |k| {
                if k == i {
                    Some(op_i.view())
                } else if k == j {
                    Some(op_j.view())
                } else {
                    None
                }
            },
            id.view(),
        )
    )
}

/// Number operators `n_j` for every site of an `n`-atom chain, provided the
/// `n` matrices fit in `budget` bytes.
pub fn number_ops(n: usize, budget: u128)
    -> AvalancheResult<Vec<nd::Array2<C64>>>
{
    check_atoms(n)?;
    check_budget(dim(n), dense_bytes(dim(n), n as u128), budget)?;
    let nr = number();
    (0..n).map(|j| site_op(n, j, &nr)).collect()
}

pub(crate) fn check_site(n: usize, j: usize) -> AvalancheResult<usize> {
    if j < n {
        Ok(j)
    } else {
        Err(AvalancheError::SiteOutOfRange { site: j, n_atoms: n })
    }
}

/// Largest elementwise deviation `max |A_ij - conj(A_ji)|`.
///
/// Non-square input is never Hermitian and gives infinity.
pub fn hermitian_defect<S>(A: &nd::ArrayBase<S, nd::Ix2>) -> f64
where S: nd::Data<Elem = C64>
{
    if !A.is_square() { return f64::INFINITY; }
    A.indexed_iter()
        .map(|((i, j), a)| (a - A[[j, i]].conj()).norm())
        .fold(0.0, f64::max)
}

/// Require `A` to be Hermitian to within `tol`, relative to its largest
/// element (or absolute, for elements smaller than 1).
pub fn check_hermitian<S>(A: &nd::ArrayBase<S, nd::Ix2>, tol: f64)
    -> AvalancheResult<()>
where S: nd::Data<Elem = C64>
{
    let scale: f64 = A.iter().map(|a| a.norm()).fold(1.0, f64::max);
    let defect = hermitian_defect(A);
    if defect <= tol * scale {
        Ok(())
    } else {
        Err(AvalancheError::NotHermitian { defect, tol: tol * scale })
    }
}
