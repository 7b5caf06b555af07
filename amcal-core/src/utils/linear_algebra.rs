//! Linear algebra utilities.
//!
//! Series and chains are stored as `ndarray` arrays while factorisations use
//! `nalgebra`. The helpers here convert between the two and implement the
//! positive-definiteness check shared by the initial and adapted proposal
//! covariances.

use nalgebra::{Cholesky, DMatrix, Dyn};
use ndarray::{Array2, ArrayView2};

/// Smallest accepted Cholesky pivot of the diagonally scaled matrix.
///
/// The check runs on `D^-1/2 M D^-1/2` (unit diagonal), so it does not depend
/// on the units of the individual parameters. Pivots below this are treated as
/// zero so that rank-deficient matrices which only factorise because of
/// rounding are rejected.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-6;

/// Copy a 2D `ndarray` view into a `nalgebra` matrix.
pub fn to_matrix(array: ArrayView2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = array.dim();
    DMatrix::from_fn(nrows, ncols, |i, j| array[[i, j]])
}

/// Copy a `nalgebra` matrix into an owned `ndarray` array.
pub fn to_array2(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}

/// Return `(m + mᵀ) / 2`.
///
/// # Panics
/// Panics if `m` is not square.
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    assert!(m.is_square(), "Matrix must be square");
    (m + m.transpose()) * 0.5
}

/// Unbiased empirical covariance of a set of samples.
///
/// # Arguments
/// * `samples` - Samples stored row-wise, shape (n_samples, n_params)
///
/// # Returns
/// The (n_params, n_params) covariance matrix using the `n - 1` normalisation,
/// or `None` if fewer than two samples are provided.
///
/// Deviations are taken relative to the first sample before averaging, so a
/// window of identical samples yields an exactly zero matrix rather than one
/// polluted by rounding in the mean.
pub fn empirical_covariance(samples: ArrayView2<f64>) -> Option<DMatrix<f64>> {
    let (n, d) = samples.dim();
    if n < 2 {
        return None;
    }

    let origin = samples.row(0);
    let shifted = DMatrix::from_fn(n, d, |i, j| samples[[i, j]] - origin[j]);
    let mean = shifted.row_mean();
    let centred = DMatrix::from_fn(n, d, |i, j| shifted[(i, j)] - mean[j]);

    let cov = centred.transpose() * &centred / (n as f64 - 1.0);
    Some(symmetrize(&cov))
}

/// Cholesky factorisation that only succeeds for well-conditioned
/// symmetric positive-definite matrices.
///
/// Returns `None` if the matrix is not square, contains non-finite values, has
/// a non-positive diagonal, is not symmetric, or has a pivot that is zero once
/// every row and column is scaled to a unit diagonal.
pub fn checked_cholesky(m: &DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    if !m.is_square() || m.nrows() == 0 {
        return None;
    }
    if m.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if m.diagonal().iter().any(|&v| v <= 0.0) {
        return None;
    }

    let inv_sqrt = m.diagonal().map(|v| 1.0 / v.sqrt());
    let n = m.nrows();
    let scaled = DMatrix::from_fn(n, n, |i, j| m[(i, j)] * inv_sqrt[i] * inv_sqrt[j]);
    if scaled.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if (&scaled - scaled.transpose()).amax() > 1e-12 {
        return None;
    }

    let scaled_chol = scaled.cholesky()?;
    let pivots_ok = scaled_chol
        .l()
        .diagonal()
        .iter()
        .all(|&p| p.is_finite() && p > RELATIVE_PIVOT_TOLERANCE);
    if !pivots_ok {
        return None;
    }

    let chol = m.clone().cholesky()?;
    if chol.l().iter().all(|v| v.is_finite()) {
        Some(chol)
    } else {
        None
    }
}

/// Whether `m` is symmetric positive-definite according to [`checked_cholesky`].
pub fn is_positive_definite(m: &DMatrix<f64>) -> bool {
    checked_cholesky(m).is_some()
}

/// Invert a symmetric positive-definite matrix via its Cholesky factorisation.
///
/// Returns `None` if the matrix fails [`checked_cholesky`].
pub fn invert_spd(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    checked_cholesky(m).map(|chol| symmetrize(&chol.inverse()))
}
