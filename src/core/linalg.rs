//! Dense linear algebra for base-learner fits, backed by `faer`.
//!
//! Base-learner systems are small (a handful of polynomial columns, a few
//! dozen spline coefficients). A system is copied into `faer` storage once
//! per factory, factorized there and then solved for every residual.

use crate::core::constants::{CONDITION_EPSILON, DEMMLER_REINSCH_EPSILON, DF_PENALTY_LOG10_RANGE};
use crate::core::error::{CwBoostError, Result};
use crate::core::stats;
use faer::linalg::solvers::{Llt, Solve};
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::fmt;

const PENALTY_RANK_EPSILON: f64 = 1e-10;

fn to_faer(a: &ArrayView2<'_, f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_ndarray(m: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn check_square(a: &ArrayView2<'_, f64>) -> Result<usize> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(CwBoostError::dimension_mismatch(
            format!("square matrix ({n} x {n})"),
            format!("({} x {})", a.nrows(), a.ncols()),
        ));
    }
    Ok(n)
}

/// Eigenvalues of a symmetric matrix in ascending order.
pub fn symmetric_eigenvalues(a: &ArrayView2<'_, f64>) -> Result<Vec<f64>> {
    check_square(a)?;
    to_faer(a)
        .as_ref()
        .self_adjoint_eigenvalues(Side::Lower)
        .map_err(|e| CwBoostError::numerical(format!("eigenvalue decomposition failed: {e:?}")))
}

/// LLᵗ factorization of a symmetric positive definite system.
pub struct SpdSolver {
    llt: Llt<f64>,
    dim: usize,
    reciprocal_condition: f64,
}

impl fmt::Debug for SpdSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpdSolver")
            .field("dim", &self.dim)
            .field("reciprocal_condition", &self.reciprocal_condition)
            .finish()
    }
}

impl SpdSolver {
    /// Factorize a symmetric positive definite matrix.
    ///
    /// Fails with [`CwBoostError::Numerical`] if the matrix has non-finite
    /// entries, if its reciprocal condition number is below
    /// `CONDITION_EPSILON` or if the LLᵗ factorization breaks down. Singular
    /// and ill-conditioned design matrices show up this way.
    pub fn factorize(a: &ArrayView2<'_, f64>) -> Result<Self> {
        let n = check_square(a)?;
        if n == 0 {
            return Err(CwBoostError::numerical("cannot factorize an empty matrix"));
        }
        if a.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::numerical("matrix contains non-finite values"));
        }

        let eigenvalues = symmetric_eigenvalues(a)?;
        let smallest = eigenvalues.first().copied().unwrap_or(0.0);
        let largest = eigenvalues.last().copied().unwrap_or(0.0);
        if largest <= 0.0 {
            return Err(CwBoostError::numerical("matrix is not positive definite"));
        }
        let reciprocal_condition = smallest / largest;
        if reciprocal_condition < CONDITION_EPSILON {
            return Err(CwBoostError::numerical(format!(
                "matrix is singular or ill-conditioned (reciprocal condition {reciprocal_condition:.3e})"
            )));
        }

        let llt = Llt::new(to_faer(a).as_ref(), Side::Lower).map_err(|e| {
            CwBoostError::numerical(format!("Cholesky factorization failed: {e:?}"))
        })?;
        Ok(SpdSolver {
            llt,
            dim: n,
            reciprocal_condition,
        })
    }

    /// Dimension of the factorized system.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Smallest over largest eigenvalue of the factorized matrix.
    pub fn reciprocal_condition(&self) -> f64 {
        self.reciprocal_condition
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let n = self.dim;
        if b.len() != n {
            return Err(CwBoostError::dimension_mismatch(
                format!("right-hand side of length {n}"),
                format!("length {}", b.len()),
            ));
        }
        let rhs = Mat::from_fn(n, 1, |i, _| b[i]);
        let solution = self.llt.solve(rhs.as_ref());
        let x = Array1::from_shape_fn(n, |i| solution[(i, 0)]);
        if x.iter().any(|v| !v.is_finite()) {
            return Err(CwBoostError::numerical("solution contains non-finite values"));
        }
        Ok(x)
    }

    /// Solve `A X = B` for every column of `B`.
    pub fn solve_matrix(&self, b: &ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if b.nrows() != self.dim {
            return Err(CwBoostError::dimension_mismatch(
                format!("right-hand side with {} rows", self.dim),
                b.nrows().to_string(),
            ));
        }
        let solution = self.llt.solve(to_faer(b).as_ref());
        Ok(to_ndarray(solution.as_ref()))
    }
}

/// Gram matrix `XᵗX`.
pub fn gram(x: &ArrayView2<'_, f64>) -> Array2<f64> {
    x.t().dot(x)
}

/// Squared difference penalty matrix `DᵗD` for `n_params` coefficients.
///
/// `D` is the `differences`-order difference operator. `differences == 0`
/// yields the identity (plain ridge penalty).
pub fn difference_penalty(n_params: usize, differences: usize) -> Result<Array2<f64>> {
    if differences == 0 {
        return Ok(Array2::eye(n_params));
    }
    if differences >= n_params {
        return Err(CwBoostError::invalid_parameter(
            "differences",
            differences.to_string(),
            format!("must be smaller than the number of coefficients ({n_params})"),
        ));
    }

    let mut d = Array2::<f64>::eye(n_params);
    for _ in 0..differences {
        let rows = d.nrows() - 1;
        let mut next = Array2::<f64>::zeros((rows, n_params));
        for i in 0..rows {
            for j in 0..n_params {
                next[[i, j]] = d[[i + 1, j]] - d[[i, j]];
            }
        }
        d = next;
    }
    Ok(d.t().dot(&d))
}

/// Effective degrees of freedom `2 tr(S) - tr(S²)` of the smoother
/// `S = (XᵗX + λP)⁻¹ XᵗX`.
pub fn effective_df(
    gram: &ArrayView2<'_, f64>,
    penalty: &ArrayView2<'_, f64>,
    lambda: f64,
) -> Result<f64> {
    check_square(gram)?;
    if gram.dim() != penalty.dim() {
        return Err(CwBoostError::dimension_mismatch(
            format!("penalty of shape {:?}", gram.dim()),
            format!("{:?}", penalty.dim()),
        ));
    }
    let system = gram + &(penalty * lambda);
    let smoother = SpdSolver::factorize(&system.view())?.solve_matrix(gram)?;
    let trace: f64 = smoother.diag().sum();
    let trace_squared: f64 = (&smoother * &smoother.t()).sum();
    Ok(2.0 * trace - trace_squared)
}

/// Demmler-Reinsch eigenvalues of `penalty` relative to `gram`.
///
/// These are the eigenvalues of `A^(-1/2) P A^(-1/2)` with
/// `A = XᵗX + εP`, clamped at zero.
pub fn demmler_reinsch_values(
    gram: &ArrayView2<'_, f64>,
    penalty: &ArrayView2<'_, f64>,
) -> Result<Vec<f64>> {
    let n = check_square(gram)?;
    if gram.dim() != penalty.dim() {
        return Err(CwBoostError::dimension_mismatch(
            format!("penalty of shape {:?}", gram.dim()),
            format!("{:?}", penalty.dim()),
        ));
    }
    let system = gram + &(penalty * DEMMLER_REINSCH_EPSILON);
    let evd = to_faer(&system.view())
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| CwBoostError::numerical(format!("eigen decomposition failed: {e:?}")))?;
    let eigenvectors = to_ndarray(evd.U());
    let eigenvalues = evd.S().column_vector();

    let mut scale = Array1::<f64>::zeros(n);
    for i in 0..n {
        let value = eigenvalues[i];
        if !(value.is_finite() && value > 0.0) {
            return Err(CwBoostError::numerical(
                "XᵗX plus the scaled penalty is not positive definite",
            ));
        }
        scale[i] = value.sqrt().recip();
    }
    let inv_sqrt = (&eigenvectors * &scale).dot(&eigenvectors.t());
    let relative = inv_sqrt.dot(penalty).dot(&inv_sqrt);
    Ok(symmetric_eigenvalues(&relative.view())?
        .into_iter()
        .map(|v| v.max(0.0))
        .collect())
}

/// Penalty `λ` at which the smoother of `gram` and `penalty` has `df`
/// effective degrees of freedom.
///
/// With the Demmler-Reinsch values `s`, the degrees of freedom are
/// `Σ 2/(1 + λs) - 1/(1 + λs)²`. They fall from the number of coefficients
/// at `λ = 0` towards the dimension of the unpenalized space, so `λ` is
/// found by bisection on `log10 λ`.
pub fn penalty_from_df(
    gram: &ArrayView2<'_, f64>,
    penalty: &ArrayView2<'_, f64>,
    df: f64,
) -> Result<f64> {
    let n = gram.nrows();
    if !(df.is_finite() && df > 0.0 && df <= n as f64) {
        return Err(CwBoostError::invalid_parameter(
            "df",
            df.to_string(),
            format!("must be in (0, {n}]"),
        ));
    }

    let values = demmler_reinsch_values(gram, penalty)?;
    let penalty_eigenvalues = symmetric_eigenvalues(penalty)?;
    let largest = penalty_eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    let null_dim = penalty_eigenvalues
        .iter()
        .filter(|&&v| v <= PENALTY_RANK_EPSILON * largest)
        .count();
    if df <= null_dim as f64 {
        return Err(CwBoostError::invalid_parameter(
            "df",
            df.to_string(),
            format!("must exceed the {null_dim} unpenalized directions"),
        ));
    }
    if df >= n as f64 {
        return Ok(0.0);
    }

    let degrees_of_freedom = |lambda: f64| -> f64 {
        values
            .iter()
            .map(|&s| {
                let shrink = 1.0 / (1.0 + lambda * s);
                2.0 * shrink - shrink * shrink
            })
            .sum()
    };
    let (lower, upper) = DF_PENALTY_LOG10_RANGE;
    let exponent = stats::bisect_decreasing(
        |t| degrees_of_freedom(10f64.powf(t)) - df,
        lower,
        upper,
    );
    Ok(10f64.powf(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_spd_solve() {
        let a = array![[4.0, 2.0, 0.6], [2.0, 5.0, 1.0], [0.6, 1.0, 3.0]];
        let b = array![1.0, 2.0, 3.0];
        let solver = SpdSolver::factorize(&a.view()).unwrap();
        assert_eq!(solver.dim(), 3);
        assert!(solver.reciprocal_condition() > 0.1);
        let x = solver.solve(&b.view()).unwrap();
        let back = a.dot(&x);
        for (lhs, rhs) in back.iter().zip(b.iter()) {
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }

        let inverse = solver.solve_matrix(&Array2::eye(3).view()).unwrap();
        let identity = a.dot(&inverse);
        for ((i, j), v) in identity.indexed_iter() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(*v, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spd_rejects_singular() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let err = SpdSolver::factorize(&a.view()).unwrap_err();
        assert!(matches!(err, CwBoostError::Numerical { .. }));
    }

    #[test]
    fn test_spd_rejects_ill_conditioned() {
        let a = array![[1.0, 0.0], [0.0, 1e-15]];
        assert!(SpdSolver::factorize(&a.view()).is_err());
        let indefinite = array![[1.0, 0.0], [0.0, -1.0]];
        assert!(SpdSolver::factorize(&indefinite.view()).is_err());
    }

    #[test]
    fn test_spd_rejects_bad_shapes() {
        assert!(SpdSolver::factorize(&Array2::<f64>::zeros((2, 3)).view()).is_err());
        assert!(SpdSolver::factorize(&Array2::<f64>::zeros((0, 0)).view()).is_err());
        let solver = SpdSolver::factorize(&Array2::<f64>::eye(2).view()).unwrap();
        assert!(solver.solve(&array![1.0].view()).is_err());
    }

    #[test]
    fn test_first_order_penalty() {
        let p = difference_penalty(3, 1).unwrap();
        let expected = array![[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]];
        assert_eq!(p, expected);
    }

    #[test]
    fn test_second_order_penalty_annihilates_linear() {
        let p = difference_penalty(6, 2).unwrap();
        let linear = Array1::from_iter((0..6).map(|i| 2.0 * i as f64 + 1.0));
        let penalized = p.dot(&linear);
        for v in penalized.iter() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_penalty_order_too_large() {
        assert!(difference_penalty(2, 2).is_err());
        assert_eq!(difference_penalty(3, 0).unwrap(), Array2::<f64>::eye(3));
    }

    #[test]
    fn test_ridge_penalty_from_df() {
        // Two classes with four observations each: 4 (4 + 2λ) / (4 + λ)² = 1/2.
        let gram = Array2::from_diag(&array![4.0, 4.0]);
        let identity = Array2::eye(2);
        let lambda = penalty_from_df(&gram.view(), &identity.view(), 1.0).unwrap();
        assert_abs_diff_eq!(lambda, 4.0 + 32f64.sqrt(), epsilon = 1e-4);
        let df = effective_df(&gram.view(), &identity.view(), lambda).unwrap();
        assert_abs_diff_eq!(df, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_difference_penalty_from_df() {
        let x = Array1::linspace(0.0, 1.0, 30);
        let design = Array2::from_shape_fn((30, 6), |(i, j)| {
            let center = j as f64 / 5.0;
            (-(x[i] - center).powi(2) * 20.0).exp()
        });
        let gram = gram(&design.view());
        let penalty = difference_penalty(6, 2).unwrap();
        for target in [2.5, 4.0, 5.5] {
            let lambda = penalty_from_df(&gram.view(), &penalty.view(), target).unwrap();
            let df = effective_df(&gram.view(), &penalty.view(), lambda).unwrap();
            assert_abs_diff_eq!(df, target, epsilon = 1e-4);
        }
        assert_eq!(penalty_from_df(&gram.view(), &penalty.view(), 6.0).unwrap(), 0.0);
        // A second-order penalty leaves two directions unpenalized.
        assert!(penalty_from_df(&gram.view(), &penalty.view(), 2.0).is_err());
        assert!(penalty_from_df(&gram.view(), &penalty.view(), 7.0).is_err());
    }
}
