//! B-spline knots and basis evaluation.

use crate::core::error::{CwBoostError, Result};
use crate::core::types::{Matrix, Vector};
use ndarray::{Array1, Array2, ArrayView1};

/// Equidistant knots over `[min, max]`.
///
/// Places `n_knots` interior knots plus the two boundary knots and extends
/// the sequence by `degree` knots on each side with the same spacing, giving
/// `n_knots + 2 (degree + 1)` knots in total.
pub fn create_knots(min: f64, max: f64, n_knots: usize, degree: usize) -> Result<Vector> {
    if !(min.is_finite() && max.is_finite()) {
        return Err(CwBoostError::numerical("knot range must be finite"));
    }
    if max <= min {
        return Err(CwBoostError::degenerate_fit(
            "spline",
            format!("feature range [{min}, {max}] is empty"),
        ));
    }
    let delta = (max - min) / (n_knots + 1) as f64;
    let total = n_knots + 2 * (degree + 1);
    Ok(Array1::from_shape_fn(total, |i| {
        min + (i as f64 - degree as f64) * delta
    }))
}

/// Index `k` of the knot span `[t_k, t_{k+1})` containing `x`.
///
/// The right boundary of the valid range belongs to the last span.
fn find_span(x: f64, knots: &ArrayView1<'_, f64>, degree: usize, n_basis: usize) -> usize {
    if x >= knots[n_basis] {
        return n_basis - 1;
    }
    if x <= knots[degree] {
        return degree;
    }
    let (mut low, mut high) = (degree, n_basis);
    while high - low > 1 {
        let mid = (low + high) / 2;
        if x < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
    }
    low
}

/// Non-zero basis functions `B_{span-degree..=span}` at `x` (Cox-de Boor).
fn basis_functions(x: f64, span: usize, knots: &ArrayView1<'_, f64>, degree: usize) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;
    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// Evaluate the B-spline basis of `degree` over `knots` at every value.
///
/// Values must lie inside `[knots[degree], knots[len - degree - 1]]`; callers
/// clamp new data before evaluating.
pub fn create_spline_basis(values: &ArrayView1<'_, f64>, degree: usize, knots: &Vector) -> Result<Matrix> {
    if knots.len() < 2 * (degree + 1) {
        return Err(CwBoostError::invalid_parameter(
            "knots",
            knots.len().to_string(),
            format!("need at least {} knots for degree {}", 2 * (degree + 1), degree),
        ));
    }
    let n_basis = knots.len() - degree - 1;
    let knots = knots.view();
    let mut basis = Array2::zeros((values.len(), n_basis));
    for (row, &x) in values.iter().enumerate() {
        let span = find_span(x, &knots, degree, n_basis);
        for (offset, value) in basis_functions(x, span, &knots, degree).into_iter().enumerate() {
            basis[[row, span - degree + offset]] = value;
        }
    }
    Ok(basis)
}

/// Clamp values to `[min, max]`.
pub fn clamp_to_range(values: &ArrayView1<'_, f64>, min: f64, max: f64) -> Vector {
    values.mapv(|v| v.clamp(min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_knot_layout() {
        let knots = create_knots(0.0, 1.0, 3, 2).unwrap();
        assert_eq!(knots.len(), 3 + 2 * 3);
        assert_abs_diff_eq!(knots[0], -0.5);
        assert_abs_diff_eq!(knots[2], 0.0);
        assert_abs_diff_eq!(knots[6], 1.0);
        assert_abs_diff_eq!(knots[8], 1.5);
        assert!(create_knots(1.0, 1.0, 3, 2).is_err());
    }

    #[test]
    fn test_basis_partition_of_unity() {
        let knots = create_knots(-2.0, 3.0, 5, 3).unwrap();
        let x = Array1::linspace(-2.0, 3.0, 41);
        let basis = create_spline_basis(&x.view(), 3, &knots).unwrap();
        assert_eq!(basis.ncols(), 5 + 3 + 1);
        for row in basis.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
            assert!(row.iter().all(|&v| v >= -1e-15));
        }
    }

    #[test]
    fn test_degree_zero_is_indicator() {
        let knots = create_knots(0.0, 2.0, 1, 0).unwrap();
        let basis = create_spline_basis(&array![0.5, 1.5, 2.0].view(), 0, &knots).unwrap();
        assert_eq!(basis, array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_linear_basis_interpolates() {
        let knots = create_knots(0.0, 2.0, 1, 1).unwrap();
        let basis = create_spline_basis(&array![0.5].view(), 1, &knots).unwrap();
        assert_abs_diff_eq!(basis[[0, 0]], 0.5);
        assert_abs_diff_eq!(basis[[0, 1]], 0.5);
        assert_abs_diff_eq!(basis[[0, 2]], 0.0);
    }

    #[test]
    fn test_clamp() {
        let clamped = clamp_to_range(&array![-5.0, 0.5, 9.0].view(), 0.0, 1.0);
        assert_eq!(clamped, array![0.0, 0.5, 1.0]);
    }
}
