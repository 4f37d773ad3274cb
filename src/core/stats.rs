//! Summary statistics and one-dimensional optimization helpers.

use crate::core::constants::LINE_SEARCH_TOLERANCE;
use crate::core::error::{CwBoostError, Result};
use ndarray::ArrayView1;

/// Arithmetic mean. Fails on empty input.
pub fn mean(values: &ArrayView1<'_, f64>) -> Result<f64> {
    if values.is_empty() {
        return Err(CwBoostError::numerical("mean of an empty vector"));
    }
    Ok(values.sum() / values.len() as f64)
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// `q = 0.5` yields the median (average of the two middle values for even
/// lengths).
pub fn quantile(values: &ArrayView1<'_, f64>, q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(CwBoostError::numerical("quantile of an empty vector"));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(CwBoostError::invalid_parameter(
            "quantile",
            q.to_string(),
            "must be in [0, 1]",
        ));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(CwBoostError::numerical("quantile of a vector containing NaN"));
    }

    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let h = q * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Ok(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Median, see [`quantile`].
pub fn median(values: &ArrayView1<'_, f64>) -> Result<f64> {
    quantile(values, 0.5)
}

/// Logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Golden-section search for the minimum of a unimodal function on `[lower, upper]`.
pub fn golden_section_minimize<F>(f: F, lower: f64, upper: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = if lower <= upper {
        (lower, upper)
    } else {
        (upper, lower)
    };
    let tolerance = LINE_SEARCH_TOLERANCE * (1.0 + a.abs().max(b.abs()));

    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    while (b - a).abs() > tolerance {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }
    (a + b) / 2.0
}

/// Root of a decreasing function on `[lower, upper]` by bisection.
///
/// Returns the bound closer to the root if `f` keeps its sign on the interval.
pub fn bisect_decreasing<F>(f: F, lower: f64, upper: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (lower.min(upper), lower.max(upper));
    if f(a) <= 0.0 {
        return a;
    }
    if f(b) >= 0.0 {
        return b;
    }
    let tolerance = LINE_SEARCH_TOLERANCE * (1.0 + a.abs().max(b.abs()));
    while b - a > tolerance {
        let mid = 0.5 * (a + b);
        if f(mid) > 0.0 {
            a = mid;
        } else {
            b = mid;
        }
    }
    0.5 * (a + b)
}
