//! Hyper-parameters of the built-in base-learner factories.

use crate::core::constants::*;
use crate::core::error::{CwBoostError, Result};
use serde::{Deserialize, Serialize};

/// Polynomial base learner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialConfig {
    /// Highest power of the feature
    pub degree: usize,
    /// Add a constant column to the basis
    pub intercept: bool,
    /// Ridge penalty added to the diagonal of the normal equations
    pub penalty: f64,
    /// Target degrees of freedom; when positive the ridge penalty is derived
    /// from it and `penalty` is ignored
    pub df: f64,
}

impl Default for PolynomialConfig {
    fn default() -> Self {
        PolynomialConfig {
            degree: DEFAULT_POLYNOMIAL_DEGREE,
            intercept: true,
            penalty: 0.0,
            df: 0.0,
        }
    }
}

impl PolynomialConfig {
    /// Polynomial of the given degree with intercept and no penalty.
    pub fn with_degree(degree: usize) -> Self {
        PolynomialConfig {
            degree,
            ..Self::default()
        }
    }

    /// Number of basis columns, `degree` plus one for the intercept.
    pub fn num_basis_functions(&self) -> usize {
        self.degree + usize::from(self.intercept)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.degree == 0 {
            return Err(CwBoostError::invalid_parameter(
                "degree",
                self.degree.to_string(),
                "must be at least 1",
            ));
        }
        validate_penalty(self.penalty)?;
        validate_df(self.df, Some(self.num_basis_functions()))
    }
}

/// P-spline base learner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PSplineConfig {
    /// Degree of the B-spline basis
    pub degree: usize,
    /// Number of interior knots
    pub n_knots: usize,
    /// Smoothing parameter of the difference penalty
    pub penalty: f64,
    /// Order of the difference penalty
    pub differences: usize,
    /// Target degrees of freedom; when positive the smoothing parameter is
    /// derived from it and `penalty` is ignored
    pub df: f64,
}

impl Default for PSplineConfig {
    fn default() -> Self {
        PSplineConfig {
            degree: DEFAULT_SPLINE_DEGREE,
            n_knots: DEFAULT_N_KNOTS,
            penalty: DEFAULT_SPLINE_PENALTY,
            differences: DEFAULT_DIFFERENCES,
            df: 0.0,
        }
    }
}

impl PSplineConfig {
    /// Number of basis functions, `n_knots + degree + 1`.
    pub fn num_basis_functions(&self) -> usize {
        self.n_knots + self.degree + 1
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        validate_penalty(self.penalty)?;
        validate_df(self.df, Some(self.num_basis_functions()))?;
        if self.df > 0.0 && self.df <= self.differences as f64 {
            return Err(CwBoostError::invalid_parameter(
                "df",
                self.df.to_string(),
                format!(
                    "must exceed the {} directions a difference penalty of that order leaves free",
                    self.differences
                ),
            ));
        }
        if self.differences >= self.num_basis_functions() {
            return Err(CwBoostError::invalid_parameter(
                "differences",
                self.differences.to_string(),
                format!(
                    "must be smaller than the number of basis functions ({})",
                    self.num_basis_functions()
                ),
            ));
        }
        Ok(())
    }
}

/// Categorical ridge base learner settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoricalRidgeConfig {
    /// Ridge penalty on the class effects
    pub penalty: f64,
    /// Target degrees of freedom; when positive the penalty is derived from
    /// it and `penalty` is ignored
    pub df: f64,
}

impl CategoricalRidgeConfig {
    /// Ridge with the penalty chosen to reach `df` degrees of freedom.
    pub fn with_df(df: f64) -> Self {
        CategoricalRidgeConfig { penalty: 0.0, df }
    }

    /// Validate the settings. The upper bound on `df` is the number of
    /// classes and is checked when the data is known.
    pub fn validate(&self) -> Result<()> {
        validate_penalty(self.penalty)?;
        validate_df(self.df, None)
    }
}

fn validate_penalty(penalty: f64) -> Result<()> {
    if !(penalty.is_finite() && penalty >= 0.0) {
        return Err(CwBoostError::invalid_parameter(
            "penalty",
            penalty.to_string(),
            "must be non-negative and finite",
        ));
    }
    Ok(())
}

fn validate_df(df: f64, max: Option<usize>) -> Result<()> {
    if !(df.is_finite() && df >= 0.0) {
        return Err(CwBoostError::invalid_parameter(
            "df",
            df.to_string(),
            "must be non-negative and finite",
        ));
    }
    match max {
        Some(max) if df > max as f64 => Err(CwBoostError::invalid_parameter(
            "df",
            df.to_string(),
            format!("must not exceed the {max} basis functions"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learner_defaults() {
        let poly = PolynomialConfig::default();
        assert_eq!(poly.degree, 1);
        assert!(poly.intercept);
        assert!(poly.validate().is_ok());

        let spline = PSplineConfig::default();
        assert_eq!(spline.degree, 3);
        assert_eq!(spline.n_knots, 20);
        assert_eq!(spline.penalty, 2.0);
        assert_eq!(spline.differences, 2);
        assert_eq!(spline.num_basis_functions(), 24);
        assert!(spline.validate().is_ok());
    }

    #[test]
    fn test_learner_validation() {
        assert!(PolynomialConfig::with_degree(0).validate().is_err());

        let spline = PSplineConfig {
            penalty: -1.0,
            ..PSplineConfig::default()
        };
        assert!(spline.validate().is_err());

        let spline = PSplineConfig {
            degree: 0,
            n_knots: 1,
            differences: 2,
            ..PSplineConfig::default()
        };
        assert!(spline.validate().is_err());
    }

    #[test]
    fn test_df_validation() {
        let poly = PolynomialConfig {
            df: 1.5,
            ..PolynomialConfig::with_degree(2)
        };
        assert!(poly.validate().is_ok());
        let poly = PolynomialConfig { df: 4.0, ..poly };
        assert!(poly.validate().is_err());

        let spline = PSplineConfig {
            df: 5.0,
            ..PSplineConfig::default()
        };
        assert!(spline.validate().is_ok());
        for df in [2.0, 30.0, f64::NAN, -1.0] {
            assert!(PSplineConfig { df, ..spline.clone() }.validate().is_err());
        }

        assert!(CategoricalRidgeConfig::with_df(2.0).validate().is_ok());
        assert!(CategoricalRidgeConfig::with_df(-2.0).validate().is_err());
    }
}
