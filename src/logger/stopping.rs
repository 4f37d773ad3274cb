//! Plateau detection on a risk sequence.

use crate::core::constants::{DEFAULT_EPS_FOR_BREAK, DEFAULT_PATIENCE};
use crate::core::error::{CwBoostError, Result};
use serde::{Deserialize, Serialize};

/// Settings of a [`RiskPlateau`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateauConfig {
    /// Consecutive non-improving iterations before stopping
    pub patience: usize,
    /// Relative improvement at or below which an iteration counts as non-improving
    pub eps_for_break: f64,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        PlateauConfig {
            patience: DEFAULT_PATIENCE,
            eps_for_break: DEFAULT_EPS_FOR_BREAK,
        }
    }
}

impl PlateauConfig {
    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.patience == 0 {
            return Err(CwBoostError::invalid_parameter(
                "patience",
                "0",
                "must be at least 1",
            ));
        }
        if !self.eps_for_break.is_finite() {
            return Err(CwBoostError::invalid_parameter(
                "eps_for_break",
                self.eps_for_break.to_string(),
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Tracks the relative risk improvement `(r[t-1] - r[t]) / r[t-1]`.
///
/// An iteration whose improvement is at most `eps_for_break` increments the
/// patience counter, any larger improvement resets it. The plateau is reached
/// once the counter hits `patience`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskPlateau {
    config: PlateauConfig,
    previous: Option<f64>,
    counter: usize,
    last_improvement: Option<f64>,
}

impl RiskPlateau {
    /// Create a detector with the given settings.
    pub fn new(config: PlateauConfig) -> Self {
        RiskPlateau {
            config,
            previous: None,
            counter: 0,
            last_improvement: None,
        }
    }

    /// Settings of this detector.
    pub fn config(&self) -> &PlateauConfig {
        &self.config
    }

    /// Feed the next risk value; returns `true` once the plateau is reached.
    pub fn update(&mut self, risk: f64) -> bool {
        if let Some(previous) = self.previous {
            let improvement = if previous == 0.0 {
                0.0
            } else {
                (previous - risk) / previous
            };
            self.last_improvement = Some(improvement);
            if improvement <= self.config.eps_for_break {
                self.counter += 1;
            } else {
                self.counter = 0;
            }
        }
        self.previous = Some(risk);
        self.is_reached()
    }

    /// Check if the patience is exhausted.
    pub fn is_reached(&self) -> bool {
        self.counter >= self.config.patience
    }

    /// Relative improvement of the last update.
    pub fn last_improvement(&self) -> Option<f64> {
        self.last_improvement
    }

    /// Consecutive non-improving iterations so far.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Start over.
    pub fn reset(&mut self) {
        self.previous = None;
        self.counter = 0;
        self.last_improvement = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plateau(patience: usize, eps: f64) -> RiskPlateau {
        RiskPlateau::new(PlateauConfig {
            patience,
            eps_for_break: eps,
        })
    }

    #[test]
    fn test_plateau_needs_consecutive_iterations() {
        let mut p = plateau(2, 0.01);
        assert!(!p.update(1.0));
        assert!(!p.update(0.5));
        assert!(!p.update(0.499));
        assert_eq!(p.counter(), 1);
        assert!(!p.update(0.3));
        assert_eq!(p.counter(), 0);
        assert!(!p.update(0.2999));
        assert!(p.update(0.2998));
    }

    #[test]
    fn test_increasing_risk_counts_as_no_improvement() {
        let mut p = plateau(1, 0.0);
        p.update(1.0);
        assert!(p.update(1.2));
        assert!(p.last_improvement().unwrap() < 0.0);
    }

    #[test]
    fn test_reset() {
        let mut p = plateau(1, 0.5);
        p.update(1.0);
        assert!(p.update(0.9));
        p.reset();
        assert!(!p.is_reached());
        assert!(!p.update(0.9));
    }

    #[test]
    fn test_config_validation() {
        assert!(PlateauConfig::default().validate().is_ok());
        let bad = PlateauConfig {
            patience: 0,
            ..PlateauConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
