//! Core boosting configuration.

use crate::core::constants::*;
use crate::core::error::{CwBoostError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Settings of a boosting run that do not depend on the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    /// Shrinkage applied to every selected base learner, in (0, 1]
    pub learning_rate: f64,
    /// Iteration bound used by `train` when no iteration logger is registered
    pub max_iterations: usize,
    /// Initialize with the loss' constant initializer instead of zero
    pub use_offset: bool,
    /// Stop only when every stopper fires instead of the first one
    pub stop_if_all_stoppers: bool,
    /// Fit the candidates of one iteration in parallel
    pub parallel_fit: bool,
    /// Size of a dedicated thread pool, 0 uses the global rayon pool
    pub num_threads: usize,
    /// Print a status line every `trace` iterations, 0 disables it
    pub trace: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        BoostingConfig {
            learning_rate: DEFAULT_LEARNING_RATE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            use_offset: true,
            stop_if_all_stoppers: false,
            parallel_fit: true,
            num_threads: 0,
            trace: 0,
        }
    }
}

impl BoostingConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(CwBoostError::invalid_parameter(
                "learning_rate",
                self.learning_rate.to_string(),
                "must be in range (0.0, 1.0]",
            ));
        }

        if self.max_iterations == 0 {
            return Err(CwBoostError::invalid_parameter(
                "max_iterations",
                self.max_iterations.to_string(),
                "must be at least 1",
            ));
        }

        if self.num_threads > 4 * num_cpus::get().max(1) {
            log::warn!(
                "num_threads = {} exceeds four times the available cores",
                self.num_threads
            );
        }

        Ok(())
    }

    /// Load a configuration from a `.json` or `.toml` file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CwBoostError::config(format!("Failed to read config file: {}", e)))?;

        let config: BoostingConfig = match extension(path) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| CwBoostError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| CwBoostError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(CwBoostError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a `.json` or `.toml` file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| CwBoostError::config(format!("Failed to serialize to JSON: {}", e)))?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| CwBoostError::config(format!("Failed to serialize to TOML: {}", e)))?,
            _ => {
                return Err(CwBoostError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| CwBoostError::config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Override fields from `CWBOOST_LEARNING_RATE`, `CWBOOST_MAX_ITERATIONS`
    /// and `CWBOOST_TRACE`, then validate.
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("LEARNING_RATE") {
            self.learning_rate = val
                .parse()
                .map_err(|_| CwBoostError::config(format!("Invalid {ENV_PREFIX}LEARNING_RATE")))?;
        }
        if let Some(val) = env_var("MAX_ITERATIONS") {
            self.max_iterations = val
                .parse()
                .map_err(|_| CwBoostError::config(format!("Invalid {ENV_PREFIX}MAX_ITERATIONS")))?;
        }
        if let Some(val) = env_var("TRACE") {
            self.trace = val
                .parse()
                .map_err(|_| CwBoostError::config(format!("Invalid {ENV_PREFIX}TRACE")))?;
        }
        self.validate()
    }

    /// Number of threads candidate fitting will use.
    pub fn effective_num_threads(&self) -> usize {
        if !self.parallel_fit {
            1
        } else if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Human-readable stop policy.
    pub fn stop_policy(&self) -> &'static str {
        if self.stop_if_all_stoppers {
            "all stoppers"
        } else {
            "any stopper"
        }
    }

    /// Flat parameter listing used in summaries.
    pub fn as_parameter_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("learning_rate".to_string(), self.learning_rate.to_string());
        map.insert("max_iterations".to_string(), self.max_iterations.to_string());
        map.insert("use_offset".to_string(), self.use_offset.to_string());
        map.insert("stop_policy".to_string(), self.stop_policy().to_string());
        map.insert("parallel_fit".to_string(), self.parallel_fit.to_string());
        map.insert("num_threads".to_string(), self.num_threads.to_string());
        map.insert("trace".to_string(), self.trace.to_string());
        map
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

/// Fluent builder for [`BoostingConfig`].
#[derive(Debug)]
pub struct BoostingConfigBuilder {
    config: BoostingConfig,
    validation_errors: Vec<String>,
}

impl BoostingConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        BoostingConfigBuilder {
            config: BoostingConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the learning rate.
    pub fn learning_rate(mut self, rate: f64) -> Self {
        if !(rate > 0.0 && rate <= 1.0) {
            self.validation_errors
                .push(format!("learning_rate must be in (0.0, 1.0], got {}", rate));
        }
        self.config.learning_rate = rate;
        self
    }

    /// Set the iteration bound.
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.max_iterations = iterations;
        self
    }

    /// Start from the loss' constant initializer (`true`) or from zero.
    pub fn use_offset(mut self, use_offset: bool) -> Self {
        self.config.use_offset = use_offset;
        self
    }

    /// Require every stopper to fire before training stops.
    pub fn stop_if_all_stoppers(mut self, all: bool) -> Self {
        self.config.stop_if_all_stoppers = all;
        self
    }

    /// Fit candidates in parallel.
    pub fn parallel_fit(mut self, parallel: bool) -> Self {
        self.config.parallel_fit = parallel;
        self
    }

    /// Use a dedicated thread pool of this size.
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Print a status line every `every` iterations.
    pub fn trace(mut self, every: usize) -> Self {
        self.config.trace = every;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<BoostingConfig> {
        if !self.validation_errors.is_empty() {
            return Err(CwBoostError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for BoostingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
