//! Core infrastructure module for cwboost.
//!
//! This module provides the foundational pieces shared by every other module:
//!
//! - [`types`]: Type aliases and small enumerations
//! - [`constants`]: Configuration defaults
//! - [`error`]: Error type and `Result` alias
//! - [`linalg`]: SPD solver, penalty matrices and degrees of freedom
//! - [`stats`]: Mean, quantiles and one-dimensional line search
//!
//! ```rust
//! use cwboost::core::{
//!     constants::DEFAULT_LEARNING_RATE,
//!     error::{CwBoostError, Result},
//!     types::EngineState,
//! };
//!
//! let learning_rate = DEFAULT_LEARNING_RATE;
//! assert!(learning_rate > 0.0);
//! assert_eq!(EngineState::default(), EngineState::Uninitialized);
//! ```

pub mod constants;
pub mod error;
pub mod linalg;
pub mod stats;
pub mod types;

pub use constants::*;
pub use error::{CwBoostError, Result};
pub use types::*;

use std::sync::atomic::{AtomicBool, Ordering};

static CORE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize logging for the library.
///
/// Installs an `env_logger` that honours `RUST_LOG` and defaults to `info`.
/// Calling this more than once is harmless.
pub fn initialize_core() -> Result<()> {
    if CORE_INITIALIZED.load(Ordering::Acquire) {
        return Ok(());
    }

    // Another logger may already be installed by the host application.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    CORE_INITIALIZED.store(true, Ordering::Release);
    log::debug!("cwboost {} initialized", CWBOOST_VERSION);
    Ok(())
}

/// Check if [`initialize_core`] has run.
pub fn is_core_initialized() -> bool {
    CORE_INITIALIZED.load(Ordering::Acquire)
}
