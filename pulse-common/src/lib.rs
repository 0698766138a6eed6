//! Pulse Common - shared configuration, validation and logging for the market
//! pulse crates.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod logging;
pub mod validation;

pub use config::{Config, IndicatorsConfig, ObservabilityConfig, SourceConfig};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, IndicatorsConfig};
    pub use crate::logging::{generate_run_id, init_logging};
    pub use crate::validation::{Validate, ValidationError};
}
