//! Application Configuration Module
//!
//! Server, ingest and outlier settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `AQUASTAT_CONFIG` environment variable (path to TOML file)
//! 2. `aquastat.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is passed explicitly, never read from a global:
//!
//! ```ignore
//! let mut config = AppConfig::load();
//! config.apply_env_overrides();
//! let state = ApiState::new(store, Arc::new(config));
//! ```

mod app_config;
pub mod validation;

pub use app_config::*;
