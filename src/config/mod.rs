//! Monitor Configuration Module
//!
//! Provides deployment configuration loaded from TOML files, replacing all
//! hardcoded polling and detection constants with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `VIBROMON_CONFIG` environment variable (path to TOML file)
//! 2. `vibromon.toml` in the current working directory
//! 3. Built-in defaults (matching the original tuning)
//!
//! Components take their sections by value: `SerialConfig` feeds the
//! transport, `CollectorConfig` the polling loop, `BaselineConfig` /
//! `ThresholdConfig` / `DetectorConfig` the analysis side.

mod monitor_config;

pub use monitor_config::*;
