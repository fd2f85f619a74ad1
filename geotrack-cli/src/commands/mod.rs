//! CLI command implementations.
//!
//! - [`config`] - Configuration management (init, show, path)
//! - [`track`] - Run a tracking session against the simulated device

pub mod config;
pub mod track;
