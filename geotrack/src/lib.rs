//! geotrack - location acquisition with push and watchdog-poll delivery.
//!
//! The [`tracking`] module holds the state machine. It gates on permissions
//! and device settings, subscribes to a location provider, and backs the
//! subscription with a periodic last-known-position poll. Platform services
//! plug in through collaborator traits; [`simulation`] provides in-memory
//! ones.

pub mod config;
pub mod logging;
pub mod simulation;
pub mod tracking;
