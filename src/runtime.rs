//! Runtime glue that wires configuration, progress tracking, fatal error
//! capture, telemetry, and runner orchestration.

pub mod config;
pub mod fatal;
pub mod progress;
pub mod runner;
pub mod telemetry;
