//! Sidewalk end-device CLI library
//!
//! Command-line parsing, configuration loading and the simulated device
//! scenario behind the `sid-end-device` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{ScenarioReport, SimulatedDevice};
pub use cli::{parse_link_mask, Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
