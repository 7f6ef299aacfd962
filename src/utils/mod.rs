//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup

mod config;
mod logging;

pub use config::{
    AnalysisConfig, ClientTypeConfig, Config, FitConfig, LoggingConfig, PriceMakerConfig,
    ReferenceWalk, SimulationConfig, TrainingConfig,
};
pub use logging::{level_for_verbosity, setup_logging};
