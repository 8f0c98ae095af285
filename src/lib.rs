//! Risk estimation and forecasting over daily self-reported health
//! observations.

pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod features;
pub mod feedback;
pub mod forest;
pub mod models;
pub mod risk;
pub mod rng;
pub mod sequence;
pub mod timeseries;
pub mod tree;
pub mod warnings;

pub use config::EngineConfig;
pub use engine::HealthEngine;
pub use error::{ConfigError, EngineError};
pub use risk::RiskEstimator;
