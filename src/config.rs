use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::SymptomDefinition;
use crate::risk::TrainingOptions;
use crate::timeseries::{ForecastOptions, MAX_HORIZON_DAYS};
use crate::warnings::WarningOptions;

pub const CONFIG_ENV: &str = "HEALTH_RISK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub tree_count: usize,
    /// Fixed seed for bootstrap sampling and weight initialization.
    pub seed: Option<u64>,
    pub min_training_samples: usize,
    pub min_decomposition_points: usize,
    pub forecast_horizon_days: usize,
    pub smoothing_alpha: f64,
    pub warning_threshold: f64,
    pub warning_days: usize,
    pub sequence_window_days: usize,
    pub sequence_alert_probability: f64,
    pub symptoms: Vec<SymptomDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tree_count: 12,
            seed: None,
            min_training_samples: 10,
            min_decomposition_points: 14,
            forecast_horizon_days: 7,
            smoothing_alpha: 0.3,
            warning_threshold: 60.0,
            warning_days: 3,
            sequence_window_days: 5,
            sequence_alert_probability: 0.7,
            symptoms: default_symptoms(),
        }
    }
}

pub fn default_symptoms() -> Vec<SymptomDefinition> {
    vec![
        SymptomDefinition::new("headache", &["headache", "migraine"]),
        SymptomDefinition::new("reflux", &["reflux", "heartburn", "acid"]),
        SymptomDefinition::new("fatigue", &["fatigue", "tired", "exhausted"]),
        SymptomDefinition::new("bloating", &["bloat", "gas"]),
        SymptomDefinition::new("nausea", &["nausea", "nauseous", "queasy"]),
        SymptomDefinition::new("insomnia", &["insomnia", "couldn't sleep", "restless"]),
    ]
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Explicit path first, then `HEALTH_RISK_CONFIG`, then defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(value) => Self::load(Path::new(&value)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tree_count == 0 {
            return Err(ConfigError::Invalid {
                field: "tree_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "smoothing_alpha",
                reason: format!("{} is outside (0, 1]", self.smoothing_alpha),
            });
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.forecast_horizon_days) {
            return Err(ConfigError::Invalid {
                field: "forecast_horizon_days",
                reason: format!(
                    "{} is outside [1, {MAX_HORIZON_DAYS}]",
                    self.forecast_horizon_days
                ),
            });
        }
        if !(0.0..=100.0).contains(&self.warning_threshold) {
            return Err(ConfigError::Invalid {
                field: "warning_threshold",
                reason: format!("{} is outside [0, 100]", self.warning_threshold),
            });
        }
        if !(0.0..=1.0).contains(&self.sequence_alert_probability) {
            return Err(ConfigError::Invalid {
                field: "sequence_alert_probability",
                reason: format!("{} is outside [0, 1]", self.sequence_alert_probability),
            });
        }
        if self.symptoms.iter().any(|symptom| symptom.name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "symptoms",
                reason: "symptom names must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            tree_count: self.tree_count,
            min_samples: self.min_training_samples,
        }
    }

    pub fn forecast_options(&self) -> ForecastOptions {
        ForecastOptions {
            min_points: self.min_decomposition_points,
            horizon_days: self.forecast_horizon_days,
            alpha: self.smoothing_alpha,
        }
    }

    pub fn warning_options(&self) -> WarningOptions {
        WarningOptions {
            forecast: self.forecast_options(),
            threshold: self.warning_threshold,
            warning_days: self.warning_days,
            sequence_window_days: self.sequence_window_days,
            sequence_alert_probability: self.sequence_alert_probability,
        }
    }

    pub fn symptom(&self, name: &str) -> Option<&SymptomDefinition> {
        self.symptoms
            .iter()
            .find(|symptom| symptom.matches(name))
    }
}
