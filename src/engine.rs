//! Entry point tying the models together for symptom-aware callers.
//!
//! Every call works from the full history it is given; nothing is cached
//! between calls, so each analysis pays for a complete refit.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::EngineConfig;
use crate::correlation;
use crate::models::{
    CorrelationAnalysis, EarlyWarning, ForecastResult, Observation, SymptomDefinition,
};
use crate::risk::RiskEstimator;
use crate::rng::{RandomSource, SeededRng};
use crate::timeseries;
use crate::warnings;

pub struct HealthEngine {
    config: EngineConfig,
    rng: Box<dyn RandomSource + Send>,
}

impl HealthEngine {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SeededRng::new(seed),
            None => SeededRng::from_entropy(),
        };
        Self::with_rng(config, Box::new(rng))
    }

    pub fn with_rng(config: EngineConfig, rng: Box<dyn RandomSource + Send>) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fits one forest and sequence model per configured symptom.
    pub fn train(&mut self, observations: &[Observation]) -> RiskEstimator {
        RiskEstimator::train(
            &self.config.symptoms,
            observations,
            self.config.training_options(),
            self.rng.as_mut(),
        )
    }

    pub fn analyze_correlations(&self, observations: &[Observation]) -> CorrelationAnalysis {
        correlation::analyze(observations, &self.config.symptoms)
    }

    pub fn forecast(&self, observations: &[Observation], symptom: &str) -> ForecastResult {
        let definition = self.definition(symptom);
        timeseries::forecast(observations, &definition, self.config.forecast_options())
    }

    pub fn generate_warnings(&mut self, observations: &[Observation]) -> Vec<EarlyWarning> {
        self.generate_warnings_at(observations, Utc::now())
    }

    pub fn generate_warnings_at(
        &mut self,
        observations: &[Observation],
        generated_at: DateTime<Utc>,
    ) -> Vec<EarlyWarning> {
        let warnings = warnings::generate(
            observations,
            &self.config.symptoms,
            self.config.warning_options(),
            self.rng.as_mut(),
            generated_at,
        );
        info!(
            observations = observations.len(),
            warnings = warnings.len(),
            "warning pass complete"
        );
        warnings
    }

    /// Configured definition, or one that matches the name itself as keyword.
    fn definition(&self, symptom: &str) -> SymptomDefinition {
        self.config
            .symptom(symptom)
            .cloned()
            .unwrap_or_else(|| SymptomDefinition::new(symptom, &[symptom]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn history(days: i64) -> Vec<Observation> {
        let start = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        (0..days)
            .map(|i| {
                let mut observation = Observation::baseline(start + Duration::days(i));
                if i % 3 == 0 {
                    observation.sleep_hours = 5.0;
                    observation.caffeine = true;
                    observation.symptoms = vec!["migraine".to_string()];
                    observation.severity = 4;
                }
                observation
            })
            .collect()
    }

    fn seeded() -> HealthEngine {
        HealthEngine::new(EngineConfig {
            seed: Some(2026),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn seeded_engines_agree() {
        let data = history(30);
        let a = seeded().train(&data);
        let b = seeded().train(&data);
        assert_eq!(a, b);
        let scored = &data[0];
        assert_eq!(
            a.predict(scored, "headache", 1).probability,
            b.predict(scored, "headache", 1).probability
        );
    }

    #[test]
    fn forecast_uses_configured_keywords() {
        let result = seeded().forecast(&history(30), "headache");
        assert_eq!(result.points.len(), 7);
        assert!(result.decomposition.iter().any(|p| p.raw > 0.0));
    }

    #[test]
    fn unknown_symptom_forecast_matches_name() {
        let result = seeded().forecast(&history(30), "migraine");
        assert!(result.decomposition.iter().any(|p| p.raw > 0.0));
    }

    #[test]
    fn empty_history_is_total() {
        let mut engine = seeded();
        let estimator = engine.train(&[]);
        assert_eq!(estimator.reports().len(), engine.config().symptoms.len());
        assert!(engine.analyze_correlations(&[]).correlations.is_empty());
        assert!(engine.forecast(&[], "headache").points.is_empty());
        assert!(engine.generate_warnings(&[]).is_empty());
    }
}
