use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::features::{training_examples, FeatureVector, KeywordLabeler};
use crate::forest::Forest;
use crate::models::{
    symptom_key, Confidence, ContributingFactor, ImpactDirection, ModelMetrics, Observation,
    RiskPrediction, SymptomDefinition, TrainingReport,
};
use crate::rng::RandomSource;
use crate::sequence::SequencePredictor;

pub const POOR_SLEEP_HOURS: f64 = 6.0;
pub const HIGH_STRESS_LEVEL: i32 = 7;
pub const LOW_WATER_UNITS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymptomModel {
    Trained {
        forest: Forest,
        sequence: SequencePredictor,
    },
    /// Too few samples to fit; predictions fall back to a neutral prior.
    Insufficient { sample_count: usize, required: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingOptions {
    pub tree_count: usize,
    pub min_samples: usize,
}

/// Per-symptom models refit from the full history on every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskEstimator {
    models: BTreeMap<String, SymptomModel>,
    reports: Vec<TrainingReport>,
}

impl RiskEstimator {
    pub fn train(
        symptoms: &[SymptomDefinition],
        observations: &[Observation],
        options: TrainingOptions,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let mut estimator = Self::default();
        for symptom in symptoms {
            let (model, report) = train_symptom(symptom, observations, options, rng);
            estimator.models.insert(symptom.key(), model);
            estimator.reports.push(report);
        }
        info!(
            symptoms = estimator.models.len(),
            observations = observations.len(),
            "trained risk models"
        );
        estimator
    }

    pub fn reports(&self) -> &[TrainingReport] {
        &self.reports
    }

    pub fn model(&self, symptom: &str) -> Option<&SymptomModel> {
        self.models.get(&symptom_key(symptom))
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn predict(
        &self,
        observation: &Observation,
        symptom: &str,
        horizon_days: u32,
    ) -> RiskPrediction {
        let Some(model) = self.model(symptom) else {
            let error = EngineError::UnknownSymptom {
                symptom: symptom.to_string(),
            };
            warn!(%error, "prediction requested without a model");
            return RiskPrediction {
                symptom: symptom.to_string(),
                horizon_days,
                probability: 0.0,
                confidence: Confidence::Low,
                factors: Vec::new(),
                recommendation: String::from("No model available for this symptom yet."),
                message: Some(error.to_string()),
            };
        };

        let factors = attribute_factors(observation);
        match model {
            SymptomModel::Insufficient {
                sample_count,
                required,
            } => {
                let error = EngineError::InsufficientData {
                    context: format!("{symptom} model"),
                    required: *required,
                    actual: *sample_count,
                };
                RiskPrediction {
                    symptom: symptom.to_string(),
                    horizon_days,
                    probability: 50.0,
                    confidence: Confidence::Low,
                    factors,
                    recommendation: recommendation_for(50.0).to_string(),
                    message: Some(error.to_string()),
                }
            }
            SymptomModel::Trained { forest, sequence } => {
                let vector = FeatureVector::from_observation(observation);
                let forest_prediction = forest.predict(&vector);
                let sequence_prediction = sequence.predict(&[vector]);
                let mean = (forest_prediction.probability + sequence_prediction.probability) / 2.0;
                let probability = (mean * 100.0).clamp(0.0, 100.0);
                let confidence = combine_confidence(
                    forest_prediction.confidence,
                    sequence_prediction.confidence,
                );
                debug!(
                    symptom,
                    forest = forest_prediction.probability,
                    sequence = sequence_prediction.probability,
                    probability,
                    "combined risk prediction"
                );

                RiskPrediction {
                    symptom: symptom.to_string(),
                    horizon_days,
                    probability,
                    confidence,
                    factors,
                    recommendation: recommendation_for(probability).to_string(),
                    message: None,
                }
            }
        }
    }
}

fn train_symptom(
    symptom: &SymptomDefinition,
    observations: &[Observation],
    options: TrainingOptions,
    rng: &mut dyn RandomSource,
) -> (SymptomModel, TrainingReport) {
    let labeler = KeywordLabeler::for_symptom(symptom);
    let examples = training_examples(observations, &labeler);
    let positive_count = examples.iter().filter(|example| example.label).count();

    if examples.len() < options.min_samples {
        let error = EngineError::InsufficientData {
            context: format!("{} model", symptom.name),
            required: options.min_samples,
            actual: examples.len(),
        };
        warn!(%error, "skipping model fit");
        let report = TrainingReport {
            symptom: symptom.name.clone(),
            sample_count: examples.len(),
            positive_count,
            tree_count: 0,
            metrics: ModelMetrics::default(),
            coefficients: BTreeMap::new(),
            in_sample: true,
            message: Some(error.to_string()),
        };
        let model = SymptomModel::Insufficient {
            sample_count: examples.len(),
            required: options.min_samples,
        };
        return (model, report);
    }

    let (forest, metrics) = Forest::train(&examples, options.tree_count, rng);
    let sequence = SequencePredictor::initialize(rng);
    let coefficients = sequence
        .coefficients()
        .map(|(feature, weight)| (feature.name().to_string(), weight))
        .collect();

    debug!(
        symptom = %symptom.name,
        samples = examples.len(),
        positives = positive_count,
        accuracy = metrics.accuracy,
        "fitted symptom model"
    );

    let report = TrainingReport {
        symptom: symptom.name.clone(),
        sample_count: examples.len(),
        positive_count,
        tree_count: forest.tree_count(),
        metrics,
        coefficients,
        in_sample: true,
        message: None,
    };
    (SymptomModel::Trained { forest, sequence }, report)
}

/// High only when both agree on high; medium when either reaches medium.
pub fn combine_confidence(a: Confidence, b: Confidence) -> Confidence {
    if a == Confidence::High && b == Confidence::High {
        Confidence::High
    } else if a >= Confidence::Medium || b >= Confidence::Medium {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Fixed rule table over the raw observation, independent of the models.
pub fn attribute_factors(observation: &Observation) -> Vec<ContributingFactor> {
    let mut factors = Vec::new();
    let poor_sleep = observation.sleep_hours < POOR_SLEEP_HOURS;

    if poor_sleep {
        factors.push(ContributingFactor {
            name: "Poor Sleep".to_string(),
            impact: 0.3,
            direction: ImpactDirection::Increases,
            description: format!(
                "Slept {:.1} hours, under the {POOR_SLEEP_HOURS} hour minimum",
                observation.sleep_hours
            ),
        });
    }

    if observation.caffeine && poor_sleep {
        factors.push(ContributingFactor {
            name: "Caffeine + Poor Sleep".to_string(),
            impact: 0.45,
            direction: ImpactDirection::Increases,
            description: "Caffeine on a short night compounds the sleep deficit".to_string(),
        });
    }

    if observation.stress_level > HIGH_STRESS_LEVEL {
        factors.push(ContributingFactor {
            name: "High Stress".to_string(),
            impact: 0.25,
            direction: ImpactDirection::Increases,
            description: format!("Stress level {} out of 10", observation.stress_level),
        });
    }

    if observation.water_intake < LOW_WATER_UNITS {
        factors.push(ContributingFactor {
            name: "Low Hydration".to_string(),
            impact: 0.15,
            direction: ImpactDirection::Increases,
            description: format!("Only {:.1} units of water", observation.water_intake),
        });
    }

    if observation.exercise {
        factors.push(ContributingFactor {
            name: "Exercise".to_string(),
            impact: -0.2,
            direction: ImpactDirection::Decreases,
            description: "Physical activity tends to be protective".to_string(),
        });
    }

    factors
}

pub fn recommendation_for(probability: f64) -> &'static str {
    if probability < 30.0 {
        "Low risk. Keep up your current routine."
    } else if probability < 60.0 {
        "Moderate risk. Watch your known triggers and prioritize rest and hydration."
    } else {
        "High risk. Take preventive steps today and avoid known triggers."
    }
}
