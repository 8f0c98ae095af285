//! Recency-weighted linear scorer over the last few days.
//!
//! Weights are small random values drawn once per fit. This is a weak
//! baseline next to the forest, not a statistically trained model.

use serde::{Deserialize, Serialize};

use crate::features::{Feature, FeatureVector};
use crate::models::Confidence;
use crate::rng::RandomSource;

/// Number of trailing days that enter the score.
pub const SCORED_DAYS: usize = 3;

/// Features are in `[0, 1]`, so a day scores at most `8 * WEIGHT_SPREAD = 2`
/// and the probability stays below `logistic(2) ≈ 0.88`.
const WEIGHT_SPREAD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencePrediction {
    /// In `(0, 1)`.
    pub probability: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePredictor {
    weights: [f64; 8],
}

impl SequencePredictor {
    pub fn initialize(rng: &mut dyn RandomSource) -> Self {
        let mut weights = [0.0; 8];
        for weight in weights.iter_mut() {
            *weight = rng.next_range(-WEIGHT_SPREAD, WEIGHT_SPREAD);
        }
        Self { weights }
    }

    pub fn with_weights(weights: [f64; 8]) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &[f64; 8] {
        &self.weights
    }

    pub fn coefficients(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().zip(self.weights.iter().copied())
    }

    pub fn predict(&self, window: &[FeatureVector]) -> SequencePrediction {
        if window.is_empty() {
            return SequencePrediction {
                probability: 0.5,
                confidence: Confidence::Low,
            };
        }

        let start = window.len().saturating_sub(SCORED_DAYS);
        let scored = &window[start..];
        let mut total = 0.0;
        let mut total_weight = 0.0;
        for (position, vector) in scored.iter().enumerate() {
            let weight = recency_weight(position);
            total += weight * self.score(vector);
            total_weight += weight;
        }

        SequencePrediction {
            probability: logistic(total / total_weight),
            confidence: confidence_for_window(window.len()),
        }
    }

    fn score(&self, vector: &FeatureVector) -> f64 {
        vector
            .to_array()
            .iter()
            .zip(self.weights.iter())
            .map(|(value, weight)| value * weight)
            .sum()
    }
}

/// Later days count more: position 0 is the oldest scored day.
pub fn recency_weight(position: usize) -> f64 {
    (position + 1) as f64
}

pub fn confidence_for_window(length: usize) -> Confidence {
    if length > 7 {
        Confidence::High
    } else if length > 3 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

pub fn logistic(x: f64) -> f64 {
    if !x.is_finite() {
        return if x > 0.0 { 1.0 } else if x < 0.0 { 0.0 } else { 0.5 };
    }
    1.0 / (1.0 + (-x).exp())
}
