use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use health_risk_engine::correlation::{correlate, pearson, spearman};
use health_risk_engine::features::FeatureVector;
use health_risk_engine::models::{Observation, SymptomDefinition};
use health_risk_engine::risk::{RiskEstimator, TrainingOptions};
use health_risk_engine::rng::SeededRng;
use health_risk_engine::sequence::SequencePredictor;
use health_risk_engine::timeseries::{decompose, forecast_series, ForecastOptions};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
}

fn dated(values: &[f64]) -> Vec<(NaiveDate, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (start() + Duration::days(i as i64), v))
        .collect()
}

fn observation_strategy() -> impl Strategy<Value = Observation> {
    (
        0.0f64..14.0,
        1i32..=10,
        any::<bool>(),
        any::<bool>(),
        1i32..=10,
        0.0f64..12.0,
        0i32..=6,
        any::<bool>(),
        1i32..=10,
    )
        .prop_map(
            |(sleep, stress, caffeine, exercise, recovery, water, meals, symptomatic, severity)| {
                let mut observation = Observation::baseline(start());
                observation.sleep_hours = sleep;
                observation.stress_level = stress;
                observation.caffeine = caffeine;
                observation.exercise = exercise;
                observation.recovery_score = recovery;
                observation.water_intake = water;
                observation.meal_count = meals;
                observation.severity = severity;
                if symptomatic {
                    observation.symptoms = vec!["headache".to_string()];
                }
                observation
            },
        )
}

proptest! {
    #[test]
    fn decomposition_components_sum_to_raw(values in prop::collection::vec(0.0f64..100.0, 0..90)) {
        for point in decompose(&dated(&values), 14) {
            prop_assert!((point.trend + point.seasonal + point.residual - point.raw).abs() < 1e-6);
        }
    }

    #[test]
    fn pearson_and_spearman_are_symmetric(
        pairs in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0), 0..60)
    ) {
        let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        prop_assert_eq!(pearson(&xs, &ys), pearson(&ys, &xs));
        prop_assert_eq!(spearman(&xs, &ys), spearman(&ys, &xs));
        let forward = correlate("a", &xs, "b", &ys);
        prop_assert!((-1.0..=1.0).contains(&forward.coefficient));
        prop_assert!(!forward.coefficient.is_nan());
        prop_assert!(forward.p_value > 0.0 && forward.p_value <= 1.0);
    }

    #[test]
    fn forecast_confidence_never_increases(values in prop::collection::vec(0.0f64..100.0, 14..60)) {
        let result = forecast_series("headache", &dated(&values), ForecastOptions::default());
        prop_assert_eq!(result.points.len(), 7);
        for pair in result.points.windows(2) {
            prop_assert!(pair[1].confidence <= pair[0].confidence);
        }
        for point in &result.points {
            prop_assert!((0.0..=100.0).contains(&point.predicted_value));
            prop_assert!(point.confidence > 0.0 && point.confidence <= 1.0);
        }
    }

    #[test]
    fn sequence_probability_is_bounded(
        seed in any::<u64>(),
        extreme in any::<bool>(),
        len in 0usize..10,
    ) {
        let predictor = SequencePredictor::initialize(&mut SeededRng::new(seed));
        let value = if extreme { 1.0 } else { 0.0 };
        let vector = FeatureVector {
            sleep_hours: value,
            stress_level: value,
            caffeine: value,
            exercise_done: value,
            exercise_intensity: value,
            recovery_score: value,
            water_intake: value,
            meal_count: value,
        };
        let window = vec![vector; len];
        let prediction = predictor.predict(&window);
        prop_assert!(prediction.probability > 0.0 && prediction.probability < 1.0);
    }

    #[test]
    fn risk_predictions_are_bounded_and_reproducible(
        history in prop::collection::vec(observation_strategy(), 0..40),
        scored in observation_strategy(),
        seed in any::<u64>(),
    ) {
        let symptoms = vec![SymptomDefinition::new("headache", &["headache"])];
        let options = TrainingOptions { tree_count: 6, min_samples: 10 };
        let a = RiskEstimator::train(&symptoms, &history, options, &mut SeededRng::new(seed));
        let b = RiskEstimator::train(&symptoms, &history, options, &mut SeededRng::new(seed));

        let first = a.predict(&scored, "headache", 1);
        let second = b.predict(&scored, "headache", 1);
        prop_assert!((0.0..=100.0).contains(&first.probability));
        prop_assert_eq!(first.probability.to_bits(), second.probability.to_bits());
    }
}
