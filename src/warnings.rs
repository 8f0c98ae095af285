//! Early warnings from forecasts, a recent-habit scan and a short-window
//! sequence classifier.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::features::FeatureVector;
use crate::models::{
    Confidence, EarlyWarning, ForecastPoint, Observation, RiskFactor, RiskLevel, SymptomDefinition,
    WarningSeverity,
};
use crate::rng::RandomSource;
use crate::sequence::SequencePredictor;
use crate::timeseries::{self, ForecastOptions};

pub const SCAN_DAYS: usize = 7;

#[derive(Debug, Clone, Copy)]
pub struct WarningOptions {
    pub forecast: ForecastOptions,
    /// Forecast values above this become warnings.
    pub threshold: f64,
    /// How many forecast days are checked.
    pub warning_days: usize,
    pub sequence_window_days: usize,
    pub sequence_alert_probability: f64,
}

impl Default for WarningOptions {
    fn default() -> Self {
        Self {
            forecast: ForecastOptions::default(),
            threshold: 60.0,
            warning_days: 3,
            sequence_window_days: 5,
            sequence_alert_probability: 0.7,
        }
    }
}

pub fn generate(
    observations: &[Observation],
    symptoms: &[SymptomDefinition],
    options: WarningOptions,
    rng: &mut dyn RandomSource,
    generated_at: DateTime<Utc>,
) -> Vec<EarlyWarning> {
    generate_with(
        observations,
        symptoms,
        options,
        |_| SequencePredictor::initialize(rng),
        generated_at,
    )
}

/// Same pass as [`generate`], with the short-window classifier for each
/// symptom supplied by `predictor_for`.
pub fn generate_with(
    observations: &[Observation],
    symptoms: &[SymptomDefinition],
    options: WarningOptions,
    mut predictor_for: impl FnMut(&SymptomDefinition) -> SequencePredictor,
    generated_at: DateTime<Utc>,
) -> Vec<EarlyWarning> {
    let mut ordered: Vec<&Observation> = observations.iter().collect();
    ordered.sort_by_key(|observation| observation.observed_on);

    let factors = scan_risk_factors(observations);
    let window_start = ordered.len().saturating_sub(options.sequence_window_days);
    let window: Vec<FeatureVector> = ordered[window_start..]
        .iter()
        .map(|observation| FeatureVector::from_observation(observation))
        .collect();

    let mut warnings = Vec::new();
    for symptom in symptoms {
        let forecast = timeseries::forecast(observations, symptom, options.forecast);
        let days = forecast.points.len().min(options.warning_days);
        warnings.extend(warnings_from_forecast(
            &symptom.name,
            &forecast.points[..days],
            &factors,
            options.threshold,
            generated_at,
        ));

        let predictor = predictor_for(symptom);
        if let Some(warning) = sequence_warning(
            &symptom.name,
            &predictor,
            &window,
            &factors,
            options.sequence_alert_probability,
            generated_at,
        ) {
            warnings.push(warning);
        }
    }

    sort_by_probability(&mut warnings);
    info!(
        warnings = warnings.len(),
        risk_factors = factors.len(),
        "generated early warnings"
    );
    warnings
}

/// One warning per forecast day whose value exceeds `threshold`, ordered by
/// probability.
pub fn warnings_from_forecast(
    symptom: &str,
    points: &[ForecastPoint],
    factors: &[RiskFactor],
    threshold: f64,
    generated_at: DateTime<Utc>,
) -> Vec<EarlyWarning> {
    let mut warnings: Vec<EarlyWarning> = points
        .iter()
        .enumerate()
        .filter(|(_, point)| point.predicted_value > threshold)
        .map(|(index, point)| {
            let severity = severity_for(point.predicted_value);
            let recommendations = dedup(
                forecast_recommendations(severity)
                    .iter()
                    .map(|text| text.to_string())
                    .chain(factors.iter().map(|factor| factor.recommendation.clone())),
            );
            debug!(symptom, day = index + 1, value = point.predicted_value, "forecast warning");
            EarlyWarning {
                symptom: symptom.to_string(),
                severity,
                probability: point.predicted_value,
                timeframe: timeframe_label(index),
                risk_factors: factor_names(factors),
                recommendations,
                confidence: point.confidence,
                generated_at,
            }
        })
        .collect();
    sort_by_probability(&mut warnings);
    warnings
}

pub fn sequence_warning(
    symptom: &str,
    predictor: &SequencePredictor,
    window: &[FeatureVector],
    factors: &[RiskFactor],
    alert_probability: f64,
    generated_at: DateTime<Utc>,
) -> Option<EarlyWarning> {
    let prediction = predictor.predict(window);
    if prediction.probability <= alert_probability {
        return None;
    }

    let probability = (prediction.probability * 100.0).clamp(0.0, 100.0);
    let severity = severity_for(probability);
    let recommendations = dedup(
        forecast_recommendations(severity)
            .iter()
            .map(|text| text.to_string())
            .chain(factors.iter().map(|factor| factor.recommendation.clone())),
    );

    Some(EarlyWarning {
        symptom: symptom.to_string(),
        severity,
        probability,
        timeframe: "next 24 hours".to_string(),
        risk_factors: factor_names(factors),
        recommendations,
        confidence: confidence_score(prediction.confidence),
        generated_at,
    })
}

/// Rule-based habit scan over the last seven observed days.
pub fn scan_risk_factors(observations: &[Observation]) -> Vec<RiskFactor> {
    let mut ordered: Vec<&Observation> = observations.iter().collect();
    ordered.sort_by_key(|observation| observation.observed_on);
    let recent = &ordered[ordered.len().saturating_sub(SCAN_DAYS)..];
    if recent.is_empty() {
        return Vec::new();
    }

    let mut factors = Vec::new();

    let sleep = average(recent, |o| o.sleep_hours);
    if sleep < 6.0 {
        factors.push(RiskFactor {
            name: "Short sleep".to_string(),
            level: RiskLevel::High,
            description: format!("Averaging {sleep:.1} hours of sleep over the last week"),
            recommendation: "Aim for at least 7 hours of sleep tonight".to_string(),
        });
    }

    let stress = average(recent, |o| o.stress_level as f64);
    if stress > 7.0 {
        factors.push(RiskFactor {
            name: "High stress".to_string(),
            level: RiskLevel::High,
            description: format!("Average stress level {stress:.1} out of 10"),
            recommendation: "Block out time for a walk or breathing exercises".to_string(),
        });
    }

    let caffeine = share(recent, |o| o.caffeine);
    if caffeine > 0.8 {
        factors.push(RiskFactor {
            name: "Daily caffeine".to_string(),
            level: RiskLevel::Medium,
            description: format!("Caffeine on {:.0}% of recent days", caffeine * 100.0),
            recommendation: "Cut back on caffeine, especially after noon".to_string(),
        });
    }

    let exercise = share(recent, |o| o.exercise);
    if exercise < 0.3 {
        factors.push(RiskFactor {
            name: "Low activity".to_string(),
            level: RiskLevel::Medium,
            description: format!("Exercised on {:.0}% of recent days", exercise * 100.0),
            recommendation: "Add light exercise on most days".to_string(),
        });
    }

    let skipped = share(recent, Observation::skipped_meal);
    if skipped > 0.3 {
        factors.push(RiskFactor {
            name: "Skipped meals".to_string(),
            level: RiskLevel::Medium,
            description: format!("Skipped meals on {:.0}% of recent days", skipped * 100.0),
            recommendation: "Keep regular meal times and avoid skipping meals".to_string(),
        });
    }

    factors
}

fn average(days: &[&Observation], value: impl Fn(&Observation) -> f64) -> f64 {
    days.iter().map(|&observation| value(observation)).sum::<f64>() / days.len() as f64
}

fn share(days: &[&Observation], test: impl Fn(&Observation) -> bool) -> f64 {
    days.iter().filter(|&&observation| test(observation)).count() as f64 / days.len() as f64
}

pub fn severity_for(value: f64) -> WarningSeverity {
    if value > 80.0 {
        WarningSeverity::Critical
    } else if value > 70.0 {
        WarningSeverity::High
    } else if value > 60.0 {
        WarningSeverity::Medium
    } else {
        WarningSeverity::Low
    }
}

pub fn timeframe_label(index: usize) -> String {
    match index {
        0 => "tomorrow".to_string(),
        n => format!("in {} days", n + 1),
    }
}

fn forecast_recommendations(severity: WarningSeverity) -> &'static [&'static str] {
    match severity {
        WarningSeverity::Critical => &[
            "Plan a lighter day and keep your usual remedies at hand",
            "Contact your healthcare provider if symptoms escalate",
        ],
        WarningSeverity::High => &["Take preventive measures today and avoid known triggers"],
        WarningSeverity::Medium | WarningSeverity::Low => {
            &["Monitor your symptoms and log how you feel"]
        }
    }
}

fn confidence_score(confidence: Confidence) -> f64 {
    match confidence {
        Confidence::Low => 0.4,
        Confidence::Medium => 0.6,
        Confidence::High => 0.8,
    }
}

fn factor_names(factors: &[RiskFactor]) -> Vec<String> {
    let mut ordered: Vec<&RiskFactor> = factors.iter().collect();
    // high before medium, otherwise scan order
    ordered.sort_by_key(|factor| match factor.level {
        RiskLevel::High => 0,
        RiskLevel::Medium => 1,
    });
    ordered.into_iter().map(|factor| factor.name.clone()).collect()
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

fn sort_by_probability(warnings: &mut [EarlyWarning]) {
    warnings.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;
    use chrono::{Duration, NaiveDate};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap() + Duration::days(offset)
    }

    fn point(offset: i64, value: f64) -> ForecastPoint {
        ForecastPoint {
            date: day(offset),
            predicted_value: value,
            confidence: timeseries::forecast_confidence(offset as usize),
            contributing_factors: vec!["Stable pattern".to_string()],
        }
    }

    fn stressed_week() -> Vec<Observation> {
        (0..7)
            .map(|i| {
                let mut observation = Observation::baseline(day(i));
                observation.sleep_hours = 5.0;
                observation.stress_level = 9;
                observation.caffeine = true;
                observation.meal_count = 2;
                observation
            })
            .collect()
    }

    #[test]
    fn forecast_threshold_scenario() {
        let points = vec![point(0, 45.0), point(1, 65.0), point(2, 82.0)];
        let warnings = warnings_from_forecast("headache", &points, &[], 60.0, Utc::now());

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].probability, 82.0);
        assert_eq!(warnings[0].severity, WarningSeverity::Critical);
        assert_eq!(warnings[0].timeframe, "in 3 days");
        assert_eq!(warnings[1].probability, 65.0);
        assert_eq!(warnings[1].severity, WarningSeverity::Medium);
        assert_eq!(warnings[1].timeframe, "in 2 days");
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(severity_for(60.0), WarningSeverity::Low);
        assert_eq!(severity_for(60.5), WarningSeverity::Medium);
        assert_eq!(severity_for(70.5), WarningSeverity::High);
        assert_eq!(severity_for(80.5), WarningSeverity::Critical);
    }

    #[test]
    fn scan_flags_recent_habits() {
        let factors = scan_risk_factors(&stressed_week());
        let names: Vec<&str> = factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Short sleep", "High stress", "Daily caffeine", "Low activity", "Skipped meals"]
        );
        assert!(scan_risk_factors(&[]).is_empty());
    }

    #[test]
    fn scan_only_looks_at_last_week() {
        let mut history = stressed_week();
        for i in 7..14 {
            let mut observation = Observation::baseline(day(i));
            observation.exercise = true;
            history.push(observation);
        }
        assert!(scan_risk_factors(&history).is_empty());
    }

    #[test]
    fn recommendations_are_deduplicated() {
        let factors = scan_risk_factors(&stressed_week());
        let mut duplicated = factors.clone();
        duplicated.extend(factors.iter().cloned());
        let warnings =
            warnings_from_forecast("reflux", &[point(0, 75.0)], &duplicated, 60.0, Utc::now());
        let recommendations = &warnings[0].recommendations;
        let mut unique = recommendations.clone();
        unique.dedup();
        assert_eq!(recommendations.len(), unique.len());
        assert_eq!(recommendations.len(), 1 + factors.len());
        assert_eq!(warnings[0].timeframe, "tomorrow");
        assert_eq!(warnings[0].risk_factors[0], "Short sleep");
    }

    #[test]
    fn sequence_classifier_flags_next_day() {
        let predictor = SequencePredictor::with_weights([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0, 0.0]);
        let window: Vec<FeatureVector> = stressed_week()
            .iter()
            .map(FeatureVector::from_observation)
            .collect();
        let warning =
            sequence_warning("headache", &predictor, &window, &[], 0.7, Utc::now()).unwrap();
        assert_eq!(warning.timeframe, "next 24 hours");
        assert!(warning.probability > 70.0);

        let calm = SequencePredictor::with_weights([0.0; 8]);
        assert!(sequence_warning("headache", &calm, &window, &[], 0.7, Utc::now()).is_none());
    }

    #[test]
    fn generate_keeps_every_warning_sorted() {
        let mut history = Vec::new();
        for i in 0..28 {
            let mut observation = Observation::baseline(day(i));
            if i >= 14 {
                observation.symptoms = vec!["headache and reflux".to_string()];
                observation.severity = 5;
            }
            history.push(observation);
        }
        let symptoms = vec![
            SymptomDefinition::new("headache", &["headache"]),
            SymptomDefinition::new("reflux", &["reflux"]),
        ];
        let warnings = generate(
            &history,
            &symptoms,
            WarningOptions::default(),
            &mut SeededRng::new(4),
            Utc::now(),
        );

        assert!(warnings.iter().any(|w| w.symptom == "headache"));
        assert!(warnings.iter().any(|w| w.symptom == "reflux"));
        for pair in warnings.windows(2) {
            assert!(pair[0].probability >= pair[1].probability);
        }
    }

    #[test]
    fn generate_raises_next_day_alert_from_sequence() {
        let symptoms = vec![
            SymptomDefinition::new("headache", &["headache"]),
            SymptomDefinition::new("reflux", &["reflux"]),
        ];
        let warnings = generate_with(
            &stressed_week(),
            &symptoms,
            WarningOptions::default(),
            |symptom| {
                let stress = if symptom.name == "headache" { 5.0 } else { 0.0 };
                SequencePredictor::with_weights([0.0, 0.0, 0.0, 0.0, 0.0, 0.0, stress, 0.0])
            },
            Utc::now(),
        );

        let alerts: Vec<&EarlyWarning> = warnings
            .iter()
            .filter(|w| w.timeframe == "next 24 hours")
            .collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symptom, "headache");
        assert!(alerts[0].probability > 70.0);
        assert_eq!(alerts[0].risk_factors[0], "Short sleep");
    }

    #[test]
    fn empty_history_produces_no_warnings() {
        let symptoms = vec![SymptomDefinition::new("headache", &["headache"])];
        let warnings = generate(
            &[],
            &symptoms,
            WarningOptions::default(),
            &mut SeededRng::new(4),
            Utc::now(),
        );
        assert!(warnings.is_empty());
    }
}
