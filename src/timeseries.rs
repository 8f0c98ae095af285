//! Trend/weekly-seasonal decomposition and short-horizon forecasting of a
//! per-symptom daily severity series.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::features::{severity_value, KeywordLabeler, SymptomLabeler};
use crate::models::{
    ForecastPoint, ForecastResult, Observation, Strength, SymptomDefinition, TimeSeriesPoint,
    TrendAnalysis, TrendDirection,
};

/// Longest forecast produced; later days would sit at the confidence floor.
pub const MAX_HORIZON_DAYS: usize = 90;
const MAX_TREND_WINDOW: usize = 7;
const TREND_COMPARISON_DAYS: usize = 14;
const CONFIDENCE_FLOOR: f64 = 0.1;
const CONFIDENCE_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct ForecastOptions {
    pub min_points: usize,
    pub horizon_days: usize,
    pub alpha: f64,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            min_points: 14,
            horizon_days: 7,
            alpha: 0.3,
        }
    }
}

/// One value per calendar day from the first to the last observation.
/// Days without a record are 0; several records on one day keep the maximum.
pub fn daily_series(
    observations: &[Observation],
    labeler: &dyn SymptomLabeler,
) -> Vec<(NaiveDate, f64)> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for observation in observations {
        let value = severity_value(observation, labeler);
        let entry = by_day.entry(observation.observed_on).or_insert(0.0);
        *entry = entry.max(value);
    }

    let (Some((&first, _)), Some((&last, _))) = (by_day.first_key_value(), by_day.last_key_value())
    else {
        return Vec::new();
    };

    let mut series = Vec::with_capacity((last - first).num_days() as usize + 1);
    let mut day = first;
    while day <= last {
        series.push((day, by_day.get(&day).copied().unwrap_or(0.0)));
        day += Duration::days(1);
    }
    series
}

/// Splits `series` into trend, day-of-week seasonal and residual parts.
///
/// Below `min_points` the raw values are returned as the trend with zero
/// seasonal and residual components.
pub fn decompose(series: &[(NaiveDate, f64)], min_points: usize) -> Vec<TimeSeriesPoint> {
    if series.len() < min_points.max(1) {
        return series
            .iter()
            .map(|&(date, raw)| TimeSeriesPoint {
                date,
                raw,
                trend: raw,
                seasonal: 0.0,
                residual: 0.0,
            })
            .collect();
    }

    let raw: Vec<f64> = series.iter().map(|&(_, value)| value).collect();
    let trend = trailing_average(&raw, trend_window(raw.len()));

    let mut sums = [0.0f64; 7];
    let mut counts = [0usize; 7];
    for (index, &(date, _)) in series.iter().enumerate() {
        let weekday = weekday_index(date);
        sums[weekday] += raw[index] - trend[index];
        counts[weekday] += 1;
    }
    let weekday_effect: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&sum, &count)| if count == 0 { 0.0 } else { sum / count as f64 })
        .collect();

    series
        .iter()
        .enumerate()
        .map(|(index, &(date, value))| {
            let seasonal = weekday_effect[weekday_index(date)];
            TimeSeriesPoint {
                date,
                raw: value,
                trend: trend[index],
                seasonal,
                residual: value - trend[index] - seasonal,
            }
        })
        .collect()
}

pub fn trend_window(length: usize) -> usize {
    MAX_TREND_WINDOW.min(length / 3).max(1)
}

/// Mean of the last `window` values ending at each index. The first
/// `window - 1` entries copy the raw value so nothing looks ahead.
fn trailing_average(values: &[f64], window: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            if index + 1 < window {
                value
            } else {
                let slice = &values[index + 1 - window..=index];
                slice.iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

pub fn exponential_smoothing(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(values.len());
    let mut level = match values.first() {
        Some(&first) => first,
        None => return smoothed,
    };
    smoothed.push(level);
    for &value in &values[1..] {
        level = alpha * value + (1.0 - alpha) * level;
        smoothed.push(level);
    }
    smoothed
}

/// Confidence for the forecast `index` days past the first forecast day.
pub fn forecast_confidence(index: usize) -> f64 {
    (1.0 - CONFIDENCE_STEP * index as f64).max(CONFIDENCE_FLOOR)
}

pub fn forecast(
    observations: &[Observation],
    symptom: &SymptomDefinition,
    options: ForecastOptions,
) -> ForecastResult {
    let labeler = KeywordLabeler::for_symptom(symptom);
    let series = daily_series(observations, &labeler);
    forecast_series(&symptom.name, &series, options)
}

pub fn forecast_series(
    symptom: &str,
    series: &[(NaiveDate, f64)],
    options: ForecastOptions,
) -> ForecastResult {
    let required = options.min_points.max(2);
    let decomposition = decompose(series, required);

    if series.len() < required {
        let error = EngineError::InsufficientData {
            context: format!("{symptom} forecast"),
            required,
            actual: series.len(),
        };
        warn!(%error, "skipping forecast");
        return ForecastResult {
            symptom: symptom.to_string(),
            decomposition,
            points: Vec::new(),
            trend: TrendAnalysis::flat(),
            residual_std: 0.0,
            message: Some(error.to_string()),
        };
    }

    let raw: Vec<f64> = series.iter().map(|&(_, value)| value).collect();
    let smoothed = exponential_smoothing(&raw, options.alpha);
    let residual_std = (decomposition.iter().map(|p| p.residual.powi(2)).sum::<f64>()
        / decomposition.len() as f64)
        .sqrt();

    let horizon_days = options.horizon_days.min(MAX_HORIZON_DAYS);
    let points = extrapolate(series, &smoothed, horizon_days);
    let trend = analyze_trend(&smoothed);
    debug!(
        symptom,
        points = points.len(),
        direction = ?trend.direction,
        residual_std,
        "forecast complete"
    );

    ForecastResult {
        symptom: symptom.to_string(),
        decomposition,
        points,
        trend,
        residual_std,
        message: None,
    }
}

fn extrapolate(
    series: &[(NaiveDate, f64)],
    smoothed: &[f64],
    horizon_days: usize,
) -> Vec<ForecastPoint> {
    let (Some(&(last_date, _)), Some(&level)) = (series.last(), smoothed.last()) else {
        return Vec::new();
    };
    let slope = if smoothed.len() >= 2 {
        level - smoothed[smoothed.len() - 2]
    } else {
        0.0
    };

    let mut weekday_sums = [0.0f64; 7];
    let mut weekday_counts = [0usize; 7];
    for &(date, value) in series {
        weekday_sums[weekday_index(date)] += value;
        weekday_counts[weekday_index(date)] += 1;
    }
    let overall_mean = series.iter().map(|&(_, v)| v).sum::<f64>() / series.len() as f64;
    let recent: Vec<f64> = series.iter().rev().take(3).map(|&(_, v)| v).collect();
    let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;

    (0..horizon_days)
        .map(|index| {
            let days_ahead = index + 1;
            let date = last_date + Duration::days(days_ahead as i64);
            let weekday = weekday_index(date);
            let projected = level + slope * days_ahead as f64;
            let weekday_average = (weekday_counts[weekday] > 0)
                .then(|| weekday_sums[weekday] / weekday_counts[weekday] as f64);
            let blended = match weekday_average {
                Some(average) => 0.5 * projected + 0.5 * average,
                None => projected,
            };

            let mut factors = Vec::new();
            if slope > 0.5 {
                factors.push("Severity has been trending upward".to_string());
            } else if slope < -0.5 {
                factors.push("Severity has been trending downward".to_string());
            }
            if let Some(average) = weekday_average {
                if average > 0.0 && average > overall_mean * 1.2 {
                    factors.push(format!(
                        "{} is usually a worse day (average {:.0})",
                        weekday_name(date.weekday()),
                        average
                    ));
                }
            }
            if recent_mean > 50.0 {
                factors.push("Recent days were elevated".to_string());
            }
            if factors.is_empty() {
                factors.push("Stable pattern".to_string());
            }

            ForecastPoint {
                date,
                predicted_value: clip_percent(blended),
                confidence: forecast_confidence(index),
                contributing_factors: factors,
            }
        })
        .collect()
}

fn clip_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Compares the last 14 smoothed values to the 14 before them.
pub fn analyze_trend(smoothed: &[f64]) -> TrendAnalysis {
    let period_days = estimate_period(smoothed);
    if smoothed.len() < TREND_COMPARISON_DAYS * 2 {
        return TrendAnalysis {
            period_days,
            ..TrendAnalysis::flat()
        };
    }

    let n = smoothed.len();
    let recent = &smoothed[n - TREND_COMPARISON_DAYS..];
    let prior = &smoothed[n - 2 * TREND_COMPARISON_DAYS..n - TREND_COMPARISON_DAYS];
    let recent_mean = recent.iter().sum::<f64>() / recent.len() as f64;
    let prior_mean = prior.iter().sum::<f64>() / prior.len() as f64;

    let relative_change = if prior_mean.abs() < f64::EPSILON {
        if recent_mean.abs() < f64::EPSILON {
            0.0
        } else {
            1.0
        }
    } else {
        (recent_mean - prior_mean) / prior_mean.abs()
    };

    let direction = if relative_change > 0.1 {
        TrendDirection::Increasing
    } else if relative_change < -0.1 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    let strength = match relative_change.abs() {
        change if change > 0.2 => Strength::Strong,
        change if change > 0.1 => Strength::Moderate,
        _ => Strength::Weak,
    };

    TrendAnalysis {
        direction,
        strength,
        relative_change,
        period_days,
    }
}

/// Mean spacing between local maxima of the smoothed series.
pub fn estimate_period(smoothed: &[f64]) -> Option<f64> {
    if smoothed.len() < 3 {
        return None;
    }
    let peaks: Vec<usize> = (1..smoothed.len() - 1)
        .filter(|&i| smoothed[i] > smoothed[i - 1] && smoothed[i] >= smoothed[i + 1])
        .collect();
    if peaks.len() < 2 {
        return None;
    }
    let spacing: usize = peaks.windows(2).map(|pair| pair[1] - pair[0]).sum();
    Some(spacing as f64 / (peaks.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        // a Monday
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (start() + Duration::days(i as i64), v))
            .collect()
    }

    fn weekly_pattern(weeks: usize) -> Vec<f64> {
        (0..weeks * 7)
            .map(|i| if i % 7 == 4 { 80.0 } else { 10.0 + (i % 3) as f64 })
            .collect()
    }

    #[test]
    fn components_sum_to_raw() {
        let input = series(&weekly_pattern(5));
        for point in decompose(&input, 14) {
            let total = point.trend + point.seasonal + point.residual;
            assert!((total - point.raw).abs() < 1e-6);
        }
    }

    #[test]
    fn forecast_projects_smoothed_level_and_blends_weekday_mean() {
        // Mon..Mon; smoothing at 0.5 ends on level 50 with slope 30
        let input = series(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 40.0, 80.0]);
        let options = ForecastOptions {
            min_points: 2,
            horizon_days: 6,
            alpha: 0.5,
        };
        let result = forecast_series("headache", &input, options);

        let expected = [
            (Weekday::Tue, 40.0),  // (80 + 0) / 2
            (Weekday::Wed, 55.0),  // (110 + 0) / 2
            (Weekday::Thu, 70.0),  // (140 + 0) / 2
            (Weekday::Fri, 85.0),  // (170 + 0) / 2
            (Weekday::Sat, 100.0), // (200 + 0) / 2
            (Weekday::Sun, 100.0), // (230 + 40) / 2, clipped
        ];
        assert_eq!(result.points.len(), expected.len());
        for (point, (weekday, value)) in result.points.iter().zip(expected) {
            assert_eq!(point.date.weekday(), weekday);
            assert!((point.predicted_value - value).abs() < 1e-9, "{point:?}");
        }
        assert!(result.points[0]
            .contributing_factors
            .contains(&"Severity has been trending upward".to_string()));
    }

    #[test]
    fn oversized_horizon_is_capped() {
        let options = ForecastOptions {
            horizon_days: usize::MAX,
            ..ForecastOptions::default()
        };
        let result = forecast_series("headache", &series(&weekly_pattern(3)), options);
        assert_eq!(result.points.len(), MAX_HORIZON_DAYS);
    }

    #[test]
    fn trend_is_trailing_mean() {
        let input = series(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 40.0, 80.0]);
        // window = min(7, 8 / 3) = 2
        assert_eq!(trend_window(input.len()), 2);
        let expected = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 20.0, 60.0];
        for (point, value) in decompose(&input, 2).iter().zip(expected) {
            assert!((point.trend - value).abs() < 1e-9, "{point:?}");
        }
        assert_eq!(
            exponential_smoothing(&[0.0, 0.0, 40.0, 80.0], 0.5),
            vec![0.0, 0.0, 20.0, 50.0]
        );
    }

    #[test]
    fn leading_trend_copies_raw() {
        let values = weekly_pattern(3);
        let input = series(&values);
        let window = trend_window(values.len());
        let points = decompose(&input, 14);
        for point in points.iter().take(window - 1) {
            assert_eq!(point.trend, point.raw);
        }
    }

    #[test]
    fn short_series_passes_through() {
        let input = series(&[10.0, 40.0, 0.0]);
        let result = forecast_series("headache", &input, ForecastOptions::default());
        assert!(result.points.is_empty());
        assert!(result.message.is_some());
        for point in &result.decomposition {
            assert_eq!(point.trend, point.raw);
            assert_eq!(point.seasonal, 0.0);
            assert_eq!(point.residual, 0.0);
        }
    }

    #[test]
    fn weekday_peak_shows_in_seasonal() {
        let input = series(&weekly_pattern(6));
        let points = decompose(&input, 14);
        let friday = points.iter().find(|p| p.date.weekday() == Weekday::Fri).unwrap();
        let monday = points.iter().find(|p| p.date.weekday() == Weekday::Mon).unwrap();
        assert!(friday.seasonal > monday.seasonal);
    }

    #[test]
    fn forecast_covers_horizon_with_decaying_confidence() {
        let input = series(&weekly_pattern(4));
        let result = forecast_series("headache", &input, ForecastOptions::default());
        assert_eq!(result.points.len(), 7);
        assert_eq!(result.points[0].confidence, 1.0);
        for pair in result.points.windows(2) {
            assert!(pair[1].confidence < pair[0].confidence);
            assert_eq!(pair[1].date, pair[0].date + Duration::days(1));
        }
        assert!(result
            .points
            .iter()
            .all(|p| (0.0..=100.0).contains(&p.predicted_value)));
        assert!(result.points.iter().all(|p| !p.contributing_factors.is_empty()));
    }

    #[test]
    fn confidence_floor() {
        assert_eq!(forecast_confidence(0), 1.0);
        assert!((forecast_confidence(6) - 0.4).abs() < 1e-12);
        assert_eq!(forecast_confidence(9), CONFIDENCE_FLOOR);
        assert_eq!(forecast_confidence(30), CONFIDENCE_FLOOR);
    }

    #[test]
    fn forecast_clips_runaway_growth() {
        let values: Vec<f64> = (0..20).map(|i| if i < 18 { 0.0 } else { 100.0 }).collect();
        let result = forecast_series("reflux", &series(&values), ForecastOptions::default());
        assert!(result.points.iter().all(|p| p.predicted_value <= 100.0));
    }

    #[test]
    fn rising_series_is_increasing() {
        let values: Vec<f64> = (0..40).map(|i| i as f64 * 2.0).collect();
        let smoothed = exponential_smoothing(&values, 0.3);
        let trend = analyze_trend(&smoothed);
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.strength, Strength::Strong);
    }

    #[test]
    fn flat_series_is_stable() {
        let smoothed = exponential_smoothing(&[20.0; 30], 0.3);
        let trend = analyze_trend(&smoothed);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.strength, Strength::Weak);
    }

    #[test]
    fn period_from_peaks() {
        let smoothed: Vec<f64> = (0..28).map(|i| if i % 7 == 3 { 5.0 } else { 1.0 }).collect();
        assert_eq!(estimate_period(&smoothed), Some(7.0));
        assert_eq!(estimate_period(&[1.0, 2.0]), None);
    }

    #[test]
    fn daily_series_fills_gaps_and_takes_max() {
        let labeler = KeywordLabeler::new(["headache"]);
        let mut first = Observation::baseline(start());
        first.symptoms = vec!["headache".to_string()];
        first.severity = 2;
        let mut same_day = first.clone();
        same_day.severity = 4;
        let later = Observation::baseline(start() + Duration::days(3));

        let series = daily_series(&[later, first, same_day], &labeler);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].1, 80.0);
        assert_eq!(series[1].1, 0.0);
        assert!(daily_series(&[], &labeler).is_empty());
    }
}
