//! Habit/symptom correlation with three estimators and a coarse
//! significance bucket.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::features::{severity_value, KeywordLabeler};
use crate::models::{
    Confidence, CorrelationAnalysis, CorrelationMatrix, CorrelationResult, Direction, Estimator,
    Observation, Strength, SymptomDefinition,
};

pub const MIN_SAMPLES: usize = 2;
pub const MI_BINS: usize = 5;
/// Below this many samples the binned estimate is mostly noise and never
/// becomes the selected coefficient.
pub const MI_MIN_SAMPLES: usize = 2 * MI_BINS * MI_BINS;
const HABIT_PAIR_MIN_ABS: f64 = 0.1;
const VARIANCE_EPSILON: f64 = 1e-12;

/// Named daily habit series extracted from observations.
pub fn habit_series(observations: &[Observation]) -> Vec<(String, Vec<f64>)> {
    vec![
        column(observations, "sleep_hours", |o| o.sleep_hours),
        column(observations, "stress_level", |o| o.stress_level as f64),
        column(observations, "caffeine", |o| f64::from(u8::from(o.caffeine))),
        column(observations, "exercise", |o| f64::from(u8::from(o.exercise))),
        column(observations, "exercise_intensity", |o| {
            if o.exercise {
                o.exercise_intensity.map(|i| i.encoded()).unwrap_or(0.0)
            } else {
                0.0
            }
        }),
        column(observations, "recovery_score", |o| o.recovery_score as f64),
        column(observations, "water_intake", |o| o.water_intake),
        column(observations, "meal_count", |o| o.meal_count as f64),
    ]
}

fn column(
    observations: &[Observation],
    name: &str,
    value: impl Fn(&Observation) -> f64,
) -> (String, Vec<f64>) {
    (name.to_string(), observations.iter().map(value).collect())
}

pub fn symptom_series(
    observations: &[Observation],
    symptoms: &[SymptomDefinition],
) -> Vec<(String, Vec<f64>)> {
    symptoms
        .iter()
        .map(|symptom| {
            let labeler = KeywordLabeler::for_symptom(symptom);
            let values = observations
                .iter()
                .map(|observation| severity_value(observation, &labeler))
                .collect();
            (symptom.name.clone(), values)
        })
        .collect()
}

pub fn analyze(
    observations: &[Observation],
    symptoms: &[SymptomDefinition],
) -> CorrelationAnalysis {
    if observations.len() < MIN_SAMPLES {
        let error = EngineError::InsufficientData {
            context: "correlation analysis".to_string(),
            required: MIN_SAMPLES,
            actual: observations.len(),
        };
        warn!(%error, "returning empty correlation analysis");
        return CorrelationAnalysis {
            correlations: Vec::new(),
            habit_correlations: Vec::new(),
            matrix: CorrelationMatrix {
                labels: Vec::new(),
                values: Vec::new(),
            },
            insights: Vec::new(),
            message: Some(error.to_string()),
        };
    }

    let habits = habit_series(observations);
    let symptom_values = symptom_series(observations, symptoms);

    let mut correlations = Vec::with_capacity(habits.len() * symptom_values.len());
    for (habit, xs) in &habits {
        for (symptom, ys) in &symptom_values {
            correlations.push(correlate(habit, xs, symptom, ys));
        }
    }
    sort_by_strength(&mut correlations);

    let mut habit_correlations = Vec::new();
    for (i, (name_a, xs)) in habits.iter().enumerate() {
        for (name_b, ys) in habits.iter().skip(i + 1) {
            let result = correlate(name_a, xs, name_b, ys);
            if result.coefficient.abs() > HABIT_PAIR_MIN_ABS {
                habit_correlations.push(result);
            }
        }
    }
    sort_by_strength(&mut habit_correlations);

    let all_series: Vec<&(String, Vec<f64>)> = habits.iter().chain(symptom_values.iter()).collect();
    let matrix = correlation_matrix(&all_series);

    let insights = correlations
        .iter()
        .chain(habit_correlations.iter())
        .filter(|result| {
            result.strength == Strength::Strong && result.confidence == Confidence::High
        })
        .map(describe)
        .collect();

    debug!(
        pairs = correlations.len(),
        habit_pairs = habit_correlations.len(),
        "correlation analysis complete"
    );

    CorrelationAnalysis {
        correlations,
        habit_correlations,
        matrix,
        insights,
        message: None,
    }
}

/// Runs all three estimators and keeps the one with the largest magnitude.
///
/// The p-value always comes from the stronger of Pearson and Spearman: the
/// t-test only makes sense for a correlation coefficient. Mutual information
/// competes for selection once there are at least [`MI_MIN_SAMPLES`] points.
pub fn correlate(name_a: &str, xs: &[f64], name_b: &str, ys: &[f64]) -> CorrelationResult {
    let sample_size = xs.len().min(ys.len());
    let pearson_r = pearson(xs, ys);
    let spearman_r = spearman(xs, ys);
    let mi = signed_mutual_information(xs, ys, pearson_r, spearman_r);

    let mut estimator = Estimator::Pearson;
    let mut coefficient = pearson_r;
    if spearman_r.abs() > coefficient.abs() {
        estimator = Estimator::Spearman;
        coefficient = spearman_r;
    }
    let tested = coefficient;
    if sample_size >= MI_MIN_SAMPLES && mi.abs() > coefficient.abs() {
        estimator = Estimator::MutualInformation;
        coefficient = mi;
    }

    let p_value = if is_degenerate(xs, ys) {
        1.0
    } else {
        p_value(tested, sample_size)
    };

    CorrelationResult {
        factor_a: name_a.to_string(),
        factor_b: name_b.to_string(),
        coefficient,
        estimator,
        pearson: pearson_r,
        spearman: spearman_r,
        mutual_information: mi,
        p_value,
        strength: classify_strength(coefficient),
        direction: if coefficient < 0.0 {
            Direction::Negative
        } else {
            Direction::Positive
        },
        sample_size,
        confidence: confidence_for_p(p_value),
    }
}

fn is_degenerate(xs: &[f64], ys: &[f64]) -> bool {
    xs.len() != ys.len()
        || xs.len() < MIN_SAMPLES
        || variance(xs) < VARIANCE_EPSILON
        || variance(ys) < VARIANCE_EPSILON
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Pearson product-moment coefficient; 0 for degenerate input.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if is_degenerate(xs, ys) {
        return 0.0;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut covariance = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        covariance += (x - mx) * (y - my);
        sx += (x - mx).powi(2);
        sy += (y - my).powi(2);
    }
    let denominator = (sx * sy).sqrt();
    if denominator < VARIANCE_EPSILON || !denominator.is_finite() {
        return 0.0;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Pearson over average ranks.
pub fn spearman(xs: &[f64], ys: &[f64]) -> f64 {
    if is_degenerate(xs, ys) {
        return 0.0;
    }
    pearson(&ranks(xs), &ranks(ys))
}

/// 1-based ranks; ties share their average rank.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let average = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = average;
        }
        start = end + 1;
    }
    ranks
}

fn discretize(values: &[f64], bins: usize) -> Vec<usize> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = max - min;
    values
        .iter()
        .map(|v| {
            if width <= 0.0 || !width.is_finite() {
                0
            } else {
                (((v - min) / width * bins as f64) as usize).min(bins - 1)
            }
        })
        .collect()
}

fn entropy(counts: &[usize], total: f64) -> f64 {
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

/// Binned mutual information normalized by the smaller marginal entropy, in
/// `[0, 1]`.
///
/// The plug-in estimate is reduced by the Miller-Madow bias term
/// `(kx - 1)(ky - 1) / 2n` over occupied bins, so a handful of points that
/// each land in their own bin no longer score 1.
pub fn mutual_information(xs: &[f64], ys: &[f64], bins: usize) -> f64 {
    if is_degenerate(xs, ys) || bins < 2 {
        return 0.0;
    }
    let bx = discretize(xs, bins);
    let by = discretize(ys, bins);
    let total = xs.len() as f64;

    let mut joint = vec![vec![0usize; bins]; bins];
    let mut marginal_x = vec![0usize; bins];
    let mut marginal_y = vec![0usize; bins];
    for (&a, &b) in bx.iter().zip(&by) {
        joint[a][b] += 1;
        marginal_x[a] += 1;
        marginal_y[b] += 1;
    }

    let mut mi = 0.0;
    for (a, row) in joint.iter().enumerate() {
        for (b, &count) in row.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pxy = count as f64 / total;
            let px = marginal_x[a] as f64 / total;
            let py = marginal_y[b] as f64 / total;
            mi += pxy * (pxy / (px * py)).ln();
        }
    }

    let occupied_x = marginal_x.iter().filter(|&&c| c > 0).count() as f64;
    let occupied_y = marginal_y.iter().filter(|&&c| c > 0).count() as f64;
    let corrected = mi - (occupied_x - 1.0) * (occupied_y - 1.0) / (2.0 * total);

    let normalizer = entropy(&marginal_x, total).min(entropy(&marginal_y, total));
    if normalizer <= VARIANCE_EPSILON {
        return 0.0;
    }
    (corrected / normalizer).clamp(0.0, 1.0)
}

/// Mutual information carries no sign; borrow it from the rank estimators.
fn signed_mutual_information(xs: &[f64], ys: &[f64], pearson_r: f64, spearman_r: f64) -> f64 {
    let mi = mutual_information(xs, ys, MI_BINS);
    let sign_source = if pearson_r != 0.0 { pearson_r } else { spearman_r };
    if sign_source < 0.0 {
        -mi
    } else {
        mi
    }
}

/// Simplified two-sided p-value bucket from the t statistic.
pub fn p_value(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }
    let r_squared = r * r;
    let t = if r_squared >= 1.0 {
        f64::INFINITY
    } else {
        r * ((n as f64 - 2.0) / (1.0 - r_squared)).sqrt()
    };

    match t.abs() {
        t if t > 3.0 => 0.001,
        t if t > 2.5 => 0.01,
        t if t > 2.0 => 0.05,
        t if t > 1.5 => 0.1,
        _ => 0.2,
    }
}

pub fn classify_strength(coefficient: f64) -> Strength {
    let magnitude = coefficient.abs();
    if magnitude > 0.5 {
        Strength::Strong
    } else if magnitude > 0.3 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

pub fn confidence_for_p(p_value: f64) -> Confidence {
    if p_value < 0.01 {
        Confidence::High
    } else if p_value < 0.05 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn sort_by_strength(results: &mut [CorrelationResult]) {
    results.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(Ordering::Equal)
    });
}

fn correlation_matrix(series: &[&(String, Vec<f64>)]) -> CorrelationMatrix {
    let size = series.len();
    let mut values = vec![vec![0.0; size]; size];
    for i in 0..size {
        values[i][i] = 1.0;
        for j in (i + 1)..size {
            let (name_a, xs) = series[i];
            let (name_b, ys) = series[j];
            let coefficient = correlate(name_a, xs, name_b, ys).coefficient;
            values[i][j] = coefficient;
            values[j][i] = coefficient;
        }
    }
    CorrelationMatrix {
        labels: series.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}

fn describe(result: &CorrelationResult) -> String {
    let relation = match result.direction {
        Direction::Positive => "rises with",
        Direction::Negative => "falls as",
    };
    format!(
        "{} {} {} (r = {:.2}, p ≈ {}, n = {})",
        result.factor_b.replace('_', " "),
        relation,
        result.factor_a.replace('_', " "),
        result.coefficient,
        result.p_value,
        result.sample_size
    )
}
