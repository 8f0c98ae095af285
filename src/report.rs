use std::fmt::Write;

use chrono::NaiveDate;

use health_risk_engine::models::{
    CorrelationAnalysis, EarlyWarning, ForecastResult, RiskFactor, TrainingReport,
};

pub struct ReportInput<'a> {
    pub since: NaiveDate,
    pub observation_count: usize,
    pub warnings: &'a [EarlyWarning],
    pub forecasts: &'a [ForecastResult],
    pub correlations: &'a CorrelationAnalysis,
    pub training: &'a [TrainingReport],
    pub risk_factors: &'a [RiskFactor],
}

pub fn build_report(input: &ReportInput<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Health Risk Report");
    let _ = writeln!(
        output,
        "Generated from {} observations since {}",
        input.observation_count, input.since
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Early Warnings");

    if input.warnings.is_empty() {
        let _ = writeln!(output, "No warnings for the coming days.");
    } else {
        for warning in input.warnings.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) {}: {:.0}% likely, confidence {:.0}%",
                warning.symptom,
                warning.severity.as_str(),
                warning.timeframe,
                warning.probability,
                warning.confidence * 100.0
            );
            for recommendation in warning.recommendations.iter() {
                let _ = writeln!(output, "  - {recommendation}");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Risk Factors");

    if input.risk_factors.is_empty() {
        let _ = writeln!(output, "No habit patterns of concern in the last week.");
    } else {
        for factor in input.risk_factors.iter() {
            let _ = writeln!(output, "- {}: {}", factor.name, factor.description);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Symptom Trends");

    for forecast in input.forecasts.iter() {
        match &forecast.message {
            Some(message) => {
                let _ = writeln!(output, "- {}: {}", forecast.symptom, message);
            }
            None => {
                let peak = forecast
                    .points
                    .iter()
                    .map(|point| point.predicted_value)
                    .fold(0.0f64, f64::max);
                let _ = writeln!(
                    output,
                    "- {}: {:?} ({:?}, {:+.0}%), {}-day peak {:.0}",
                    forecast.symptom,
                    forecast.trend.direction,
                    forecast.trend.strength,
                    forecast.trend.relative_change * 100.0,
                    forecast.points.len(),
                    peak
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Habit Correlations");

    if input.correlations.insights.is_empty() {
        let _ = writeln!(output, "No strong, high-confidence correlations yet.");
    } else {
        for insight in input.correlations.insights.iter() {
            let _ = writeln!(output, "- {insight}");
        }
    }
    for result in input.correlations.correlations.iter().take(5) {
        let _ = writeln!(
            output,
            "- {} vs {}: {:+.2} ({:?}, {:?}, p ≈ {})",
            result.factor_a,
            result.factor_b,
            result.coefficient,
            result.strength,
            result.confidence,
            result.p_value
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Model Fit");
    let _ = writeln!(
        output,
        "Measured on the training data itself; not a held-out accuracy estimate."
    );

    for report in input.training.iter() {
        match &report.message {
            Some(message) => {
                let _ = writeln!(output, "- {}: {}", report.symptom, message);
            }
            None => {
                let _ = writeln!(
                    output,
                    "- {}: accuracy {:.2}, precision {:.2}, recall {:.2}, F1 {:.2} \
                     ({} of {} days positive)",
                    report.symptom,
                    report.metrics.accuracy,
                    report.metrics.precision,
                    report.metrics.recall,
                    report.metrics.f1,
                    report.positive_count,
                    report.sample_count
                );
            }
        }
    }

    output
}
