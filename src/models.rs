use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseIntensity {
    Low,
    Medium,
    High,
}

impl ExerciseIntensity {
    /// Encoded value used in feature vectors: 0, 0.5, 1.
    pub fn encoded(self) -> f64 {
        match self {
            ExerciseIntensity::Low => 0.0,
            ExerciseIntensity::Medium => 0.5,
            ExerciseIntensity::High => 1.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(ExerciseIntensity::Low),
            "medium" => Some(ExerciseIntensity::Medium),
            "high" => Some(ExerciseIntensity::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseIntensity::Low => "low",
            ExerciseIntensity::Medium => "medium",
            ExerciseIntensity::High => "high",
        }
    }
}

/// One day's self-reported record, as supplied by the observation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observed_on: NaiveDate,
    pub sleep_hours: f64,
    pub stress_level: i32,
    pub caffeine: bool,
    pub exercise: bool,
    pub exercise_intensity: Option<ExerciseIntensity>,
    pub recovery_score: i32,
    pub water_intake: f64,
    pub meal_count: i32,
    pub symptoms: Vec<String>,
    pub severity: i32,
}

impl Observation {
    /// A plain day with no symptoms, used as a baseline by seeds and tests.
    pub fn baseline(observed_on: NaiveDate) -> Self {
        Self {
            observed_on,
            sleep_hours: 7.5,
            stress_level: 4,
            caffeine: false,
            exercise: false,
            exercise_intensity: None,
            recovery_score: 6,
            water_intake: 6.0,
            meal_count: 3,
            symptoms: Vec::new(),
            severity: 1,
        }
    }

    pub fn skipped_meal(&self) -> bool {
        self.meal_count < 3
    }
}

/// A tracked symptom and the keywords that tag an observation with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomDefinition {
    pub name: String,
    pub keywords: Vec<String>,
}

impl SymptomDefinition {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn key(&self) -> String {
        symptom_key(&self.name)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.key() == symptom_key(name)
    }
}

/// Lookup key for a symptom name: trimmed and lower-cased.
pub fn symptom_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    Increases,
    Decreases,
}

/// Human-readable explanation attached to a risk prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub name: String,
    pub impact: f64,
    pub direction: ImpactDirection,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub symptom: String,
    pub horizon_days: u32,
    /// Percentage in [0, 100].
    pub probability: f64,
    pub confidence: Confidence,
    pub factors: Vec<ContributingFactor>,
    pub recommendation: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Outcome of fitting one symptom model.
///
/// `metrics` are computed on the training data itself and are not held-out
/// estimates of generalization accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub symptom: String,
    pub sample_count: usize,
    pub positive_count: usize,
    pub tree_count: usize,
    pub metrics: ModelMetrics,
    pub coefficients: BTreeMap<String, f64>,
    pub in_sample: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    Pearson,
    Spearman,
    MutualInformation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub factor_a: String,
    pub factor_b: String,
    pub coefficient: f64,
    pub estimator: Estimator,
    pub pearson: f64,
    pub spearman: f64,
    pub mutual_information: f64,
    pub p_value: f64,
    pub strength: Strength,
    pub direction: Direction,
    pub sample_size: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    pub correlations: Vec<CorrelationResult>,
    pub habit_correlations: Vec<CorrelationResult>,
    pub matrix: CorrelationMatrix,
    pub insights: Vec<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub raw: f64,
    pub trend: f64,
    pub seasonal: f64,
    pub residual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    /// Predicted severity in [0, 100].
    pub predicted_value: f64,
    pub confidence: f64,
    pub contributing_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub strength: Strength,
    pub relative_change: f64,
    pub period_days: Option<f64>,
}

impl TrendAnalysis {
    pub fn flat() -> Self {
        Self {
            direction: TrendDirection::Stable,
            strength: Strength::Weak,
            relative_change: 0.0,
            period_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub symptom: String,
    pub decomposition: Vec<TimeSeriesPoint>,
    pub points: Vec<ForecastPoint>,
    pub trend: TrendAnalysis,
    pub residual_std: f64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WarningSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningSeverity::Low => "low",
            WarningSeverity::Medium => "medium",
            WarningSeverity::High => "high",
            WarningSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Medium,
    High,
}

/// A habit pattern found in the recent observation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub level: RiskLevel,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarning {
    pub symptom: String,
    pub severity: WarningSeverity,
    /// Percentage in [0, 100].
    pub probability: f64,
    pub timeframe: String,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}
