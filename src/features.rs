//! Feature extraction and symptom labeling.
//!
//! Every field of a [`FeatureVector`] is scaled into `[0, 1]` so the linear
//! sequence scorer can weigh them against each other.

use serde::{Deserialize, Serialize};

use crate::models::{Observation, SymptomDefinition};

/// Named model inputs, declared in lexicographic order of their names.
///
/// The derived `Ord` is the tie-break order used by the tree learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Caffeine,
    ExerciseDone,
    ExerciseIntensity,
    MealCount,
    RecoveryScore,
    SleepHours,
    StressLevel,
    WaterIntake,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::Caffeine,
        Feature::ExerciseDone,
        Feature::ExerciseIntensity,
        Feature::MealCount,
        Feature::RecoveryScore,
        Feature::SleepHours,
        Feature::StressLevel,
        Feature::WaterIntake,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Caffeine => "caffeine",
            Feature::ExerciseDone => "exercise_done",
            Feature::ExerciseIntensity => "exercise_intensity",
            Feature::MealCount => "meal_count",
            Feature::RecoveryScore => "recovery_score",
            Feature::SleepHours => "sleep_hours",
            Feature::StressLevel => "stress_level",
            Feature::WaterIntake => "water_intake",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

const MAX_SLEEP_HOURS: f64 = 12.0;
const MAX_STRESS: f64 = 10.0;
const MAX_RECOVERY: f64 = 10.0;
const MAX_WATER: f64 = 10.0;
const MAX_MEALS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sleep_hours: f64,
    pub stress_level: f64,
    pub caffeine: f64,
    pub exercise_done: f64,
    pub exercise_intensity: f64,
    pub recovery_score: f64,
    pub water_intake: f64,
    pub meal_count: f64,
}

impl FeatureVector {
    pub fn from_observation(observation: &Observation) -> Self {
        let exercise_intensity = if observation.exercise {
            observation
                .exercise_intensity
                .map(|intensity| intensity.encoded())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        Self {
            sleep_hours: scale(observation.sleep_hours, MAX_SLEEP_HOURS),
            stress_level: scale(observation.stress_level as f64, MAX_STRESS),
            caffeine: flag(observation.caffeine),
            exercise_done: flag(observation.exercise),
            exercise_intensity,
            recovery_score: scale(observation.recovery_score as f64, MAX_RECOVERY),
            water_intake: scale(observation.water_intake, MAX_WATER),
            meal_count: scale(observation.meal_count as f64, MAX_MEALS),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Caffeine => self.caffeine,
            Feature::ExerciseDone => self.exercise_done,
            Feature::ExerciseIntensity => self.exercise_intensity,
            Feature::MealCount => self.meal_count,
            Feature::RecoveryScore => self.recovery_score,
            Feature::SleepHours => self.sleep_hours,
            Feature::StressLevel => self.stress_level,
            Feature::WaterIntake => self.water_intake,
        }
    }

    /// Values in [`Feature::ALL`] order.
    pub fn to_array(&self) -> [f64; 8] {
        Feature::ALL.map(|feature| self.get(feature))
    }
}

fn scale(value: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: bool,
}

/// Decides whether a day's free-text symptom list counts as the target symptom.
pub trait SymptomLabeler {
    fn label(&self, symptoms: &[String]) -> bool;
}

impl<F> SymptomLabeler for F
where
    F: Fn(&[String]) -> bool,
{
    fn label(&self, symptoms: &[String]) -> bool {
        self(symptoms)
    }
}

/// Case-insensitive keyword substring matching.
///
/// Broad keywords can tag unrelated text (a "head" keyword matches
/// "headache" and "forehead rash" alike); that behavior is kept as is.
#[derive(Debug, Clone)]
pub struct KeywordLabeler {
    keywords: Vec<String>,
}

impl KeywordLabeler {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn for_symptom(definition: &SymptomDefinition) -> Self {
        let mut labeler = Self::new(&definition.keywords);
        if labeler.keywords.is_empty() {
            labeler.keywords.push(definition.name.to_lowercase());
        }
        labeler
    }
}

impl SymptomLabeler for KeywordLabeler {
    fn label(&self, symptoms: &[String]) -> bool {
        symptoms.iter().any(|text| {
            let text = text.to_lowercase();
            self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
        })
    }
}

pub fn training_examples(
    observations: &[Observation],
    labeler: &dyn SymptomLabeler,
) -> Vec<TrainingExample> {
    observations
        .iter()
        .map(|observation| TrainingExample {
            features: FeatureVector::from_observation(observation),
            label: labeler.label(&observation.symptoms),
        })
        .collect()
}

/// Symptom severity in `[0, 100]` for one observation: 0 when the symptom is
/// absent, otherwise `severity * 20` clipped to 100.
pub fn severity_value(observation: &Observation, labeler: &dyn SymptomLabeler) -> f64 {
    if labeler.label(&observation.symptoms) {
        (observation.severity.max(0) as f64 * 20.0).min(100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn features_are_normalized() {
        let mut observation = Observation::baseline(day());
        observation.sleep_hours = 30.0;
        observation.stress_level = 10;
        observation.exercise = true;
        observation.exercise_intensity = Some(crate::models::ExerciseIntensity::Medium);

        let vector = FeatureVector::from_observation(&observation);
        assert_eq!(vector.sleep_hours, 1.0);
        assert_eq!(vector.stress_level, 1.0);
        assert_eq!(vector.exercise_intensity, 0.5);
        assert!(vector.to_array().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn intensity_ignored_without_exercise() {
        let mut observation = Observation::baseline(day());
        observation.exercise_intensity = Some(crate::models::ExerciseIntensity::High);
        let vector = FeatureVector::from_observation(&observation);
        assert_eq!(vector.exercise_intensity, 0.0);
    }

    #[test]
    fn keyword_matching_is_substring_and_case_insensitive() {
        let labeler = KeywordLabeler::new(["reflux", "heartburn"]);
        assert!(labeler.label(&["Bad HEARTBURN after dinner".to_string()]));
        assert!(!labeler.label(&["headache".to_string()]));
        assert!(!labeler.label(&[]));
    }

    #[test]
    fn closures_act_as_labelers() {
        let labeler = |symptoms: &[String]| symptoms.len() > 1;
        let examples = training_examples(&[Observation::baseline(day())], &labeler);
        assert!(!examples[0].label);
    }

    #[test]
    fn severity_value_scales_and_clips() {
        let labeler = KeywordLabeler::new(["headache"]);
        let mut observation = Observation::baseline(day());
        observation.symptoms = vec!["mild headache".to_string()];
        observation.severity = 3;
        assert_eq!(severity_value(&observation, &labeler), 60.0);
        observation.severity = 9;
        assert_eq!(severity_value(&observation, &labeler), 100.0);
        observation.symptoms.clear();
        assert_eq!(severity_value(&observation, &labeler), 0.0);
    }

    #[test]
    fn feature_order_is_lexicographic() {
        let names: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
