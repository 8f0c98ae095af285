//! Bagged ensemble of decision trees.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::{Feature, FeatureVector, TrainingExample};
use crate::models::{Confidence, ModelMetrics};
use crate::rng::RandomSource;
use crate::tree::{build_tree, TreeNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestPrediction {
    /// Fraction of trees voting positive, in `[0, 1]`.
    pub probability: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<TreeNode>,
}

impl Forest {
    /// Fits `tree_count` trees, each on its own bootstrap sample.
    ///
    /// The returned metrics are measured on `examples` themselves, so they
    /// overstate how well the forest generalizes.
    pub fn train(
        examples: &[TrainingExample],
        tree_count: usize,
        rng: &mut dyn RandomSource,
    ) -> (Self, ModelMetrics) {
        if examples.is_empty() {
            return (Self::default(), ModelMetrics::default());
        }

        let features: BTreeSet<Feature> = Feature::ALL.into_iter().collect();
        let mut trees = Vec::with_capacity(tree_count);
        for index in 0..tree_count {
            let sample = bootstrap_sample(examples, rng);
            let tree = build_tree(&sample, &features);
            debug!(
                tree = index,
                depth = tree.depth(),
                leaves = tree.leaf_count(),
                "trained tree"
            );
            trees.push(tree);
        }

        let forest = Self { trees };
        let metrics = forest.evaluate(examples);
        (forest, metrics)
    }

    pub fn from_trees(trees: Vec<TreeNode>) -> Self {
        Self { trees }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[TreeNode] {
        &self.trees
    }

    pub fn predict(&self, vector: &FeatureVector) -> ForestPrediction {
        let probability = if self.trees.is_empty() {
            0.0
        } else {
            let votes = self.trees.iter().filter(|tree| tree.predict(vector)).count();
            votes as f64 / self.trees.len() as f64
        };

        ForestPrediction {
            probability,
            confidence: confidence_for_tree_count(self.trees.len()),
        }
    }

    /// Accuracy, precision, recall and F1 at a 0.5 vote threshold.
    pub fn evaluate(&self, examples: &[TrainingExample]) -> ModelMetrics {
        if examples.is_empty() {
            return ModelMetrics::default();
        }

        let mut true_positive = 0usize;
        let mut false_positive = 0usize;
        let mut true_negative = 0usize;
        let mut false_negative = 0usize;

        for example in examples {
            let predicted = self.predict(&example.features).probability >= 0.5;
            match (predicted, example.label) {
                (true, true) => true_positive += 1,
                (true, false) => false_positive += 1,
                (false, false) => true_negative += 1,
                (false, true) => false_negative += 1,
            }
        }

        let accuracy = (true_positive + true_negative) as f64 / examples.len() as f64;
        let precision = ratio(true_positive, true_positive + false_positive);
        let recall = ratio(true_positive, true_positive + false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ModelMetrics {
            accuracy,
            precision,
            recall,
            f1,
        }
    }
}

/// Depends on tree count only, not on how much the trees agree.
pub fn confidence_for_tree_count(count: usize) -> Confidence {
    if count > 5 {
        Confidence::High
    } else if count > 3 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn bootstrap_sample(
    examples: &[TrainingExample],
    rng: &mut dyn RandomSource,
) -> Vec<TrainingExample> {
    (0..examples.len())
        .map(|_| examples[rng.next_index(examples.len())])
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;

    fn separable(n: usize) -> Vec<TrainingExample> {
        (0..n)
            .map(|i| {
                let positive = i % 2 == 0;
                TrainingExample {
                    features: FeatureVector {
                        caffeine: if positive { 1.0 } else { 0.0 },
                        sleep_hours: (if positive { 0.4 } else { 0.65 }) + (i % 3) as f64 * 0.01,
                        ..FeatureVector::default()
                    },
                    label: positive,
                }
            })
            .collect()
    }

    #[test]
    fn empty_training_set_yields_zero_probability() {
        let mut rng = SeededRng::new(1);
        let (forest, metrics) = Forest::train(&[], 10, &mut rng);
        assert_eq!(forest.tree_count(), 0);
        assert_eq!(metrics, ModelMetrics::default());
        let prediction = forest.predict(&FeatureVector::default());
        assert_eq!(prediction.probability, 0.0);
        assert_eq!(prediction.confidence, Confidence::Low);
    }

    #[test]
    fn confidence_steps_with_tree_count() {
        assert_eq!(confidence_for_tree_count(3), Confidence::Low);
        assert_eq!(confidence_for_tree_count(4), Confidence::Medium);
        assert_eq!(confidence_for_tree_count(5), Confidence::Medium);
        assert_eq!(confidence_for_tree_count(6), Confidence::High);
    }

    #[test]
    fn learns_separable_data() {
        let data = separable(20);
        let mut rng = SeededRng::new(11);
        let (forest, metrics) = Forest::train(&data, 12, &mut rng);
        assert_eq!(forest.tree_count(), 12);
        assert!(metrics.accuracy > 0.9);
        let positive = forest.predict(&data[0].features);
        let negative = forest.predict(&data[1].features);
        assert!(positive.probability > negative.probability);
        assert_eq!(positive.confidence, Confidence::High);
    }

    #[test]
    fn same_seed_same_forest() {
        let data = separable(16);
        let (a, _) = Forest::train(&data, 8, &mut SeededRng::new(5));
        let (b, _) = Forest::train(&data, 8, &mut SeededRng::new(5));
        assert_eq!(a, b);
    }

    #[test]
    fn metrics_handle_all_negative_predictions() {
        let forest = Forest::from_trees(vec![TreeNode::Leaf(false)]);
        let data = separable(4);
        let metrics = forest.evaluate(&data);
        assert_eq!(metrics.accuracy, 0.5);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.f1, 0.0);
    }
}
