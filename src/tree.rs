//! Greedy binary decision tree over [`FeatureVector`]s.
//!
//! Splits use the median of a feature as threshold and pick the feature with
//! the lowest size-weighted Gini impurity. A feature is used at most once per
//! root-to-leaf path, so depth never exceeds the number of features.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::features::{Feature, FeatureVector, TrainingExample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf(bool),
    Split {
        feature: Feature,
        threshold: f64,
        /// Taken when `value <= threshold`.
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn predict(&self, vector: &FeatureVector) -> bool {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(label) => return *label,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if vector.get(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::Leaf(_) => 1,
            TreeNode::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }
}

/// Builds a tree from `data` using the candidate `features`.
///
/// Impurity ties go to the feature that sorts first, which keeps training
/// reproducible for a given input.
pub fn build_tree(data: &[TrainingExample], features: &BTreeSet<Feature>) -> TreeNode {
    if data.is_empty() {
        return TreeNode::Leaf(false);
    }

    let positives = data.iter().filter(|example| example.label).count();
    if positives == data.len() {
        return TreeNode::Leaf(true);
    }
    if positives == 0 {
        return TreeNode::Leaf(false);
    }
    if features.is_empty() {
        return TreeNode::Leaf(majority_label(positives, data.len()));
    }

    let mut best: Option<(Feature, f64, f64)> = None;
    for &feature in features {
        let threshold = median(data.iter().map(|example| example.features.get(feature)));
        let impurity = split_impurity(data, feature, threshold);
        let better = match best {
            None => true,
            Some((_, _, best_impurity)) => impurity < best_impurity,
        };
        if better {
            best = Some((feature, threshold, impurity));
        }
    }

    let Some((feature, threshold, _)) = best else {
        return TreeNode::Leaf(majority_label(positives, data.len()));
    };

    let (left, right): (Vec<TrainingExample>, Vec<TrainingExample>) = data
        .iter()
        .partition(|example| example.features.get(feature) <= threshold);

    let mut remaining = features.clone();
    remaining.remove(&feature);

    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, &remaining)),
        right: Box::new(build_tree(&right, &remaining)),
    }
}

/// Ties resolve to `false`.
fn majority_label(positives: usize, total: usize) -> bool {
    positives * 2 > total
}

pub fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

fn split_impurity(data: &[TrainingExample], feature: Feature, threshold: f64) -> f64 {
    let mut left_total = 0usize;
    let mut left_positive = 0usize;
    let mut right_total = 0usize;
    let mut right_positive = 0usize;

    for example in data {
        if example.features.get(feature) <= threshold {
            left_total += 1;
            left_positive += usize::from(example.label);
        } else {
            right_total += 1;
            right_positive += usize::from(example.label);
        }
    }

    let total = data.len() as f64;
    (left_total as f64 / total) * gini(left_positive, left_total)
        + (right_total as f64 / total) * gini(right_positive, right_total)
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}
