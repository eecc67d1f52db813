//! CART regression tree.
//!
//! Exhaustive greedy split search on the MSE criterion. Each accepted split
//! adds its drop in squared error to the importance of the split feature;
//! importances are normalized to sum to one once the tree is built.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
        samples: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RegressionTree {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &TreeConfig) -> Result<Self> {
        let n_features = check_training_data(rows, targets)?;
        let indices: Vec<usize> = (0..rows.len()).collect();
        Ok(Self::fit_indices(rows, targets, n_features, &indices, config))
    }

    /// Grow a tree on the rows at `indices`; repeats are allowed (bootstrap).
    pub(crate) fn fit_indices(
        rows: &[Vec<f64>],
        targets: &[f64],
        n_features: usize,
        indices: &[usize],
        config: &TreeConfig,
    ) -> Self {
        let mut builder = TreeBuilder {
            rows,
            targets,
            n_features,
            config,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
        };
        builder.build_node(indices, 0);

        let total: f64 = builder.impurity_decrease.iter().sum();
        let importances = if total > 0.0 {
            builder.impurity_decrease.iter().map(|d| d / total).collect()
        } else {
            vec![0.0; n_features]
        };

        Self {
            nodes: builder.nodes,
            n_features,
            importances,
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Normalized impurity decrease per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Validate shapes shared by every estimator; returns the feature count.
pub(crate) fn check_training_data(rows: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    if rows.is_empty() {
        return Err(PipelineError::Train("feature matrix has no rows".to_string()));
    }
    if rows.len() != targets.len() {
        return Err(PipelineError::Train(format!(
            "{} feature rows but {} targets",
            rows.len(),
            targets.len()
        )));
    }
    let n_features = rows[0].len();
    if n_features == 0 {
        return Err(PipelineError::Train(
            "feature matrix has no columns".to_string(),
        ));
    }
    Ok(n_features)
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    targets: &'a [f64],
    n_features: usize,
    config: &'a TreeConfig,
    nodes: Vec<TreeNode>,
    impurity_decrease: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl TreeBuilder<'_> {
    fn build_node(&mut self, indices: &[usize], depth: usize) -> usize {
        let current_idx = self.nodes.len();
        let leaf = TreeNode::Leaf {
            value: mean_target(self.targets, indices),
            samples: indices.len(),
        };

        let depth_reached = self.config.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || indices.len() < self.config.min_samples_split.max(2)
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
            || is_pure(self.targets, indices)
        {
            self.nodes.push(leaf);
            return current_idx;
        }

        let Some(split) = self.find_best_split(indices) else {
            self.nodes.push(leaf);
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[i][split.feature] <= split.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            self.nodes.push(leaf);
            return current_idx;
        }

        self.impurity_decrease[split.feature] += split.decrease;

        // Reserve the slot; children are appended after it.
        self.nodes.push(TreeNode::Leaf {
            value: 0.0,
            samples: 0,
        });

        let left = self.build_node(&left_indices, depth + 1);
        let right = self.build_node(&right_indices, depth + 1);

        self.nodes[current_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };

        current_idx
    }

    /// Best (feature, threshold) by drop in summed squared error.
    fn find_best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_sse = sum_squared_error(self.targets, indices);

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..self.n_features {
            pairs.clear();
            pairs.extend(
                indices
                    .iter()
                    .map(|&i| (self.rows[i][feature], self.targets[i])),
            );
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total_sum: f64 = pairs.iter().map(|&(_, t)| t).sum();
            let total_sq_sum: f64 = pairs.iter().map(|&(_, t)| t * t).sum();

            let mut left_sum = 0.0;
            let mut left_sq_sum = 0.0;

            for i in 0..n - 1 {
                left_sum += pairs[i].1;
                left_sq_sum += pairs[i].1 * pairs[i].1;

                // No threshold fits between equal values.
                if pairs[i].0 == pairs[i + 1].0 {
                    continue;
                }

                let left_count = i + 1;
                let right_count = n - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }

                let left_sse = left_sq_sum - left_sum * left_sum / left_count as f64;
                let right_sum = total_sum - left_sum;
                let right_sse =
                    (total_sq_sum - left_sq_sum) - right_sum * right_sum / right_count as f64;

                let decrease = parent_sse - (left_sse.max(0.0) + right_sse.max(0.0));
                if decrease > best.as_ref().map_or(0.0, |b| b.decrease) {
                    let mut threshold = (pairs[i].0 + pairs[i + 1].0) / 2.0;
                    // Midpoint of adjacent floats can round up to the right value.
                    if threshold >= pairs[i + 1].0 {
                        threshold = pairs[i].0;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

fn mean_target(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

fn sum_squared_error(targets: &[f64], indices: &[usize]) -> f64 {
    let mean = mean_target(targets, indices);
    indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum()
}

fn is_pure(targets: &[f64], indices: &[usize]) -> bool {
    let first = targets[indices[0]];
    indices.iter().all(|&i| targets[i] == first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // Target depends only on feature 1.
        let rows = vec![
            vec![5.0, 0.0],
            vec![1.0, 1.0],
            vec![4.0, 2.0],
            vec![2.0, 10.0],
            vec![3.0, 11.0],
            vec![0.0, 12.0],
        ];
        let targets = vec![1.0, 1.0, 1.0, 9.0, 9.0, 9.0];
        (rows, targets)
    }

    #[test]
    fn learns_a_step_function() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, &TreeConfig::default()).expect("fit");

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        assert_abs_diff_eq!(tree.predict_row(&[0.0, 1.5]), 1.0);
        assert_abs_diff_eq!(tree.predict_row(&[0.0, 11.5]), 9.0);
        assert_eq!(tree.predict(&rows), targets);
    }

    #[test]
    fn importance_goes_to_the_informative_feature() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, &TreeConfig::default()).expect("fit");

        let importances = tree.feature_importances();
        assert_abs_diff_eq!(importances[0], 0.0);
        assert_abs_diff_eq!(importances[1], 1.0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let rows: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();

        let config = TreeConfig {
            max_depth: Some(2),
            ..TreeConfig::default()
        };
        let tree = RegressionTree::fit(&rows, &targets, &config).expect("fit");
        assert_eq!(tree.depth(), 2);

        let deep = RegressionTree::fit(&rows, &targets, &TreeConfig::default()).expect("fit");
        assert_eq!(deep.predict(&rows), targets);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let (rows, targets) = step_data();
        let config = TreeConfig {
            min_samples_leaf: 4,
            ..TreeConfig::default()
        };
        let tree = RegressionTree::fit(&rows, &targets, &config).expect("fit");
        assert_eq!(tree.node_count(), 1);
        assert_abs_diff_eq!(tree.predict_row(&[0.0, 0.0]), 5.0);
    }

    #[test]
    fn constant_target_yields_a_single_leaf_without_importance() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree =
            RegressionTree::fit(&rows, &[4.0, 4.0, 4.0], &TreeConfig::default()).expect("fit");
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.feature_importances(), &[0.0]);
    }

    #[test]
    fn rejects_empty_inputs() {
        assert!(RegressionTree::fit(&[], &[], &TreeConfig::default()).is_err());
        assert!(RegressionTree::fit(&[vec![]], &[1.0], &TreeConfig::default()).is_err());
        assert!(RegressionTree::fit(&[vec![1.0]], &[1.0, 2.0], &TreeConfig::default()).is_err());
    }
}
