use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{check_training_data, RegressionTree, TreeConfig};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub tree: TreeConfig,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree: TreeConfig::default(),
            seed: 42,
        }
    }
}

/// Bagged regression trees; predictions are the mean over trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &ForestConfig) -> Result<Self> {
        let n_features = check_training_data(rows, targets)?;
        if config.n_estimators == 0 {
            return Err(PipelineError::Train(
                "random forest needs at least one tree".to_string(),
            ));
        }

        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut trees = Vec::with_capacity(config.n_estimators);
        let mut sample = vec![0usize; n];

        for _ in 0..config.n_estimators {
            for slot in sample.iter_mut() {
                *slot = rng.gen_range(0..n);
            }
            trees.push(RegressionTree::fit_indices(
                rows,
                targets,
                n_features,
                &sample,
                &config.tree,
            ));
        }

        let importances = average_importances(&trees, n_features);

        debug!(
            "random forest: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64
        );

        Ok(Self { trees, importances })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Mean of the per-tree normalized importances, renormalized.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn average_importances(trees: &[RegressionTree], n_features: usize) -> Vec<f64> {
    let mut sums = vec![0.0; n_features];
    for tree in trees {
        for (sum, value) in sums.iter_mut().zip(tree.feature_importances()) {
            *sum += value;
        }
    }

    let total: f64 = sums.iter().sum();
    if total > 0.0 {
        sums.iter().map(|s| s / total).collect()
    } else {
        sums
    }
}
