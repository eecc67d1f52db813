mod forest;
mod linear;
mod metrics;
mod tree;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::FeatureMatrix;
use crate::error::{PipelineError, Result};
use crate::ModelKind;

pub use forest::{ForestConfig, RandomForest};
pub use linear::LinearModel;
pub use metrics::{compute_metrics, RegressionMetrics};
pub use tree::{RegressionTree, TreeConfig, TreeNode};

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_TREES: usize = 100;

/// Hyperparameters shared by every model kind; each kind reads what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub max_depth: Option<usize>,
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            max_depth: Some(DEFAULT_MAX_DEPTH),
            n_estimators: DEFAULT_TREES,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl TrainParams {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    fn forest_config(&self) -> ForestConfig {
        ForestConfig {
            n_estimators: self.n_estimators,
            tree: self.tree_config(),
            seed: self.seed,
        }
    }
}

/// Fitted estimator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum Estimator {
    DecisionTree(RegressionTree),
    RandomForest(RandomForest),
    Linear(LinearModel),
}

/// Per-feature influence exposed by a fitted model. Tree ensembles report
/// impurity-based importances, linear models their coefficients.
#[derive(Debug, Clone, PartialEq)]
pub enum Influence {
    TreeBased { importances: Vec<f64> },
    LinearBased { coefficients: Vec<f64> },
}

impl Influence {
    /// Index of the most influential feature: largest importance, or largest
    /// absolute coefficient. Ties resolve to the lowest index.
    pub fn top_feature_index(&self) -> Result<usize> {
        let (scores, what): (Vec<f64>, &str) = match self {
            Influence::TreeBased { importances } => (importances.clone(), "importances"),
            Influence::LinearBased { coefficients } => {
                (coefficients.iter().map(|c| c.abs()).collect(), "coefficients")
            }
        };

        if scores.is_empty() {
            return Err(PipelineError::Train(format!(
                "model exposes no {what}; cannot rank features"
            )));
        }
        if let Some(idx) = scores.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::Train(format!(
                "non-finite value in {what} at feature {idx}"
            )));
        }

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] {
                best = idx;
            }
        }
        Ok(best)
    }
}

/// A trained model bound to the feature order it was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub estimator: Estimator,
}

impl FittedModel {
    pub fn fit(
        kind: ModelKind,
        params: &TrainParams,
        features: &FeatureMatrix,
        targets: &[f64],
    ) -> Result<Self> {
        if features.n_rows() == 0 {
            return Err(PipelineError::Train("feature matrix has no rows".to_string()));
        }
        if features.n_features() == 0 {
            return Err(PipelineError::Train(
                "feature matrix has no columns".to_string(),
            ));
        }

        let rows = features.rows();
        let estimator = match kind {
            ModelKind::DecisionTree => {
                Estimator::DecisionTree(RegressionTree::fit(rows, targets, &params.tree_config())?)
            }
            ModelKind::RandomForest => {
                Estimator::RandomForest(RandomForest::fit(rows, targets, &params.forest_config())?)
            }
            ModelKind::Linear => Estimator::Linear(LinearModel::fit(rows, targets)?),
        };

        Ok(Self {
            kind,
            feature_names: features.names().to_vec(),
            trained_at: Utc::now(),
            estimator,
        })
    }

    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.names() != self.feature_names.as_slice() {
            return Err(PipelineError::Train(format!(
                "model trained on {} features cannot score a matrix with {} \
                 differently ordered or named features",
                self.feature_names.len(),
                features.n_features()
            )));
        }

        let rows = features.rows();
        Ok(match &self.estimator {
            Estimator::DecisionTree(tree) => tree.predict(rows),
            Estimator::RandomForest(forest) => forest.predict(rows),
            Estimator::Linear(linear) => linear.predict(rows),
        })
    }

    pub fn influence(&self) -> Influence {
        match &self.estimator {
            Estimator::DecisionTree(tree) => Influence::TreeBased {
                importances: tree.feature_importances().to_vec(),
            },
            Estimator::RandomForest(forest) => Influence::TreeBased {
                importances: forest.feature_importances().to_vec(),
            },
            Estimator::Linear(linear) => Influence::LinearBased {
                coefficients: linear.coefficients().to_vec(),
            },
        }
    }

    /// Importance scores, when the model has them.
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self.influence() {
            Influence::TreeBased { importances } => Some(importances),
            Influence::LinearBased { .. } => None,
        }
    }

    pub fn top_feature(&self) -> Result<&str> {
        let influence = self.influence();
        let width = match &influence {
            Influence::TreeBased { importances } => importances.len(),
            Influence::LinearBased { coefficients } => coefficients.len(),
        };
        if width != self.feature_names.len() {
            return Err(PipelineError::Train(format!(
                "{} influence values for {} features",
                width,
                self.feature_names.len()
            )));
        }

        let idx = influence.top_feature_index()?;
        Ok(&self.feature_names[idx])
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::persist(path, e))?;
        fs::write(path, json).map_err(|e| PipelineError::persist(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| PipelineError::load(path, e))?;
        serde_json::from_str(&json).map_err(|e| PipelineError::load(path, e))
    }
}

/// Predictions and metrics on held-out rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub predictions: Vec<f64>,
    pub metrics: RegressionMetrics,
}

/// Trains one model kind and answers questions about the fit.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    kind: ModelKind,
    params: TrainParams,
    fitted: Option<FittedModel>,
}

impl ModelTrainer {
    pub fn new(kind: ModelKind, params: TrainParams) -> Self {
        Self {
            kind,
            params,
            fitted: None,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn fitted(&self) -> Option<&FittedModel> {
        self.fitted.as_ref()
    }

    pub fn train(&mut self, features: &FeatureMatrix, targets: &[f64]) -> Result<()> {
        info!(
            "Training {} on {} rows x {} features",
            self.kind,
            features.n_rows(),
            features.n_features()
        );
        self.fitted = Some(FittedModel::fit(self.kind, &self.params, features, targets)?);
        Ok(())
    }

    pub fn evaluate(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<Evaluation> {
        let model = self.model()?;
        let predictions = model.predict(features)?;
        let metrics = compute_metrics(targets, &predictions)?;
        Ok(Evaluation {
            predictions,
            metrics,
        })
    }

    pub fn top_feature(&self) -> Result<String> {
        Ok(self.model()?.top_feature()?.to_string())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.model()?.save(path)?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    fn model(&self) -> Result<&FittedModel> {
        self.fitted
            .as_ref()
            .ok_or_else(|| PipelineError::Train(format!("{} has not been trained", self.kind)))
    }
}
