use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::check_training_data;
use crate::error::{PipelineError, Result};

/// Ordinary least squares with an unregularized intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64]) -> Result<Self> {
        check_training_data(rows, targets)?;

        let design = build_design_matrix(rows);
        let target = DVector::from_column_slice(targets);
        let beta = solve_least_squares(&design, &target)?;

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// One coefficient per feature, intercept excluded.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

pub(crate) fn build_design_matrix(features: &[Vec<f64>]) -> DMatrix<f64> {
    let rows = features.len();
    let cols = if rows > 0 { features[0].len() } else { 0 };
    let mut buffer = Vec::with_capacity(rows * (cols + 1));

    for row in features {
        buffer.push(1.0); // intercept
        buffer.extend(row.iter().copied());
    }

    DMatrix::from_row_slice(rows, cols + 1, &buffer)
}

/// Normal equations via Cholesky; minimum-norm SVD solve when the Gram
/// matrix is singular (constant or collinear columns).
pub(crate) fn solve_least_squares(
    design: &DMatrix<f64>,
    target: &DVector<f64>,
) -> Result<DVector<f64>> {
    let gram = design.transpose() * design;
    let rhs = design.transpose() * target;

    if let Some(chol) = gram.cholesky() {
        let beta = chol.solve(&rhs);
        if beta.iter().all(|v| v.is_finite()) {
            return Ok(beta);
        }
    }

    debug!("normal equations are singular; falling back to SVD least squares");

    let svd = design.clone().svd(true, true);
    let max_singular = svd.singular_values.max();
    let eps = max_singular * design.nrows().max(design.ncols()) as f64 * f64::EPSILON;

    svd.solve(target, eps)
        .map_err(|e| PipelineError::Train(format!("least-squares solve failed: {e}")))
}
