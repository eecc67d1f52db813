use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Goodness-of-fit on held-out rows. Identical formulas for every model kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
}

pub fn compute_metrics(actual: &[f64], predicted: &[f64]) -> Result<RegressionMetrics> {
    let n = actual.len();
    if n == 0 {
        return Err(PipelineError::Train(
            "cannot compute metrics without observations".to_string(),
        ));
    }
    if predicted.len() != n {
        return Err(PipelineError::Train(format!(
            "{} predictions for {} observations",
            predicted.len(),
            n
        )));
    }

    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let ss_res = residuals.iter().map(|r| r * r).sum::<f64>();

    let mean_actual = actual.iter().sum::<f64>() / n as f64;
    let ss_tot = actual
        .iter()
        .map(|value| {
            let diff = value - mean_actual;
            diff * diff
        })
        .sum::<f64>();

    // Constant targets: a perfect fit scores 1, anything else 0.
    let r2 = if ss_tot > 0.0 {
        1.0 - (ss_res / ss_tot)
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    let mse = ss_res / n as f64;
    let rmse = mse.sqrt();
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;

    Ok(RegressionMetrics { r2, mse, rmse, mae })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_fit_scores_one_and_zero_error() {
        let actual = vec![1.0, 3.0, 5.0];
        let metrics = compute_metrics(&actual, &actual).expect("metrics");

        assert_abs_diff_eq!(metrics.r2, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mse, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mae, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn mean_prediction_scores_zero() {
        let actual = vec![1.0, 2.0, 3.0];
        let predicted = vec![2.0, 2.0, 2.0];
        let metrics = compute_metrics(&actual, &predicted).expect("metrics");

        assert_abs_diff_eq!(metrics.r2, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mse, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mae, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_target_does_not_divide_by_zero() {
        let actual = vec![2.0, 2.0, 2.0];
        let metrics = compute_metrics(&actual, &[1.0, 2.0, 3.0]).expect("metrics");
        assert_abs_diff_eq!(metrics.r2, 0.0);

        let metrics = compute_metrics(&actual, &actual).expect("metrics");
        assert_abs_diff_eq!(metrics.r2, 1.0);
    }

    #[test]
    fn rejects_empty_and_mismatched_inputs() {
        assert!(compute_metrics(&[], &[]).is_err());
        let err = compute_metrics(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(err.to_string().contains("1 predictions for 2 observations"));
    }
}
