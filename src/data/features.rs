use tracing::debug;

use super::clean::DROP_COLUMNS;
use super::split::GROUPING_COLUMN;
use super::table::Table;
use crate::error::{PipelineError, Result};

/// J-V measurement outputs. All of them are recorded alongside the target and
/// would leak it into the inputs.
pub const OUTPUT_COLUMNS: &[&str] = &[
    "JV_reverse_scan_PCE",
    "JV_forward_scan_PCE",
    "JV_forward_scan_FF",
    "JV_forward_scan_Voc",
    "JV_reverse_scan_Voc",
    "JV_reverse_scan_Jsc",
    "JV_reverse_scan_FF",
    "JV_forward_scan_Jsc",
];

/// Row-major numeric inputs with their column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(PipelineError::Schema(format!(
                "feature row {} has {} values, expected {}",
                idx,
                row.len(),
                names.len()
            )));
        }
        Ok(Self { names, rows })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.names.is_empty()
    }

    /// Rows at `indices`, in that order, with the same columns.
    pub fn take_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// Values at `indices`, in that order.
pub fn select(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

/// Whether `name` must stay out of the feature matrix for `target`.
pub fn is_excluded(name: &str, target: &str) -> bool {
    name == target
        || name == GROUPING_COLUMN
        || OUTPUT_COLUMNS.contains(&name)
        || DROP_COLUMNS.contains(&name)
}

/// Separate a subset into numeric features and the target vector.
///
/// Text columns are left out. Missing feature cells become 0; rows with a
/// missing target are dropped from both outputs.
pub fn prepare_features_labels(table: &Table, target: &str) -> Result<(FeatureMatrix, Vec<f64>)> {
    let target_column = table.column(target).ok_or_else(|| {
        PipelineError::Schema(format!("target column '{}' not found", target))
    })?;
    let target_values = target_column.as_numeric().ok_or_else(|| {
        PipelineError::Schema(format!("target column '{}' is not numeric", target))
    })?;

    let feature_columns: Vec<(&str, &[Option<f64>])> = table
        .columns()
        .iter()
        .filter(|c| !is_excluded(&c.name, target))
        .filter_map(|c| c.as_numeric().map(|values| (c.name.as_str(), values)))
        .collect();

    debug!(
        "{} of {} columns kept as features",
        feature_columns.len(),
        table.width()
    );

    let mut rows = Vec::with_capacity(table.height());
    let mut labels = Vec::with_capacity(table.height());

    for (row_idx, label) in target_values.iter().enumerate() {
        let Some(label) = label else {
            continue;
        };
        rows.push(
            feature_columns
                .iter()
                .map(|(_, values)| values[row_idx].unwrap_or(0.0))
                .collect(),
        );
        labels.push(*label);
    }

    let names = feature_columns
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();

    Ok((FeatureMatrix::new(names, rows)?, labels))
}
