pub mod charts;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::RegressionMetrics;
use crate::ModelKind;

/// Test-set outcome for one (subset, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub model: ModelKind,
    pub subset: String,
    pub r2: f64,
    pub rmse: f64,
    pub mse: f64,
    pub mae: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub top_feature: String,
}

impl MetricsRecord {
    pub fn new(
        model: ModelKind,
        subset: impl Into<String>,
        metrics: &RegressionMetrics,
        train_rows: usize,
        test_rows: usize,
        top_feature: impl Into<String>,
    ) -> Self {
        Self {
            model,
            subset: subset.into(),
            r2: metrics.r2,
            rmse: metrics.rmse,
            mse: metrics.mse,
            mae: metrics.mae,
            train_rows,
            test_rows,
            top_feature: top_feature.into(),
        }
    }
}

/// A group left out for having too few rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGroup {
    pub subset: String,
    pub rows: usize,
}

/// A subset (or one model on it) that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetFailure {
    pub subset: String,
    pub model: Option<ModelKind>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub(crate) dataset: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) records: Vec<MetricsRecord>,
    pub(crate) skipped: Vec<SkippedGroup>,
    pub(crate) failures: Vec<SubsetFailure>,
    pub(crate) notes: Vec<String>,
}

impl ComparisonReport {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            timestamp: Utc::now(),
            records: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn skipped(&self) -> &[SkippedGroup] {
        &self.skipped
    }

    pub fn failures(&self) -> &[SubsetFailure] {
        &self.failures
    }

    pub(crate) fn push_record(&mut self, record: MetricsRecord) {
        self.records.push(record);
    }

    pub(crate) fn push_skipped(&mut self, subset: impl Into<String>, rows: usize) {
        self.skipped.push(SkippedGroup {
            subset: subset.into(),
            rows,
        });
    }

    pub(crate) fn push_failure(
        &mut self,
        subset: impl Into<String>,
        model: Option<ModelKind>,
        message: impl Into<String>,
    ) {
        self.failures.push(SubsetFailure {
            subset: subset.into(),
            model,
            message: message.into(),
        });
    }

    pub(crate) fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Dataset: {}", self.dataset));
        lines.push(format!(
            "Generated at: {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));

        lines.push(String::new());
        lines.push("Results:".to_string());
        if self.records.is_empty() {
            lines.push("  (no models evaluated)".to_string());
        } else {
            lines.push(format!(
                "  {:<18} {:<10} {:>9} {:>9} {:>7}  {}",
                "Model", "Subset", "R^2", "RMSE", "Test", "Top feature"
            ));
            for record in &self.records {
                lines.push(format!(
                    "  {:<18} {:<10} {:>9.4} {:>9.4} {:>7}  {}",
                    record.model.label(),
                    record.subset,
                    record.r2,
                    record.rmse,
                    record.test_rows,
                    record.top_feature
                ));
            }
        }

        if !self.skipped.is_empty() {
            lines.push(String::new());
            lines.push("Skipped:".to_string());
            for group in &self.skipped {
                lines.push(format!(
                    "  - {}: insufficient data ({} rows)",
                    group.subset, group.rows
                ));
            }
        }

        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push("Failures:".to_string());
            for failure in &self.failures {
                match failure.model {
                    Some(model) => lines.push(format!(
                        "  - {} / {}: {}",
                        failure.subset, model, failure.message
                    )),
                    None => lines.push(format!("  - {}: {}", failure.subset, failure.message)),
                }
            }
        }

        if !self.notes.is_empty() {
            lines.push(String::new());
            lines.push("Notes:".to_string());
            for note in &self.notes {
                lines.push(format!("  - {}", note));
            }
        }

        lines.join("\n")
    }

    /// Pipe table with metrics rounded to two decimals.
    pub fn render_markdown(&self) -> String {
        let mut lines = vec![
            "| Model | Subset | R2 (Test) | RMSE | Primary Top Feature |".to_string(),
            "|:------|:-------|----------:|-----:|:--------------------|".to_string(),
        ];
        for record in &self.records {
            lines.push(format!(
                "| {} | {} | {:.2} | {:.2} | {} |",
                record.model.label(),
                record.subset,
                record.r2,
                record.rmse,
                record.top_feature
            ));
        }
        lines.join("\n")
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())
            .with_context(|| format!("failed to write report to {}", path.display()))
    }

    pub fn persist_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}
