use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{CompareArgs, RunArgs, DEFAULT_DATASET};
use crate::data::split::{DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use crate::data::CleanOptions;
use crate::model::{TrainParams, DEFAULT_MAX_DEPTH, DEFAULT_TREES};
use crate::pipeline::MIN_GROUP_ROWS;
use crate::ModelKind;

/// Runtime configuration compiled from CLI input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: PathBuf,
    pub models: Vec<ModelKind>,
    pub output_dir: PathBuf,
    pub min_group_rows: Option<usize>,
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
    /// `None` after [`RunConfig::with_defaults`] means unlimited depth.
    pub max_depth: Option<usize>,
    pub trees: Option<usize>,
    /// Split by deposition steps; off means one `all_data` subset.
    pub group_by_deposition: bool,
    pub select_columns: bool,
    pub save_models: bool,
    pub plots: bool,
    pub report: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunConfig {
    /// Per-group run over `dataset` with every knob at its default.
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            models: vec![ModelKind::DecisionTree],
            output_dir: PathBuf::from("."),
            min_group_rows: None,
            test_fraction: None,
            seed: None,
            max_depth: None,
            trees: None,
            group_by_deposition: true,
            select_columns: false,
            save_models: true,
            plots: true,
            report: None,
            json: None,
            dry_run: false,
        }
    }

    pub fn from_run_args(args: RunArgs) -> Self {
        Self {
            dataset: args.dataset,
            models: args.models,
            output_dir: args.output_dir,
            min_group_rows: args.min_group_rows,
            test_fraction: args.test_fraction,
            seed: args.seed,
            max_depth: args.max_depth,
            trees: args.trees,
            group_by_deposition: true,
            select_columns: args.select_columns,
            save_models: true,
            plots: !args.no_plots,
            report: args.report,
            json: args.json,
            dry_run: args.dry_run,
        }
    }

    /// Whole-table comparison of every model kind; trees grow unbounded and
    /// nothing is written besides the optional report.
    pub fn from_compare_args(args: CompareArgs) -> Self {
        Self {
            dataset: args.dataset,
            models: ModelKind::all().to_vec(),
            output_dir: PathBuf::from("."),
            min_group_rows: Some(0),
            test_fraction: args.test_fraction,
            seed: args.seed,
            max_depth: None,
            trees: args.trees,
            group_by_deposition: false,
            select_columns: false,
            save_models: false,
            plots: false,
            report: args.report,
            json: None,
            dry_run: args.dry_run,
        }
    }

    /// Fill in defaults for everything the user omitted.
    pub fn with_defaults(mut self) -> Self {
        if self.dataset.as_os_str().is_empty() {
            self.dataset = PathBuf::from(DEFAULT_DATASET);
        }
        if self.models.is_empty() {
            self.models.push(ModelKind::DecisionTree);
        }
        if self.min_group_rows.is_none() {
            self.min_group_rows = Some(MIN_GROUP_ROWS);
        }
        if self.test_fraction.is_none() {
            self.test_fraction = Some(DEFAULT_TEST_FRACTION);
        }
        if self.seed.is_none() {
            self.seed = Some(DEFAULT_SEED);
        }
        if self.max_depth.is_none() && self.group_by_deposition {
            self.max_depth = Some(DEFAULT_MAX_DEPTH);
        }
        if self.trees.is_none() {
            self.trees = Some(DEFAULT_TREES);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.models.is_empty(), "at least one model is required");

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model) {
                bail!("Model '{}' was requested more than once", model);
            }
        }

        let fraction = self.test_fraction();
        ensure!(
            fraction > 0.0 && fraction < 1.0,
            "test fraction must be between 0 and 1 (exclusive), got {}",
            fraction
        );
        ensure!(self.trees() > 0, "random forest needs at least one tree");
        if let Some(depth) = self.max_depth {
            ensure!(depth > 0, "max depth must be at least 1");
        }

        if !self.dry_run && !self.dataset.exists() {
            bail!(
                "Dataset '{}' does not exist; use --dry-run to preview without the file",
                self.dataset.display()
            );
        }

        Ok(())
    }

    pub fn min_group_rows(&self) -> usize {
        self.min_group_rows.unwrap_or(MIN_GROUP_ROWS)
    }

    pub fn test_fraction(&self) -> f64 {
        self.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION)
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn trees(&self) -> usize {
        self.trees.unwrap_or(DEFAULT_TREES)
    }

    pub fn train_params(&self) -> TrainParams {
        TrainParams {
            max_depth: self.max_depth,
            n_estimators: self.trees(),
            seed: self.seed(),
            ..TrainParams::default()
        }
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            select_columns: self.select_columns,
            ..CleanOptions::default()
        }
    }

    pub fn summary(&self) -> String {
        let models: Vec<&str> = self.models.iter().map(|m| m.label()).collect();
        let depth_text = self
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        let grouping = if self.group_by_deposition {
            format!("deposition steps (min {} rows)", self.min_group_rows())
        } else {
            "none (all data)".to_string()
        };

        format!(
            concat!(
                "Dataset: {}\n",
                "Models: {}\n",
                "Grouping: {}\n",
                "Test fraction: {}\n",
                "Seed: {}\n",
                "Max depth: {}\n",
                "Trees: {}\n",
                "Column selection: {}\n",
                "Artifacts: {}"
            ),
            self.dataset.display(),
            models.join(", "),
            grouping,
            self.test_fraction(),
            self.seed(),
            depth_text,
            self.trees(),
            if self.select_columns {
                "enabled"
            } else {
                "disabled"
            },
            match (self.save_models, self.plots) {
                (false, _) => "none".to_string(),
                (true, true) => format!("models + charts in {}", self.output_dir.display()),
                (true, false) => format!("models in {}", self.output_dir.display()),
            }
        )
    }
}
