use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::ModelKind;

pub const DEFAULT_DATASET: &str = "Perovskite_FAIR_database_ORIGINAL_all_data.xlsx";

/// Command-line interface definition for the PCE CLI.
#[derive(Parser, Debug)]
#[command(
    name = "pce-cli",
    version,
    about = "Predict perovskite solar-cell efficiency from the terminal"
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train models per deposition group and write models, charts and a report.
    Run(RunArgs),
    /// Train every model kind on the whole cleaned dataset and print a comparison table.
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Spreadsheet (.xlsx, .xls, .ods) or CSV file with the device records.
    #[arg(value_name = "DATASET", default_value = DEFAULT_DATASET)]
    pub dataset: PathBuf,

    /// Comma-separated list of models to train (decision-tree, random-forest, linear).
    #[arg(
        short,
        long,
        value_enum,
        value_name = "MODELS",
        value_delimiter = ',',
        num_args = 1..,
        default_value = "decision-tree"
    )]
    pub models: Vec<ModelKind>,

    /// Directory that receives model files and charts.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Groups with fewer rows than this are skipped.
    #[arg(long, value_name = "ROWS")]
    pub min_group_rows: Option<usize>,

    /// Share of rows held out for evaluation.
    #[arg(long, value_name = "FRACTION")]
    pub test_fraction: Option<f64>,

    /// Seed for the train/test shuffle and forest bootstraps.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Depth limit for tree models.
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,

    /// Number of trees in the random forest.
    #[arg(long, value_name = "COUNT")]
    pub trees: Option<usize>,

    /// Keep only the curated list of columns before training.
    #[arg(long)]
    pub select_columns: bool,

    /// Skip chart rendering.
    #[arg(long)]
    pub no_plots: bool,

    /// Also write the text report to this location.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Also write the report as JSON to this location.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Preview configuration without loading data or training.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Spreadsheet (.xlsx, .xls, .ods) or CSV file with the device records.
    #[arg(value_name = "DATASET", default_value = DEFAULT_DATASET)]
    pub dataset: PathBuf,

    /// Share of rows held out for evaluation.
    #[arg(long, value_name = "FRACTION")]
    pub test_fraction: Option<f64>,

    /// Seed for the train/test shuffle and forest bootstraps.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Number of trees in the random forest.
    #[arg(long, value_name = "COUNT")]
    pub trees: Option<usize>,

    /// Also write the markdown table to this location.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Preview configuration without loading data or training.
    #[arg(long)]
    pub dry_run: bool,
}
