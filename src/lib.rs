mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, CompareArgs, RunArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    RandomForest,
    Linear,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 3] {
        [
            ModelKind::DecisionTree,
            ModelKind::RandomForest,
            ModelKind::Linear,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Linear => "Linear Regression",
        }
    }

    /// File-name form of the label.
    pub fn slug(self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::Linear => "linear_regression",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Compare(args) => handle_compare(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "pce_cli=debug" } else { "pce_cli=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config = config::RunConfig::from_run_args(args).with_defaults();
    config.validate()?;

    println!("--> Configuration\n{}", config.summary());

    if config.dry_run {
        println!("\nDry run requested: skipping training.");
        return Ok(());
    }

    let report = pipeline::run_pipeline(&config)?;
    println!("\n--> Report\n{}", report.render());

    if let Some(path) = &config.report {
        report.persist(path)?;
        println!("\nReport written to {}", path.display());
    }
    if let Some(path) = &config.json {
        report.persist_json(path)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<()> {
    let config = config::RunConfig::from_compare_args(args).with_defaults();
    config.validate()?;

    println!("--> Configuration\n{}", config.summary());

    if config.dry_run {
        println!("\nDry run requested: skipping training.");
        return Ok(());
    }

    let report = pipeline::run_pipeline(&config)?;
    let table = report.render_markdown();
    println!("\n--> Model comparison\n{}", table);

    if !report.failures().is_empty() {
        println!("\n--> Failures");
        for failure in report.failures() {
            let model = failure.model.map(|m| m.label()).unwrap_or("all models");
            println!("  - {}: {}", model, failure.message);
        }
    }

    if let Some(path) = &config.report {
        std::fs::write(path, format!("{}\n", table))
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        println!("\nComparison written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_and_labels_line_up() {
        for kind in ModelKind::all() {
            assert_eq!(kind.slug(), kind.label().replace(' ', "_").to_lowercase());
        }
    }

    #[test]
    fn value_enum_names_are_kebab_case() {
        let names: Vec<String> = ModelKind::all()
            .iter()
            .filter_map(|k| k.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["decision-tree", "random-forest", "linear"]);
    }
}
