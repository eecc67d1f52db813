//! Orchestration: load, clean, split and evaluate every requested model on
//! every subset that is large enough.

use std::fs;

use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::data::features::select;
use crate::data::split::{deposition_groups, ALL_DATA, GROUPING_COLUMN};
use crate::data::{
    clean_table, load_table, prepare_features_labels, split_by_group, train_test_split,
    FeatureMatrix, Subset, TARGET_COLUMN,
};
use crate::error::Result;
use crate::model::ModelTrainer;
use crate::report::charts::{plot_feature_importance, plot_predictions};
use crate::report::{ComparisonReport, MetricsRecord};
use crate::ModelKind;

/// Groups smaller than this are reported as skipped.
pub const MIN_GROUP_ROWS: usize = 50;

/// Run the full experiment described by `config`.
///
/// Only a load failure aborts; problems inside one subset or one model are
/// logged and recorded in the returned report.
pub fn run_pipeline(config: &RunConfig) -> Result<ComparisonReport> {
    let mut table = load_table(&config.dataset)?;
    info!(
        "Loaded {} rows x {} columns",
        table.height(),
        table.width()
    );

    let summary = clean_table(&mut table, &config.clean_options());

    let mut report = ComparisonReport::new(config.dataset.display().to_string());
    if summary.rows_after < summary.rows_before {
        report.push_note(format!(
            "{} rows removed by the PCE outlier filter",
            summary.rows_before - summary.rows_after
        ));
    }

    let subsets = if config.group_by_deposition {
        split_by_group(&table, GROUPING_COLUMN, &deposition_groups())
    } else {
        vec![Subset {
            name: ALL_DATA.to_string(),
            table,
        }]
    };

    if config.save_models || config.plots {
        if let Err(err) = fs::create_dir_all(&config.output_dir) {
            warn!(
                "could not create output directory {}: {}",
                config.output_dir.display(),
                err
            );
        }
    }

    let min_rows = config.min_group_rows();
    for subset in &subsets {
        info!("Processing {}: {} rows", subset.name, subset.len());

        if subset.len() < min_rows {
            info!(
                "Skipping {}: insufficient data ({} rows, need {})",
                subset.name,
                subset.len(),
                min_rows
            );
            report.push_skipped(&subset.name, subset.len());
            continue;
        }

        let (features, labels) = match prepare_features_labels(&subset.table, TARGET_COLUMN) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!("Subset {} failed: {}", subset.name, err);
                report.push_failure(&subset.name, None, err.to_string());
                continue;
            }
        };
        debug!(
            "{}: {} labelled rows, {} features",
            subset.name,
            features.n_rows(),
            features.n_features()
        );

        for &kind in &config.models {
            match run_experiment(config, &subset.name, kind, &features, &labels) {
                Ok(record) => report.push_record(record),
                Err(err) => {
                    error!("{} on {} failed: {}", kind, subset.name, err);
                    report.push_failure(&subset.name, Some(kind), err.to_string());
                }
            }
        }
    }

    Ok(report)
}

fn run_experiment(
    config: &RunConfig,
    subset: &str,
    kind: ModelKind,
    features: &FeatureMatrix,
    labels: &[f64],
) -> Result<MetricsRecord> {
    let split = train_test_split(features.n_rows(), config.test_fraction(), config.seed())?;
    let x_train = features.take_rows(&split.train);
    let x_test = features.take_rows(&split.test);
    let y_train = select(labels, &split.train);
    let y_test = select(labels, &split.test);

    let mut trainer = ModelTrainer::new(kind, config.train_params());
    trainer.train(&x_train, &y_train)?;

    let evaluation = trainer.evaluate(&x_test, &y_test)?;
    info!(
        "{} on {}: R^2 = {:.4}, RMSE = {:.4}",
        kind, subset, evaluation.metrics.r2, evaluation.metrics.rmse
    );

    write_artifacts(config, subset, &trainer, &y_test, &evaluation.predictions);

    let top_feature = trainer.top_feature()?;
    info!("Most influential feature for {} on {}: {}", kind, subset, top_feature);

    Ok(MetricsRecord::new(
        kind,
        subset,
        &evaluation.metrics,
        split.train.len(),
        split.test.len(),
        top_feature,
    ))
}

/// Model file and charts. Failures here never cost the metrics.
fn write_artifacts(
    config: &RunConfig,
    subset: &str,
    trainer: &ModelTrainer,
    actual: &[f64],
    predicted: &[f64],
) {
    let kind = trainer.kind();

    if config.save_models {
        let path = config
            .output_dir
            .join(format!("model_{}_{}.json", subset, kind.slug()));
        if let Err(err) = trainer.save(&path) {
            warn!("{}", err);
        }
    }

    if !config.plots {
        return;
    }

    let title = format!("{} {} Deposition", subset, kind.label());
    if let Err(err) = plot_predictions(actual, predicted, &title, &config.output_dir) {
        warn!("{}", err);
    }

    let Some(model) = trainer.fitted() else {
        return;
    };
    let importances = model.feature_importances();
    let title = format!("{} {} Importance", subset, kind.label());
    match plot_feature_importance(
        &model.feature_names,
        importances.as_deref(),
        &title,
        &config.output_dir,
    ) {
        Ok(Some(path)) => debug!("Feature importance chart: {}", path.display()),
        Ok(None) => debug!("{} exposes no importances; chart skipped", kind),
        Err(err) => warn!("{}", err),
    }
}
