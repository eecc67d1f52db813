use std::path::{Path, PathBuf};

use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};

const SCATTER_SIZE: (u32, u32) = (800, 800);
const BAR_SIZE: (u32, u32) = (1000, 600);
const TOP_FEATURES: usize = 10;
const FONT: &str = "sans-serif";

// Sampled from the viridis colormap, dark to light.
const VIRIDIS: [RGBColor; TOP_FEATURES] = [
    RGBColor(68, 1, 84),
    RGBColor(72, 40, 120),
    RGBColor(62, 74, 137),
    RGBColor(49, 104, 142),
    RGBColor(38, 130, 142),
    RGBColor(31, 158, 137),
    RGBColor(53, 183, 121),
    RGBColor(109, 205, 89),
    RGBColor(180, 222, 44),
    RGBColor(253, 231, 37),
];

/// Lowercases a chart title and turns spaces into underscores.
pub fn slugify(title: &str) -> String {
    title.trim().replace(' ', "_").to_lowercase()
}

/// Actual-vs-predicted scatter with a dashed identity line, saved as
/// `<slug>_predictions.png`.
pub fn plot_predictions(
    actual: &[f64],
    predicted: &[f64],
    title: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}_predictions.png", slugify(title)));

    if actual.len() != predicted.len() {
        return Err(PipelineError::plot(
            &path,
            format!(
                "{} actual values but {} predictions",
                actual.len(),
                predicted.len()
            ),
        ));
    }
    if actual.is_empty() {
        return Err(PipelineError::plot(&path, "nothing to plot"));
    }

    render_predictions(&path, actual, predicted, title)
        .map_err(|e| PipelineError::plot(&path, e))?;
    debug!("prediction plot written to {}", path.display());
    Ok(path)
}

/// Horizontal bars for the ten largest importances, labelled with the feature
/// names and saved as `<slug>_feature_importance.png`. Returns `Ok(None)`
/// when the model exposes no importances.
pub fn plot_feature_importance(
    feature_names: &[String],
    importances: Option<&[f64]>,
    title: &str,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    let Some(importances) = importances else {
        debug!("no feature importances for '{}'; chart omitted", title);
        return Ok(None);
    };

    let path = out_dir.join(format!("{}_feature_importance.png", slugify(title)));
    if feature_names.len() != importances.len() {
        return Err(PipelineError::plot(
            &path,
            format!(
                "{} feature names but {} importances",
                feature_names.len(),
                importances.len()
            ),
        ));
    }

    let ranked = rank_features(feature_names, importances);
    if ranked.is_empty() {
        return Err(PipelineError::plot(&path, "no finite importances to plot"));
    }

    render_importance(&path, &ranked, title)
        .map_err(|e| PipelineError::plot(&path, e))?;
    debug!(
        "importance plot written to {} (top: {})",
        path.display(),
        ranked[0].0
    );
    Ok(Some(path))
}

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn render_predictions(path: &Path, actual: &[f64], predicted: &[f64], title: &str) -> DrawResult {
    let (lo, hi) = value_range(actual.iter().chain(predicted));

    let root = BitMapBackend::new(path, SCATTER_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, lo..hi)?;

    chart
        .configure_mesh()
        .x_desc("Actual PCE")
        .y_desc("Predicted PCE")
        .draw()?;

    chart.draw_series(
        actual
            .iter()
            .zip(predicted)
            .filter(|(a, p)| a.is_finite() && p.is_finite())
            .map(|(&a, &p)| Circle::new((a, p), 3, GREEN.mix(0.5).filled())),
    )?;

    chart.draw_series(
        dash_segments(lo, hi)
            .into_iter()
            .map(|segment| PathElement::new(segment, RED.stroke_width(2))),
    )?;

    root.present()?;
    Ok(())
}

fn render_importance(path: &Path, ranked: &[(&String, f64)], title: &str) -> DrawResult {
    // Bottom-up slots, so the largest importance ends up on top.
    let n = ranked.len();
    let labels: Vec<&str> = ranked.iter().rev().map(|(name, _)| name.as_str()).collect();
    let max = ranked.iter().map(|(_, value)| *value).fold(0.0_f64, f64::max);
    let x_max = if max > 0.0 { max * 1.1 } else { 1.0 };
    let label_width = labels
        .iter()
        .map(|label| label.chars().count() as u32 * 8)
        .max()
        .unwrap_or(0)
        .clamp(80, 360);

    let root = BitMapBackend::new(path, BAR_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(label_width)
        .build_cartesian_2d(0.0..x_max, (0..n).into_segmented())?;

    let label_for = |value: &SegmentValue<usize>| match value {
        SegmentValue::CenterOf(idx) => labels
            .get(*idx)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&label_for)
        .x_desc("Importance")
        .draw()?;

    chart.draw_series(ranked.iter().enumerate().map(|(rank, (_, value))| {
        let slot = n - 1 - rank;
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(slot)),
                (*value, SegmentValue::Exact(slot + 1)),
            ],
            VIRIDIS[rank].filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Features sorted by descending importance, at most ten, stable on ties.
fn rank_features<'a>(names: &'a [String], importances: &[f64]) -> Vec<(&'a String, f64)> {
    let mut ranked: Vec<(&String, f64)> = names
        .iter()
        .zip(importances.iter().copied())
        .filter(|(_, value)| value.is_finite())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(TOP_FEATURES);
    ranked
}

fn value_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Pieces of the identity line from `(lo, lo)` to `(hi, hi)`, every other
/// stretch left blank.
fn dash_segments(lo: f64, hi: f64) -> Vec<Vec<(f64, f64)>> {
    const PIECES: usize = 40;
    let step = (hi - lo) / PIECES as f64;
    (0..PIECES)
        .step_by(2)
        .map(|i| {
            let start = lo + step * i as f64;
            let end = start + step;
            vec![(start, start), (end, end)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_joins_words_with_underscores() {
        assert_eq!(
            slugify("1_step Decision Tree Deposition"),
            "1_step_decision_tree_deposition"
        );
    }

    #[test]
    fn prediction_plot_is_written() {
        let dir = tempfile::tempdir().expect("temp dir");
        let actual = [10.0, 12.5, 15.0, 20.0];
        let predicted = [11.0, 12.0, 16.0, 19.0];

        let path = plot_predictions(&actual, &predicted, "All Data Linear", dir.path())
            .expect("plot");

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("all_data_linear_predictions.png")
        );
        let img = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(img.dimensions(), SCATTER_SIZE);
    }

    #[test]
    fn constant_series_still_plots() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = plot_predictions(&[5.0, 5.0], &[5.0, 5.0], "flat", dir.path()).expect("plot");
        assert!(path.exists());
    }

    #[test]
    fn empty_or_mismatched_input_is_a_plot_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            plot_predictions(&[], &[], "empty", dir.path()),
            Err(PipelineError::Plot { .. })
        ));
        assert!(matches!(
            plot_predictions(&[1.0], &[1.0, 2.0], "short", dir.path()),
            Err(PipelineError::Plot { .. })
        ));
    }

    #[test]
    fn identity_line_is_dashed_inside_the_range() {
        let segments = dash_segments(0.0, 40.0);
        assert_eq!(segments.len(), 20);
        assert_eq!(segments[0], vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(segments[1][0], (2.0, 2.0));
        assert!(segments.iter().flatten().all(|&(x, y)| x == y && x <= 40.0));
    }

    #[test]
    fn importance_chart_skipped_without_importances() {
        let dir = tempfile::tempdir().expect("temp dir");
        let names = vec!["a".to_string()];
        let out = plot_feature_importance(&names, None, "linear", dir.path()).expect("plot");
        assert!(out.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    }

    #[test]
    fn importance_chart_keeps_ten_largest() {
        let names: Vec<String> = (0..15).map(|i| format!("f{i}")).collect();
        let importances: Vec<f64> = (0..15).map(|i| i as f64).collect();

        let ranked = rank_features(&names, &importances);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].0, "f14");
        assert_eq!(ranked[9].0, "f5");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = plot_feature_importance(&names, Some(&importances), "Tree", dir.path())
            .expect("plot")
            .expect("path");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("tree_feature_importance.png")
        );
        let img = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(img.dimensions(), BAR_SIZE);
    }

    #[test]
    fn all_zero_importances_still_write_a_chart() {
        let dir = tempfile::tempdir().expect("temp dir");
        let names = vec!["a".to_string(), "b".to_string()];
        let out = plot_feature_importance(&names, Some(&[0.0, 0.0]), "zero", dir.path())
            .expect("plot");
        assert!(out.is_some_and(|p| p.exists()));
    }

    #[test]
    fn non_finite_importances_are_a_plot_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let names = vec!["a".to_string()];
        let err = plot_feature_importance(&names, Some(&[f64::NAN]), "nan", dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Plot { .. }));
    }
}
