use tracing::{info, warn};

use super::table::Table;

/// Regression target: reverse-scan power-conversion efficiency.
pub const TARGET_COLUMN: &str = "JV_reverse_scan_PCE";

/// PCE values above this are treated as recording errors.
pub const PCE_OUTLIER_THRESHOLD: f64 = 27.0;

/// Identifier and metadata columns that never reach a model.
pub const DROP_COLUMNS: &[&str] = &[
    "Ref_ID",
    "Outdoor_average_over_n_number_of_cells",
    "Ref_DOI_number",
    "Ref_internal_sample_id",
];

/// Allow-list used when column selection is enabled.
pub const SELECTED_COLUMNS: &[&str] = &[
    "Cell_area_measured",
    "Cell_number_of_cells_per_substrate",
    "Cell_flexible",
    "Cell_semitransparent",
    "Substrate_thickness",
    "ETL_thickness",
    "HTL_thickness_list",
    "Backcontact_thickness_list",
    "Perovskite_single_crystal",
    "Perovskite_dimension_3D",
    "Perovskite_band_gap",
    "Perovskite_thickness",
    "Perovskite_composition_a_ions_coefficients",
    "Perovskite_composition_b_ions_coefficients",
    "Perovskite_composition_c_ions_coefficients",
    "Perovskite_deposition_number_of_deposition_steps",
    "Perovskite_deposition_thermal_annealing_temperature",
    "Perovskite_deposition_thermal_annealing_time",
    "Perovskite_deposition_solvents_mixing_ratios",
    "Perovskite_deposition_quenching_induced_crystallisation",
    "JV_light_intensity",
    "JV_test_temperature",
    "JV_reverse_scan_PCE",
    "JV_reverse_scan_Voc",
    "JV_reverse_scan_Jsc",
    "JV_reverse_scan_FF",
    "JV_forward_scan_PCE",
    "JV_forward_scan_Voc",
    "JV_forward_scan_Jsc",
    "JV_forward_scan_FF",
];

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub target: String,
    pub outlier_threshold: f64,
    pub select_columns: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            target: TARGET_COLUMN.to_string(),
            outlier_threshold: PCE_OUTLIER_THRESHOLD,
            select_columns: false,
        }
    }
}

/// What a cleaning pass changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSummary {
    pub rows_before: usize,
    pub rows_after: usize,
    pub deselected_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub imputed_cells: usize,
}

/// Clean `table` in place: outlier filter, optional column selection,
/// identifier drop, then zero-fill of numeric gaps.
///
/// An absent or non-numeric target only skips the outlier filter; the
/// per-subset feature separator reports the unusable target.
pub fn clean_table(table: &mut Table, options: &CleanOptions) -> CleanSummary {
    let rows_before = table.height();

    filter_outliers(table, &options.target, options.outlier_threshold);

    let deselected_columns = if options.select_columns {
        table.select_columns(SELECTED_COLUMNS)
    } else {
        Vec::new()
    };

    let dropped_columns = table.drop_columns(DROP_COLUMNS);
    let imputed_cells = table.fill_missing_numeric(0.0);

    let summary = CleanSummary {
        rows_before,
        rows_after: table.height(),
        deselected_columns,
        dropped_columns,
        imputed_cells,
    };

    info!(
        "Cleaned dataset: {} -> {} rows, {} columns deselected, {} dropped, {} cells imputed",
        summary.rows_before,
        summary.rows_after,
        summary.deselected_columns.len(),
        summary.dropped_columns.len(),
        summary.imputed_cells
    );

    summary
}

/// Keep rows whose target is present and at most `threshold`.
fn filter_outliers(table: &mut Table, target: &str, threshold: f64) {
    let Some(column) = table.column(target) else {
        warn!("target column '{}' not found; outlier filter skipped", target);
        return;
    };

    let Some(values) = column.as_numeric() else {
        warn!(
            "target column '{}' is not numeric; outlier filter skipped",
            target
        );
        return;
    };

    let mask: Vec<bool> = values
        .iter()
        .map(|value| matches!(value, Some(v) if *v <= threshold))
        .collect();

    table.retain_rows(&mask);
}
