use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::table::Table;
use crate::error::{PipelineError, Result};

/// Categorical column that separates the experimental regimes.
pub const GROUPING_COLUMN: &str = "Perovskite_deposition_number_of_deposition_steps";

/// Subset name used when the grouping column is missing.
pub const ALL_DATA: &str = "all_data";

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Maps one value of the grouping column to a subset name.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub key: f64,
    pub name: String,
}

impl GroupSpec {
    pub fn new(key: f64, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
        }
    }
}

/// One- and two-step deposition groups.
pub fn deposition_groups() -> Vec<GroupSpec> {
    vec![GroupSpec::new(1.0, "1_step"), GroupSpec::new(2.0, "2_step")]
}

/// A named, owned slice of the cleaned table.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub name: String,
    pub table: Table,
}

impl Subset {
    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.height() == 0
    }
}

/// Partition `table` by exact equality on `column`.
///
/// When the column is absent (or not numeric) the whole table comes back as a
/// single [`ALL_DATA`] subset. Rows matching no group are left out.
pub fn split_by_group(table: &Table, column: &str, groups: &[GroupSpec]) -> Vec<Subset> {
    let Some(keys) = table.numeric(column) else {
        warn!(
            "grouping column '{}' not found; using full data as '{}'",
            column, ALL_DATA
        );
        return vec![Subset {
            name: ALL_DATA.to_string(),
            table: table.clone(),
        }];
    };

    let subsets: Vec<Subset> = groups
        .iter()
        .map(|group| {
            let mask: Vec<bool> = keys.iter().map(|k| *k == Some(group.key)).collect();
            Subset {
                name: group.name.clone(),
                table: table.filter_rows(&mask),
            }
        })
        .collect();

    info!(
        "Data split: {}",
        subsets
            .iter()
            .map(|s| format!("{} samples: {}", s.name, s.len()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    subsets
}

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and cut off `ceil(n * test_fraction)`
/// rows for testing.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Train(format!(
            "test fraction must be between 0 and 1, got {}",
            test_fraction
        )));
    }

    let n_test = (n_rows as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::Train(format!(
            "cannot split {} rows with test fraction {}: one side would be empty",
            n_rows, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    let test = indices;

    debug!("Dataset split: {} training, {} test", train.len(), test.len());

    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Column;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn steps_table(steps: Vec<Option<f64>>) -> Table {
        let n = steps.len();
        Table::new(vec![
            Column::numeric(GROUPING_COLUMN, steps),
            Column::numeric("row", (0..n).map(|i| Some(i as f64)).collect()),
        ])
        .expect("valid table")
    }

    #[test]
    fn groups_by_exact_key() {
        let table = steps_table(vec![Some(1.0), Some(2.0), Some(1.0), Some(3.0)]);
        let subsets = split_by_group(&table, GROUPING_COLUMN, &deposition_groups());

        assert_eq!(subsets.len(), 2);
        assert_eq!(subsets[0].name, "1_step");
        assert_eq!(subsets[0].table.numeric("row"), Some(&[Some(0.0), Some(2.0)][..]));
        assert_eq!(subsets[1].name, "2_step");
        assert_eq!(subsets[1].len(), 1);
    }

    #[test]
    fn total_grouping_preserves_row_count() {
        let table = steps_table(vec![Some(1.0), Some(2.0), Some(2.0), Some(1.0), Some(2.0)]);
        let subsets = split_by_group(&table, GROUPING_COLUMN, &deposition_groups());
        let total: usize = subsets.iter().map(Subset::len).sum();
        assert_eq!(total, table.height());
    }

    #[test]
    fn missing_grouping_column_yields_all_data() {
        let table = Table::new(vec![Column::numeric("x", vec![Some(1.0), Some(2.0)])])
            .expect("valid table");
        let subsets = split_by_group(&table, GROUPING_COLUMN, &deposition_groups());

        assert_eq!(subsets.len(), 1);
        assert_eq!(subsets[0].name, ALL_DATA);
        assert_eq!(subsets[0].table, table);
    }

    #[test]
    fn split_sizes_follow_the_fraction() {
        let split = train_test_split(100, 0.2, DEFAULT_SEED).expect("split");
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 20);

        let split = train_test_split(51, 0.2, DEFAULT_SEED).expect("split");
        assert_eq!(split.test.len(), 11);
        assert_eq!(split.train.len(), 40);
    }

    #[test]
    fn split_rejects_degenerate_inputs() {
        assert!(train_test_split(1, 0.2, DEFAULT_SEED).is_err());
        assert!(train_test_split(10, 0.0, DEFAULT_SEED).is_err());
        assert!(train_test_split(10, 1.0, DEFAULT_SEED).is_err());
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        let a = train_test_split(200, 0.2, 1).expect("split");
        let b = train_test_split(200, 0.2, 2).expect("split");
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn split_is_deterministic_covering_and_disjoint(
            n in 2usize..300,
            fraction in 0.05f64..0.5,
            seed in any::<u64>(),
        ) {
            let first = train_test_split(n, fraction, seed).expect("split");
            let second = train_test_split(n, fraction, seed).expect("split");
            prop_assert_eq!(&first, &second);

            prop_assert_eq!(first.train.len() + first.test.len(), n);
            let train: HashSet<usize> = first.train.iter().copied().collect();
            let test: HashSet<usize> = first.test.iter().copied().collect();
            prop_assert!(train.is_disjoint(&test));
            prop_assert_eq!(train.len() + test.len(), n);
        }
    }
}
